//! Shader signatures: the declared input, output and patch-constant
//! registers of a shader.

use crate::dxil::comp_type::CompType;

/// Which signature an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Input,
    Output,
    PatchConstant,
}

/// One declared element: `rows × cols` components of `comp_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureElement {
    /// Semantic name (e.g. `"SV_Target"`).
    pub name: String,
    /// Index of the element within its signature.
    pub id: u32,
    pub rows: u32,
    pub cols: u32,
    pub comp_type: CompType,
    pub kind: SignatureKind,
}

impl SignatureElement {
    pub fn is_patch_constant(&self) -> bool {
        self.kind == SignatureKind::PatchConstant
    }

    pub fn num_elements(&self) -> u32 {
        self.rows * self.cols
    }
}

/// An ordered list of elements. An element's id is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    kind: SignatureKind,
    elements: Vec<SignatureElement>,
}

impl Signature {
    pub fn new(kind: SignatureKind) -> Self {
        Self {
            kind,
            elements: Vec::new(),
        }
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    /// Appends an element and returns its id.
    ///
    /// Panics if `rows` or `cols` is zero; elements always hold at least one
    /// component.
    pub fn append_element(
        &mut self,
        name: impl Into<String>,
        comp_type: CompType,
        rows: u32,
        cols: u32,
    ) -> u32 {
        assert!(rows >= 1 && cols >= 1, "signature element must be at least 1x1");
        let id = self.elements.len() as u32;
        self.elements.push(SignatureElement {
            name: name.into(),
            id,
            rows,
            cols,
            comp_type,
            kind: self.kind,
        });
        id
    }

    /// Looks up an element by id.
    pub fn element(&self, id: u32) -> Option<&SignatureElement> {
        self.elements.get(id as usize)
    }

    pub fn elements(&self) -> &[SignatureElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
