use crate::ir::instr::InstrId;
use crate::ir::value::{BlockParam, ValueId};

/// An opaque index identifying a basic block within an `IrFunction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The entry block is always `BlockId(0)`.
    pub const ENTRY: BlockId = BlockId(0);
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block in SSA form.
///
/// The block holds the program order of its instructions as handles into
/// the owning function's instruction arena. Inserting or erasing an
/// instruction only touches this list; every other `InstrId` stays valid.
///
/// Invariants enforced by `IrFunctionBuilder::build()`:
/// 1. `instrs` is non-empty: at minimum a terminator must be present.
/// 2. Exactly one terminator exists and it is always the last element.
/// 3. `params` are considered defined before any instruction in this block.
#[derive(Debug, Clone)]
pub struct IrBlock {
    pub id: BlockId,
    /// Block parameters model phi nodes (block-param SSA style).
    pub params: Vec<BlockParam>,
    /// Instructions in program order. Terminator is last.
    pub instrs: Vec<InstrId>,
    /// Optional display name used by the pretty-printer.
    pub name: Option<String>,
}

impl IrBlock {
    pub fn new(id: BlockId, name: Option<String>) -> Self {
        Self {
            id,
            params: Vec::new(),
            instrs: Vec::new(),
            name,
        }
    }

    /// Position of `instr` within this block, if it lives here.
    pub fn position_of(&self, instr: InstrId) -> Option<usize> {
        self.instrs.iter().position(|&i| i == instr)
    }

    /// Iterates over the `ValueId`s defined as parameters of this block.
    pub fn param_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.params.iter().map(|p| p.id)
    }

    /// Display label: the block name if present, `bb<n>` otherwise.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}", self.id))
    }
}
