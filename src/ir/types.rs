/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    I1,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DType {
    /// Width of the scalar in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            DType::I1 => 1,
            DType::I8 => 8,
            DType::I16 | DType::F16 => 16,
            DType::I32 | DType::F32 => 32,
            DType::I64 | DType::F64 => 64,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            DType::I1 | DType::I8 | DType::I16 | DType::I32 | DType::I64
        )
    }

    pub fn is_float(self) -> bool {
        !self.is_int()
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DType::I1 => "i1",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F16 => "half",
            DType::F32 => "float",
            DType::F64 => "double",
        };
        f.write_str(s)
    }
}

/// The type of an SSA value.
///
/// Aggregates only exist behind pointers: an `alloca` of an `Array` yields a
/// `Ptr(Array)`, and elements are reached through an in-bounds `gep`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    Scalar(DType),
    Array { elem: Box<IrType>, len: usize },
    Ptr(Box<IrType>),
}

impl IrType {
    pub fn i8() -> Self {
        IrType::Scalar(DType::I8)
    }

    pub fn i32() -> Self {
        IrType::Scalar(DType::I32)
    }

    pub fn f32() -> Self {
        IrType::Scalar(DType::F32)
    }

    pub fn array(elem: IrType, len: usize) -> Self {
        IrType::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn ptr(pointee: IrType) -> Self {
        IrType::Ptr(Box::new(pointee))
    }

    /// Returns the pointee type if this is a pointer.
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns the scalar type, if any.
    pub fn scalar(&self) -> Option<DType> {
        match self {
            IrType::Scalar(d) => Some(*d),
            _ => None,
        }
    }

    /// Bit width of an integer scalar; `None` for everything else.
    pub fn int_width(&self) -> Option<u32> {
        self.scalar().filter(|d| d.is_int()).map(DType::bit_width)
    }

    pub fn is_int(&self) -> bool {
        self.int_width().is_some()
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Scalar(d) => write!(f, "{}", d),
            IrType::Array { elem, len } => write!(f, "[{} x {}]", len, elem),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}
