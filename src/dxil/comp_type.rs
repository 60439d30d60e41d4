use crate::ir::types::{DType, IrType};

/// Component type of a signature element.
///
/// Normalized types are stored as floats of the same width; `base_type` is
/// what selects the intrinsic overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompType {
    I1,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    F32,
    F64,
    SNormF16,
    UNormF16,
    SNormF32,
    UNormF32,
    SNormF64,
    UNormF64,
}

impl CompType {
    /// Scalar type used to hold one component.
    pub fn base_type(self) -> DType {
        match self {
            CompType::I1 => DType::I1,
            CompType::I16 | CompType::U16 => DType::I16,
            CompType::I32 | CompType::U32 => DType::I32,
            CompType::I64 | CompType::U64 => DType::I64,
            CompType::F16 | CompType::SNormF16 | CompType::UNormF16 => DType::F16,
            CompType::F32 | CompType::SNormF32 | CompType::UNormF32 => DType::F32,
            CompType::F64 | CompType::SNormF64 | CompType::UNormF64 => DType::F64,
        }
    }

    /// IR type of one component.
    pub fn ir_type(self) -> IrType {
        IrType::Scalar(self.base_type())
    }

    pub fn is_float(self) -> bool {
        self.base_type().is_float()
    }
}

impl std::fmt::Display for CompType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompType::I1 => "i1",
            CompType::I16 => "i16",
            CompType::U16 => "u16",
            CompType::I32 => "i32",
            CompType::U32 => "u32",
            CompType::I64 => "i64",
            CompType::U64 => "u64",
            CompType::F16 => "f16",
            CompType::F32 => "f32",
            CompType::F64 => "f64",
            CompType::SNormF16 => "snorm_f16",
            CompType::UNormF16 => "unorm_f16",
            CompType::SNormF32 => "snorm_f32",
            CompType::UNormF32 => "unorm_f32",
            CompType::SNormF64 => "snorm_f64",
            CompType::UNormF64 => "unorm_f64",
        };
        f.write_str(s)
    }
}
