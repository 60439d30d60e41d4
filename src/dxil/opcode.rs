//! DXIL intrinsic opcodes and the table of declared intrinsic functions.

use std::collections::BTreeMap;

use crate::ir::types::{DType, IrType};

/// DXIL operation codes. The discriminant is the value passed as operand 0
/// of every `dx.op.*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpCode {
    StoreOutput = 5,
    StorePatchConstant = 106,
}

impl OpCode {
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Decodes an opcode operand.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            5 => Some(OpCode::StoreOutput),
            106 => Some(OpCode::StorePatchConstant),
            _ => None,
        }
    }

    /// Intrinsic class name, the middle part of `dx.op.<class>.<overload>`.
    pub fn class_name(self) -> &'static str {
        match self {
            OpCode::StoreOutput => "storeOutput",
            OpCode::StorePatchConstant => "storePatchConstant",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Prefix shared by every DXIL intrinsic function name.
pub const DXIL_OP_PREFIX: &str = "dx.op.";

/// Overload suffix for a scalar type, e.g. `f32` in `dx.op.storeOutput.f32`.
pub fn overload_suffix(ty: DType) -> &'static str {
    match ty {
        DType::I1 => "i1",
        DType::I8 => "i8",
        DType::I16 => "i16",
        DType::I32 => "i32",
        DType::I64 => "i64",
        DType::F16 => "f16",
        DType::F32 => "f32",
        DType::F64 => "f64",
    }
}

/// A declared intrinsic function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpFunction {
    pub name: String,
    pub opcode: OpCode,
    pub overload: DType,
    pub param_types: Vec<IrType>,
    pub ret_ty: IrType,
}

/// Declarations of the intrinsic functions used by a module, one per
/// (opcode, overload) pair, created on first request.
#[derive(Debug, Clone, Default)]
pub struct OpTable {
    functions: BTreeMap<String, OpFunction>,
}

impl OpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the intrinsic for `opcode` specialized to `overload`,
    /// declaring it if this is the first request.
    ///
    /// Output stores have the signature
    /// `void (i32 opcode, i32 sig_id, i32 row, i8 col, T value)`.
    pub fn get_op_func(&mut self, opcode: OpCode, overload: DType) -> &OpFunction {
        let name = format!(
            "{}{}.{}",
            DXIL_OP_PREFIX,
            opcode.class_name(),
            overload_suffix(overload)
        );
        self.functions
            .entry(name.clone())
            .or_insert_with(|| OpFunction {
                name,
                opcode,
                overload,
                param_types: vec![
                    IrType::i32(),
                    IrType::i32(),
                    IrType::i32(),
                    IrType::i8(),
                    IrType::Scalar(overload),
                ],
                ret_ty: IrType::Void,
            })
    }

    /// Looks up an already-declared intrinsic by name.
    pub fn function(&self, name: &str) -> Option<&OpFunction> {
        self.functions.get(name)
    }

    /// Declared intrinsics in name order.
    pub fn functions(&self) -> impl Iterator<Item = &OpFunction> {
        self.functions.values()
    }
}
