//! DXIL shader metadata attached to an `IrModule`.
//!
//! Holds the output and patch-constant signatures and the intrinsic table,
//! and recognizes calls to DXIL intrinsics in a function body.

pub mod comp_type;
pub mod opcode;
pub mod signature;

pub use comp_type::CompType;
pub use opcode::{OpCode, OpFunction, OpTable, DXIL_OP_PREFIX};
pub use signature::{Signature, SignatureElement, SignatureKind};

use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;

#[derive(Debug, Clone)]
pub struct DxilModule {
    output_signature: Signature,
    patch_constant_signature: Signature,
    op_table: OpTable,
}

impl Default for DxilModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DxilModule {
    pub fn new() -> Self {
        Self {
            output_signature: Signature::new(SignatureKind::Output),
            patch_constant_signature: Signature::new(SignatureKind::PatchConstant),
            op_table: OpTable::new(),
        }
    }

    pub fn output_signature(&self) -> &Signature {
        &self.output_signature
    }

    pub fn output_signature_mut(&mut self) -> &mut Signature {
        &mut self.output_signature
    }

    pub fn patch_constant_signature(&self) -> &Signature {
        &self.patch_constant_signature
    }

    pub fn patch_constant_signature_mut(&mut self) -> &mut Signature {
        &mut self.patch_constant_signature
    }

    pub fn op_table(&self) -> &OpTable {
        &self.op_table
    }

    pub fn op_table_mut(&mut self) -> &mut OpTable {
        &mut self.op_table
    }
}

/// Returns `true` if `instr` is a call to a DXIL intrinsic for `opcode`:
/// the callee is a `dx.op.` function and operand 0 is the opcode constant.
pub fn is_dxil_op_call(func: &IrFunction, instr: &IrInstr, opcode: OpCode) -> bool {
    match instr {
        IrInstr::Call { callee, args, .. } => {
            callee.starts_with(DXIL_OP_PREFIX)
                && args
                    .first()
                    .and_then(|&op| func.const_int(op))
                    .map_or(false, |value| value == i64::from(opcode.value()))
        }
        _ => false,
    }
}
