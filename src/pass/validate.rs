//! SSA validation pass.
//!
//! Checks structural correctness of a function. The pass never modifies IR;
//! it is used between transformations to catch ill-formed rewrites.

use std::collections::HashSet;

use crate::dxil::DxilModule;
use crate::error::PassError;
use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;
use crate::ir::types::IrType;
use crate::ir::value::ValueId;
use crate::pass::FunctionPass;

pub const PASS_ARG: &str = "validate";
pub const PASS_DESCRIPTION: &str = "Validate SSA structure and memory operand types";

/// Validates SSA invariants of each function.
///
/// Checks:
/// 1. Every value used in an instruction is defined before its first use
///    (linear scan in block order, sufficient for IR whose blocks appear in
///    topological order).
/// 2. Every value is defined exactly once.
/// 3. Every block ends with exactly one terminator as its last instruction.
/// 4. Loads, stores and arithmetic agree with the types of their operands.
pub struct ValidatePass;

impl FunctionPass for ValidatePass {
    fn name(&self) -> &'static str {
        PASS_ARG
    }

    fn description(&self) -> &'static str {
        PASS_DESCRIPTION
    }

    fn run_on_function(
        &mut self,
        func: &mut IrFunction,
        _dxil: &mut DxilModule,
    ) -> Result<bool, PassError> {
        validate_function(func)?;
        Ok(false)
    }
}

/// Runs every check on `func`.
pub fn validate_function(func: &IrFunction) -> Result<(), PassError> {
    let func_name = &func.name;

    // Track all defined ValueIds in program order (params then instrs,
    // block by block).
    let mut defined: HashSet<ValueId> = HashSet::new();

    for block in func.blocks() {
        // Block params are defined at block entry.
        for param in block.param_ids() {
            if !defined.insert(param) {
                return Err(PassError::MultipleDefinition {
                    func: func_name.clone(),
                    value: format!("{}", param),
                });
            }
        }

        let n = block.instrs.len();
        for (i, (_, instr)) in func.block_instrs(block.id).enumerate() {
            // Terminator must be the last instruction.
            if instr.is_terminator() != (i + 1 == n) {
                return Err(PassError::MissingTerminator {
                    func: func_name.clone(),
                    block: block.label(),
                });
            }

            for operand in instr.operands() {
                if !defined.contains(&operand) {
                    return Err(PassError::UseBeforeDef {
                        func: func_name.clone(),
                        value: format!("{}", operand),
                    });
                }
            }

            check_types(func, instr)?;

            if let Some(result) = instr.result() {
                if !defined.insert(result) {
                    return Err(PassError::MultipleDefinition {
                        func: func_name.clone(),
                        value: format!("{}", result),
                    });
                }
            }
        }

        if n == 0 {
            return Err(PassError::MissingTerminator {
                func: func_name.clone(),
                block: block.label(),
            });
        }
    }
    Ok(())
}

fn check_types(func: &IrFunction, instr: &IrInstr) -> Result<(), PassError> {
    let ty = |v: ValueId| func.value_type(v).cloned().unwrap_or(IrType::Void);
    let mismatch = |detail: String| PassError::TypeError {
        func: func.name.clone(),
        detail,
    };

    match instr {
        IrInstr::Store { ptr, value } => {
            let ptr_ty = ty(*ptr);
            let value_ty = ty(*value);
            if ptr_ty.pointee() != Some(&value_ty) {
                return Err(mismatch(format!(
                    "store of {} {} through {} {}",
                    value_ty, value, ptr_ty, ptr
                )));
            }
        }
        IrInstr::Load { ptr, ty: load_ty, .. } => {
            let ptr_ty = ty(*ptr);
            if ptr_ty.pointee() != Some(load_ty) {
                return Err(mismatch(format!(
                    "load of {} through {} {}",
                    load_ty, ptr_ty, ptr
                )));
            }
        }
        IrInstr::BinOp {
            op, lhs, rhs, ty: result_ty, ..
        } => {
            let (lhs_ty, rhs_ty) = (ty(*lhs), ty(*rhs));
            if lhs_ty != rhs_ty || (!op.is_compare() && &lhs_ty != result_ty) {
                return Err(mismatch(format!(
                    "{} {} {}, {} {} yields {}",
                    op, lhs_ty, lhs, rhs_ty, rhs, result_ty
                )));
            }
        }
        IrInstr::Gep { base, indices, .. } => {
            if ty(*base).pointee().is_none() {
                return Err(mismatch(format!("getelementptr base {} is not a pointer", base)));
            }
            if let Some(index) = indices.iter().find(|&&i| !ty(i).is_int()) {
                return Err(mismatch(format!("getelementptr index {} is not an integer", index)));
            }
        }
        _ => {}
    }
    Ok(())
}
