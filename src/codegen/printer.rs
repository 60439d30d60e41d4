//! IR pretty-printer.
//!
//! Emits a human-readable text representation of an `IrModule`.
//! Output is deterministic: intrinsic declarations are printed in name order,
//! functions in `FunctionId` order, blocks in `BlockId` order, instructions
//! in program order.

use std::fmt::Write;

use crate::ir::function::IrFunction;
use crate::ir::instr::IrInstr;
use crate::ir::module::IrModule;
use crate::ir::value::ValueId;

/// Emits a full text dump of the IR module.
pub fn emit_ir_text(module: &IrModule) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "; module: {}", module.name)?;

    if let Some(dxil) = module.dxil_module() {
        for decl in dxil.op_table().functions() {
            write!(out, "declare {} @{}(", decl.ret_ty, decl.name)?;
            for (i, ty) in decl.param_types.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{}", ty)?;
            }
            writeln!(out, ")")?;
        }
    }

    for func in module.functions() {
        emit_function(&mut out, func)?;
    }
    Ok(out)
}

/// Emits one function.
pub fn emit_function_text(func: &IrFunction) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    emit_function(&mut out, func)?;
    Ok(out)
}

fn emit_function(out: &mut String, func: &IrFunction) -> std::fmt::Result {
    write!(out, "\ndefine {} @{}(", func.return_ty, func.name)?;
    for (i, param) in func.params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}: {}", param.name, param.ty)?;
    }
    writeln!(out, ") {{")?;

    for block in func.blocks() {
        write!(out, "  {}(", block.label())?;
        for (i, param) in block.params.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            write!(out, "{} {}", param.ty, param.id)?;
        }
        writeln!(out, "):")?;

        for (_, instr) in func.block_instrs(block.id) {
            write!(out, "    ")?;
            emit_instr(out, func, instr)?;
            writeln!(out)?;
        }
    }
    writeln!(out, "}}")
}

fn emit_instr(out: &mut String, func: &IrFunction, instr: &IrInstr) -> std::fmt::Result {
    match instr {
        IrInstr::ConstInt { result, value, ty } => {
            write!(out, "{} = const {} {}", result, ty, value)
        }
        IrInstr::ConstFloat { result, value, ty } => {
            write!(out, "{} = const {} {:?}", result, ty, value)
        }
        IrInstr::Undef { result, ty } => write!(out, "{} = undef {}", result, ty),
        IrInstr::BinOp {
            result,
            op,
            lhs,
            rhs,
            ty,
        } => write!(out, "{} = {} {} {}, {}", result, op, ty, lhs, rhs),
        IrInstr::Cast {
            result,
            op,
            operand,
            to_ty,
        } => {
            let from = func
                .value_type(*operand)
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_owned());
            write!(out, "{} = {} {} {} to {}", result, op, from, operand, to_ty)
        }
        IrInstr::Alloca {
            result,
            allocated_ty,
            name,
        } => {
            write!(out, "{} = alloca {}", result, allocated_ty)?;
            if let Some(name) = name {
                write!(out, ", name \"{}\"", name)?;
            }
            Ok(())
        }
        IrInstr::Gep {
            result,
            base,
            indices,
            inbounds,
            result_ty,
        } => {
            let kw = if *inbounds {
                "getelementptr inbounds"
            } else {
                "getelementptr"
            };
            write!(out, "{} = {} {}", result, kw, base)?;
            for index in indices {
                write!(out, ", {}", index)?;
            }
            write!(out, " : {}", result_ty)
        }
        IrInstr::Load { result, ptr, ty } => write!(out, "{} = load {}, {}", result, ty, ptr),
        IrInstr::Store { ptr, value } => write!(out, "store {}, {}", value, ptr),
        IrInstr::Call {
            result,
            callee,
            args,
            result_ty,
        } => {
            if let Some(result) = result {
                write!(out, "{} = ", result)?;
            }
            let ret = result_ty
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "void".to_owned());
            write!(out, "call {} @{}(", ret, callee)?;
            emit_value_list(out, args)?;
            write!(out, ")")
        }
        IrInstr::Br { target, args } => {
            write!(out, "br {}(", target)?;
            emit_value_list(out, args)?;
            write!(out, ")")
        }
        IrInstr::CondBr {
            cond,
            then_block,
            then_args,
            else_block,
            else_args,
        } => {
            write!(out, "condbr {}, {}(", cond, then_block)?;
            emit_value_list(out, then_args)?;
            write!(out, "), {}(", else_block)?;
            emit_value_list(out, else_args)?;
            write!(out, ")")
        }
        IrInstr::Return { values } => {
            write!(out, "ret")?;
            for (i, v) in values.iter().enumerate() {
                write!(out, "{}{}", if i == 0 { " " } else { ", " }, v)?;
            }
            Ok(())
        }
    }
}

fn emit_value_list(out: &mut String, values: &[ValueId]) -> std::fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", v)?;
    }
    Ok(())
}
