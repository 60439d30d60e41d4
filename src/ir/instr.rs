use crate::ir::block::BlockId;
use crate::ir::types::IrType;
use crate::ir::value::ValueId;

/// Handle of an instruction in its function's instruction arena.
///
/// Handles are stable: inserting or erasing other instructions never
/// invalidates them, and an erased handle is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub u32);

/// Binary operations on integer and floating-point scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    URem,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    /// Integer comparisons: yield an `i1`.
    ICmpEq,
    ICmpNe,
    ICmpULt,
    ICmpSLt,
}

impl BinOp {
    /// Comparisons produce `i1` regardless of their operand type.
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinOp::ICmpEq | BinOp::ICmpNe | BinOp::ICmpULt | BinOp::ICmpSLt
        )
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::UDiv => "udiv",
            BinOp::URem => "urem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::ICmpEq => "icmp.eq",
            BinOp::ICmpNe => "icmp.ne",
            BinOp::ICmpULt => "icmp.ult",
            BinOp::ICmpSLt => "icmp.slt",
        };
        f.write_str(s)
    }
}

/// Scalar conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    SIToFP,
    FPToSI,
}

impl std::fmt::Display for CastOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::SIToFP => "sitofp",
            CastOp::FPToSI => "fptosi",
        };
        f.write_str(s)
    }
}

/// A single instruction in SSA form.
///
/// Invariants:
/// - Every instruction that produces a value has exactly one result `ValueId`.
/// - Terminators (`Br`, `CondBr`, `Return`) are the last instruction in a block.
/// - No instruction may appear after a terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum IrInstr {
    // ---- Constants ----
    ConstInt {
        result: ValueId,
        value: i64,
        ty: IrType,
    },
    ConstFloat {
        result: ValueId,
        value: f64,
        ty: IrType,
    },
    /// An unspecified value of the given type.
    Undef {
        result: ValueId,
        ty: IrType,
    },

    // ---- Scalar arithmetic ----
    BinOp {
        result: ValueId,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        ty: IrType,
    },
    Cast {
        result: ValueId,
        op: CastOp,
        operand: ValueId,
        to_ty: IrType,
    },

    // ---- Memory ----
    /// Function-local stack slot. The result is a pointer to `allocated_ty`.
    Alloca {
        result: ValueId,
        allocated_ty: IrType,
        name: Option<String>,
    },
    /// Address computation into an aggregate. The first index steps over the
    /// base pointer, every following index selects an array element.
    Gep {
        result: ValueId,
        base: ValueId,
        indices: Vec<ValueId>,
        inbounds: bool,
        result_ty: IrType,
    },
    Load {
        result: ValueId,
        ptr: ValueId,
        ty: IrType,
    },
    /// Store `value` through `ptr`. Produces no result (side-effecting).
    Store {
        ptr: ValueId,
        value: ValueId,
    },

    // ---- Function calls ----
    Call {
        result: Option<ValueId>,
        callee: String,
        args: Vec<ValueId>,
        result_ty: Option<IrType>,
    },

    // ---- Control flow (terminators) ----
    /// Unconditional branch with block arguments (SSA block params).
    Br {
        target: BlockId,
        args: Vec<ValueId>,
    },
    /// Conditional branch.
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        then_args: Vec<ValueId>,
        else_block: BlockId,
        else_args: Vec<ValueId>,
    },
    /// Return from function. Values must match the function's return type.
    Return {
        values: Vec<ValueId>,
    },
}

impl IrInstr {
    /// Returns the `ValueId` produced by this instruction, if any.
    /// Terminators and `Store` produce no value.
    pub fn result(&self) -> Option<ValueId> {
        match self {
            IrInstr::ConstInt { result, .. } => Some(*result),
            IrInstr::ConstFloat { result, .. } => Some(*result),
            IrInstr::Undef { result, .. } => Some(*result),
            IrInstr::BinOp { result, .. } => Some(*result),
            IrInstr::Cast { result, .. } => Some(*result),
            IrInstr::Alloca { result, .. } => Some(*result),
            IrInstr::Gep { result, .. } => Some(*result),
            IrInstr::Load { result, .. } => Some(*result),
            IrInstr::Store { .. } => None,
            IrInstr::Call { result, .. } => *result,
            IrInstr::Br { .. } => None,
            IrInstr::CondBr { .. } => None,
            IrInstr::Return { .. } => None,
        }
    }

    /// Returns `true` if this instruction is a block terminator.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            IrInstr::Br { .. } | IrInstr::CondBr { .. } | IrInstr::Return { .. }
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(self, IrInstr::Return { .. })
    }

    /// Returns all `ValueId`s consumed by this instruction (operands).
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            IrInstr::ConstInt { .. } => vec![],
            IrInstr::ConstFloat { .. } => vec![],
            IrInstr::Undef { .. } => vec![],
            IrInstr::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrInstr::Cast { operand, .. } => vec![*operand],
            IrInstr::Alloca { .. } => vec![],
            IrInstr::Gep { base, indices, .. } => {
                let mut ops = vec![*base];
                ops.extend_from_slice(indices);
                ops
            }
            IrInstr::Load { ptr, .. } => vec![*ptr],
            IrInstr::Store { ptr, value } => vec![*ptr, *value],
            IrInstr::Call { args, .. } => args.clone(),
            IrInstr::Br { args, .. } => args.clone(),
            IrInstr::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                let mut ops = vec![*cond];
                ops.extend_from_slice(then_args);
                ops.extend_from_slice(else_args);
                ops
            }
            IrInstr::Return { values } => values.clone(),
        }
    }

    /// Name of the called function, for `Call` instructions.
    pub fn callee(&self) -> Option<&str> {
        match self {
            IrInstr::Call { callee, .. } => Some(callee.as_str()),
            _ => None,
        }
    }

    /// Successor blocks of a terminator, in operand order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            IrInstr::Br { target, .. } => vec![*target],
            IrInstr::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => vec![],
        }
    }
}
