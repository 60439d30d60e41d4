//! Tree-walking IR interpreter.
//!
//! Executes an `IrFunction` by walking its instructions and threading values
//! through block parameters at branches. Stack slots are arrays of cells;
//! a pointer is a slot plus a cell offset. A cell that was never written
//! reads as `Undef`.
//!
//! Output intrinsic calls are not executed but recorded, in execution order,
//! so a function's observable output can be compared before and after a
//! rewrite.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::dxil::{OpCode, DXIL_OP_PREFIX};
use crate::error::InterpError;
use crate::ir::block::BlockId;
use crate::ir::function::IrFunction;
use crate::ir::instr::{BinOp, CastOp, IrInstr};
use crate::ir::types::{DType, IrType};
use crate::ir::value::ValueId;

const MAX_STEPS: usize = 1_000_000;

/// A runtime value produced or consumed by the interpreter.
///
/// Integers are kept zero-extended to the width of their type.
#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    Int(i64),
    Float(f64),
    Undef,
    Ptr { slot: usize, offset: usize },
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::Int(n) => write!(f, "{}", n),
            IrValue::Float(x) => write!(f, "{:?}", x),
            IrValue::Undef => write!(f, "undef"),
            IrValue::Ptr { slot, offset } => write!(f, "&slot{}[{}]", slot, offset),
        }
    }
}

/// One executed output intrinsic call.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub opcode: OpCode,
    pub signature_id: u32,
    pub row: i64,
    pub column: i64,
    pub value: IrValue,
}

/// Result of running a function to completion.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// Output intrinsic calls in execution order.
    pub outputs: Vec<OutputRecord>,
    /// Operands of the `ret` that ended execution.
    pub returned: Vec<IrValue>,
}

/// `(opcode, signature id, row, column)`.
pub type OutputCell = (u32, u32, i64, i64);

impl Execution {
    /// The last value written to each output cell.
    pub fn final_writes(&self) -> BTreeMap<OutputCell, IrValue> {
        self.outputs
            .iter()
            .map(|rec| (cell_of(rec), rec.value.clone()))
            .collect()
    }

    /// How many times each output cell was written.
    pub fn write_counts(&self) -> BTreeMap<OutputCell, usize> {
        let mut counts = BTreeMap::new();
        for rec in &self.outputs {
            *counts.entry(cell_of(rec)).or_insert(0) += 1;
        }
        counts
    }
}

fn cell_of(rec: &OutputRecord) -> OutputCell {
    (rec.opcode.value(), rec.signature_id, rec.row, rec.column)
}

/// Evaluates `func` with the given entry arguments.
///
/// Calls other than the output intrinsics fail with
/// `InterpError::Unsupported`.
pub fn eval_function(func: &IrFunction, args: &[IrValue]) -> Result<Execution, InterpError> {
    Interpreter::new().run(func, args)
}

// ---------------------------------------------------------------------------
// Interpreter state
// ---------------------------------------------------------------------------

struct Interpreter {
    values: HashMap<ValueId, IrValue>,
    slots: Vec<Vec<IrValue>>,
    outputs: Vec<OutputRecord>,
}

impl Interpreter {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            slots: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn run(mut self, func: &IrFunction, entry_args: &[IrValue]) -> Result<Execution, InterpError> {
        let entry = func.entry_block();
        for (param, arg) in entry.params.iter().zip(entry_args.iter()) {
            self.values.insert(param.id, arg.clone());
        }

        let mut current = BlockId::ENTRY;
        let mut steps = 0usize;

        'blocks: loop {
            if func.block(current).is_none() {
                return Err(InterpError::Unsupported {
                    detail: format!("branch to missing block {}", current),
                });
            }

            for (_, instr) in func.block_instrs(current) {
                steps += 1;
                if steps > MAX_STEPS {
                    return Err(InterpError::Unsupported {
                        detail: "exceeded step limit (infinite loop?)".into(),
                    });
                }

                match instr {
                    IrInstr::ConstInt { result, value, ty } => {
                        let v = IrValue::Int(mask_to(*value, int_width(ty)?));
                        self.values.insert(*result, v);
                    }

                    IrInstr::ConstFloat { result, value, ty } => {
                        let v = match ty.scalar() {
                            Some(DType::F32) | Some(DType::F16) => {
                                IrValue::Float(f64::from(*value as f32))
                            }
                            Some(DType::F64) => IrValue::Float(*value),
                            _ => {
                                return Err(InterpError::TypeError {
                                    detail: format!("ConstFloat with type {}", ty),
                                })
                            }
                        };
                        self.values.insert(*result, v);
                    }

                    IrInstr::Undef { result, .. } => {
                        self.values.insert(*result, IrValue::Undef);
                    }

                    IrInstr::BinOp {
                        result,
                        op,
                        lhs,
                        rhs,
                        ..
                    } => {
                        let width = func
                            .value_type(*lhs)
                            .and_then(IrType::int_width)
                            .unwrap_or(64);
                        let lv = self.get(*lhs)?;
                        let rv = self.get(*rhs)?;
                        let res = eval_binop(*op, width, &lv, &rv)?;
                        self.values.insert(*result, res);
                    }

                    IrInstr::Cast {
                        result,
                        op,
                        operand,
                        to_ty,
                    } => {
                        let from_ty = func.value_type(*operand).cloned().unwrap_or(IrType::Void);
                        let v = self.get(*operand)?;
                        let res = eval_cast(*op, &v, &from_ty, to_ty)?;
                        self.values.insert(*result, res);
                    }

                    IrInstr::Alloca {
                        result,
                        allocated_ty,
                        ..
                    } => {
                        let slot = self.slots.len();
                        self.slots.push(vec![IrValue::Undef; num_cells(allocated_ty)]);
                        self.values.insert(*result, IrValue::Ptr { slot, offset: 0 });
                    }

                    IrInstr::Gep {
                        result,
                        base,
                        indices,
                        ..
                    } => {
                        let base_ty = func.value_type(*base).cloned().unwrap_or(IrType::Void);
                        let (slot, offset) = self.pointer(*base)?;
                        let offset = self.gep_offset(&base_ty, offset, indices)?;
                        self.values.insert(*result, IrValue::Ptr { slot, offset });
                    }

                    IrInstr::Load { result, ptr, .. } => {
                        let (slot, offset) = self.pointer(*ptr)?;
                        let v = self.cell(slot, offset)?.clone();
                        self.values.insert(*result, v);
                    }

                    IrInstr::Store { ptr, value } => {
                        let (slot, offset) = self.pointer(*ptr)?;
                        let v = self.get(*value)?;
                        *self.cell_mut(slot, offset)? = v;
                    }

                    IrInstr::Call { callee, args, .. } => {
                        self.call(callee, args)?;
                    }

                    IrInstr::Br { target, args } => {
                        self.bind_block_params(func, *target, args)?;
                        current = *target;
                        continue 'blocks;
                    }

                    IrInstr::CondBr {
                        cond,
                        then_block,
                        then_args,
                        else_block,
                        else_args,
                    } => {
                        let taken = match self.get(*cond)? {
                            IrValue::Int(n) => n != 0,
                            other => {
                                return Err(InterpError::TypeError {
                                    detail: format!(
                                        "CondBr condition must be an integer, got {}",
                                        other
                                    ),
                                })
                            }
                        };
                        let (target, br_args) = if taken {
                            (then_block, then_args)
                        } else {
                            (else_block, else_args)
                        };
                        self.bind_block_params(func, *target, br_args)?;
                        current = *target;
                        continue 'blocks;
                    }

                    IrInstr::Return { values } => {
                        let returned = values
                            .iter()
                            .map(|&v| self.get(v))
                            .collect::<Result<Vec<_>, _>>()?;
                        return Ok(Execution {
                            outputs: self.outputs,
                            returned,
                        });
                    }
                }
            }

            return Err(InterpError::Unsupported {
                detail: format!("block {} has no terminator", current),
            });
        }
    }

    /// Looks up a value by ID, returning a clone.
    fn get(&self, id: ValueId) -> Result<IrValue, InterpError> {
        self.values
            .get(&id)
            .cloned()
            .ok_or(InterpError::UndefinedValue { id: id.0 })
    }

    fn int(&self, id: ValueId) -> Result<i64, InterpError> {
        match self.get(id)? {
            IrValue::Int(n) => Ok(n),
            other => Err(InterpError::TypeError {
                detail: format!("{} must be an integer, got {}", id, other),
            }),
        }
    }

    fn pointer(&self, id: ValueId) -> Result<(usize, usize), InterpError> {
        match self.get(id)? {
            IrValue::Ptr { slot, offset } => Ok((slot, offset)),
            other => Err(InterpError::InvalidPointer {
                detail: format!("{} is not a pointer: {}", id, other),
            }),
        }
    }

    fn cell(&self, slot: usize, offset: usize) -> Result<&IrValue, InterpError> {
        self.slots
            .get(slot)
            .and_then(|cells| cells.get(offset))
            .ok_or_else(|| InterpError::InvalidPointer {
                detail: format!("&slot{}[{}] is out of bounds", slot, offset),
            })
    }

    fn cell_mut(&mut self, slot: usize, offset: usize) -> Result<&mut IrValue, InterpError> {
        self.slots
            .get_mut(slot)
            .and_then(|cells| cells.get_mut(offset))
            .ok_or_else(|| InterpError::InvalidPointer {
                detail: format!("&slot{}[{}] is out of bounds", slot, offset),
            })
    }

    /// The first index steps over whole pointees; each further index selects
    /// an element of the current array type.
    fn gep_offset(
        &self,
        base_ty: &IrType,
        mut offset: usize,
        indices: &[ValueId],
    ) -> Result<usize, InterpError> {
        let mut ty = base_ty
            .pointee()
            .cloned()
            .ok_or_else(|| InterpError::InvalidPointer {
                detail: format!("getelementptr over non-pointer type {}", base_ty),
            })?;
        for (i, &index) in indices.iter().enumerate() {
            let idx = usize::try_from(self.int(index)?).map_err(|_| InterpError::InvalidPointer {
                detail: format!("negative getelementptr index {}", index),
            })?;
            if i > 0 {
                ty = match ty {
                    IrType::Array { elem, .. } => *elem,
                    other => {
                        return Err(InterpError::InvalidPointer {
                            detail: format!("getelementptr indexes into non-array type {}", other),
                        })
                    }
                };
            }
            offset += idx * num_cells(&ty);
        }
        Ok(offset)
    }

    fn call(&mut self, callee: &str, args: &[ValueId]) -> Result<(), InterpError> {
        let opcode = if callee.starts_with(DXIL_OP_PREFIX) {
            match args.first() {
                Some(&op) => OpCode::from_value(self.int(op)?),
                None => None,
            }
        } else {
            None
        };
        let opcode = opcode.ok_or_else(|| InterpError::Unsupported {
            detail: format!("call to '{}'", callee),
        })?;
        if args.len() < 5 {
            return Err(InterpError::TypeError {
                detail: format!("{} call with {} operands", opcode, args.len()),
            });
        }

        let signature_id =
            u32::try_from(self.int(args[1])?).map_err(|_| InterpError::TypeError {
                detail: format!("{} signature id out of range", opcode),
            })?;
        let record = OutputRecord {
            opcode,
            signature_id,
            row: self.int(args[2])?,
            column: self.int(args[3])?,
            value: self.get(args[4])?,
        };
        log::trace!(
            "{}: sig {} [{}][{}] = {}",
            opcode,
            record.signature_id,
            record.row,
            record.column,
            record.value
        );
        self.outputs.push(record);
        Ok(())
    }

    /// Binds a target block's parameters to the provided argument values.
    fn bind_block_params(
        &mut self,
        func: &IrFunction,
        block: BlockId,
        args: &[ValueId],
    ) -> Result<(), InterpError> {
        let block_ref = func.block(block).ok_or_else(|| InterpError::Unsupported {
            detail: format!("branch to missing block {}", block),
        })?;
        let arg_vals = args
            .iter()
            .map(|&v| self.get(v))
            .collect::<Result<Vec<_>, _>>()?;
        for (param, val) in block_ref.params.iter().zip(arg_vals) {
            self.values.insert(param.id, val);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn num_cells(ty: &IrType) -> usize {
    match ty {
        IrType::Array { elem, len } => len * num_cells(elem),
        _ => 1,
    }
}

fn int_width(ty: &IrType) -> Result<u32, InterpError> {
    ty.int_width().ok_or_else(|| InterpError::TypeError {
        detail: format!("expected an integer type, got {}", ty),
    })
}

fn mask_to(value: i64, width: u32) -> i64 {
    if width >= 64 {
        value
    } else {
        value & ((1i64 << width) - 1)
    }
}

fn sign_extend(value: i64, width: u32) -> i64 {
    if width >= 64 {
        value
    } else {
        let shift = 64 - width;
        (value << shift) >> shift
    }
}

fn eval_cast(
    op: CastOp,
    v: &IrValue,
    from_ty: &IrType,
    to_ty: &IrType,
) -> Result<IrValue, InterpError> {
    if *v == IrValue::Undef {
        return Ok(IrValue::Undef);
    }
    let bad = || InterpError::TypeError {
        detail: format!("cannot {} {} from {} to {}", op, v, from_ty, to_ty),
    };
    match (op, v) {
        (CastOp::Trunc, IrValue::Int(n)) | (CastOp::ZExt, IrValue::Int(n)) => {
            Ok(IrValue::Int(mask_to(*n, int_width(to_ty)?)))
        }
        (CastOp::SExt, IrValue::Int(n)) => {
            let wide = sign_extend(*n, int_width(from_ty)?);
            Ok(IrValue::Int(mask_to(wide, int_width(to_ty)?)))
        }
        (CastOp::SIToFP, IrValue::Int(n)) => {
            Ok(IrValue::Float(sign_extend(*n, int_width(from_ty)?) as f64))
        }
        (CastOp::FPToSI, IrValue::Float(x)) => {
            Ok(IrValue::Int(mask_to(*x as i64, int_width(to_ty)?)))
        }
        (CastOp::FPTrunc, IrValue::Float(x)) => Ok(IrValue::Float(f64::from(*x as f32))),
        (CastOp::FPExt, IrValue::Float(x)) => Ok(IrValue::Float(*x)),
        _ => Err(bad()),
    }
}

fn eval_binop(op: BinOp, width: u32, lv: &IrValue, rv: &IrValue) -> Result<IrValue, InterpError> {
    use IrValue::*;
    let wrap = |n: i64| -> Result<IrValue, InterpError> { Ok(Int(mask_to(n, width))) };
    let flag = |b: bool| -> Result<IrValue, InterpError> { Ok(Int(i64::from(b))) };
    match (op, lv, rv) {
        (_, Undef, _) | (_, _, Undef) => Ok(Undef),
        // Integer arithmetic
        (BinOp::Add, Int(a), Int(b)) => wrap(a.wrapping_add(*b)),
        (BinOp::Sub, Int(a), Int(b)) => wrap(a.wrapping_sub(*b)),
        (BinOp::Mul, Int(a), Int(b)) => wrap(a.wrapping_mul(*b)),
        (BinOp::UDiv, Int(_), Int(0)) | (BinOp::URem, Int(_), Int(0)) => Ok(Undef),
        (BinOp::UDiv, Int(a), Int(b)) => wrap(((*a as u64) / (*b as u64)) as i64),
        (BinOp::URem, Int(a), Int(b)) => wrap(((*a as u64) % (*b as u64)) as i64),
        (BinOp::And, Int(a), Int(b)) => wrap(a & b),
        (BinOp::Or, Int(a), Int(b)) => wrap(a | b),
        (BinOp::Xor, Int(a), Int(b)) => wrap(a ^ b),
        // Integer comparisons
        (BinOp::ICmpEq, Int(a), Int(b)) => flag(a == b),
        (BinOp::ICmpNe, Int(a), Int(b)) => flag(a != b),
        (BinOp::ICmpULt, Int(a), Int(b)) => flag((*a as u64) < (*b as u64)),
        (BinOp::ICmpSLt, Int(a), Int(b)) => flag(sign_extend(*a, width) < sign_extend(*b, width)),
        // Float arithmetic
        (BinOp::FAdd, Float(a), Float(b)) => Ok(Float(a + b)),
        (BinOp::FSub, Float(a), Float(b)) => Ok(Float(a - b)),
        (BinOp::FMul, Float(a), Float(b)) => Ok(Float(a * b)),
        _ => Err(InterpError::TypeError {
            detail: format!("unsupported binop {} on {} and {}", op, lv, rv),
        }),
    }
}
