//! Positioned instruction builder for rewriting existing functions.
//!
//! `IrFunctionBuilder` appends to blocks of a function under construction.
//! `InstrBuilder` instead edits a finished function at an insertion point:
//! every instruction it creates is placed at the point, and the point then
//! moves past it, so a sequence of `create_*` calls comes out in call order.

use crate::ir::block::BlockId;
use crate::ir::function::IrFunction;
use crate::ir::instr::{BinOp, CastOp, InstrId, IrInstr};
use crate::ir::types::{DType, IrType};
use crate::ir::value::ValueId;

pub struct InstrBuilder<'f> {
    func: &'f mut IrFunction,
    block: BlockId,
    index: usize,
}

impl<'f> InstrBuilder<'f> {
    /// Positions a builder at the first insertion point of the entry block.
    pub fn at_entry(func: &'f mut IrFunction) -> Self {
        Self::at_block_start(func, BlockId::ENTRY)
    }

    /// Positions a builder at the first insertion point of `block`.
    ///
    /// Block parameters stand in for phis, so that is index 0.
    pub fn at_block_start(func: &'f mut IrFunction, block: BlockId) -> Self {
        Self {
            func,
            block,
            index: 0,
        }
    }

    /// Positions a builder immediately before `instr`.
    /// Returns `None` if `instr` is not a live instruction of `func`.
    pub fn before(func: &'f mut IrFunction, instr: InstrId) -> Option<Self> {
        let (block, index) = func.position(instr)?;
        Some(Self { func, block, index })
    }

    /// Moves the insertion point to immediately before `instr`.
    /// Returns `false` (and leaves the point unchanged) if `instr` is not live.
    pub fn set_insert_point(&mut self, instr: InstrId) -> bool {
        match self.func.position(instr) {
            Some((block, index)) => {
                self.block = block;
                self.index = index;
                true
            }
            None => false,
        }
    }

    /// The block the builder currently inserts into.
    pub fn insert_block(&self) -> BlockId {
        self.block
    }

    /// Read access to the function being edited.
    pub fn func(&self) -> &IrFunction {
        &*self.func
    }

    pub fn value_type(&self, v: ValueId) -> Option<&IrType> {
        self.func.value_type(v)
    }

    /// Inserts `instr` at the insertion point and advances past it.
    pub fn insert(&mut self, instr: IrInstr, result_ty: Option<IrType>) -> InstrId {
        let id = self.func.alloc_instr(instr, result_ty);
        self.func.blocks[self.block.0 as usize]
            .instrs
            .insert(self.index, id);
        self.index += 1;
        id
    }

    fn insert_value(&mut self, make: impl FnOnce(ValueId) -> IrInstr, ty: IrType) -> ValueId {
        let result = self.func.fresh_value();
        self.insert(make(result), Some(ty));
        result
    }

    // ---- Constants ----

    /// Integer constant of an arbitrary integer type.
    pub fn const_int(&mut self, ty: IrType, value: i64) -> ValueId {
        let result_ty = ty.clone();
        self.insert_value(|result| IrInstr::ConstInt { result, value, ty }, result_ty)
    }

    pub fn get_int8(&mut self, value: u8) -> ValueId {
        self.const_int(IrType::Scalar(DType::I8), i64::from(value))
    }

    pub fn get_int32(&mut self, value: u32) -> ValueId {
        self.const_int(IrType::Scalar(DType::I32), i64::from(value))
    }

    pub fn undef(&mut self, ty: IrType) -> ValueId {
        let result_ty = ty.clone();
        self.insert_value(|result| IrInstr::Undef { result, ty }, result_ty)
    }

    // ---- Arithmetic ----

    /// Binary operation whose result has the type of `lhs`.
    pub fn create_binop(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = if op.is_compare() {
            IrType::Scalar(DType::I1)
        } else {
            self.value_type(lhs).cloned().unwrap_or(IrType::Void)
        };
        let instr_ty = ty.clone();
        self.insert_value(
            |result| IrInstr::BinOp {
                result,
                op,
                lhs,
                rhs,
                ty: instr_ty,
            },
            ty,
        )
    }

    pub fn create_add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.create_binop(BinOp::Add, lhs, rhs)
    }

    pub fn create_mul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.create_binop(BinOp::Mul, lhs, rhs)
    }

    pub fn create_cast(&mut self, op: CastOp, operand: ValueId, to_ty: IrType) -> ValueId {
        let result_ty = to_ty.clone();
        self.insert_value(
            |result| IrInstr::Cast {
                result,
                op,
                operand,
                to_ty,
            },
            result_ty,
        )
    }

    pub fn create_trunc(&mut self, operand: ValueId, to_ty: IrType) -> ValueId {
        self.create_cast(CastOp::Trunc, operand, to_ty)
    }

    pub fn create_zext(&mut self, operand: ValueId, to_ty: IrType) -> ValueId {
        self.create_cast(CastOp::ZExt, operand, to_ty)
    }

    // ---- Memory ----

    /// Stack slot of `allocated_ty`, tagged with `name` for readability.
    pub fn create_alloca(&mut self, allocated_ty: IrType, name: Option<&str>) -> ValueId {
        let ptr_ty = IrType::ptr(allocated_ty.clone());
        let name = name.map(str::to_owned);
        self.insert_value(
            |result| IrInstr::Alloca {
                result,
                allocated_ty,
                name,
            },
            ptr_ty,
        )
    }

    /// In-bounds address computation. The first index steps over `base`;
    /// each further index selects an element of the current array type.
    pub fn create_inbounds_gep(&mut self, base: ValueId, indices: Vec<ValueId>) -> ValueId {
        let result_ty = gep_result_type(self.value_type(base), indices.len());
        let instr_ty = result_ty.clone();
        self.insert_value(
            |result| IrInstr::Gep {
                result,
                base,
                indices,
                inbounds: true,
                result_ty: instr_ty,
            },
            result_ty,
        )
    }

    /// Load through `ptr`; the result has the pointee type.
    pub fn create_load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self
            .value_type(ptr)
            .and_then(IrType::pointee)
            .cloned()
            .unwrap_or(IrType::Void);
        let instr_ty = ty.clone();
        self.insert_value(
            |result| IrInstr::Load {
                result,
                ptr,
                ty: instr_ty,
            },
            ty,
        )
    }

    pub fn create_store(&mut self, value: ValueId, ptr: ValueId) -> InstrId {
        self.insert(IrInstr::Store { ptr, value }, None)
    }

    /// Call returning `result_ty`; `None` means `void`.
    pub fn create_call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<ValueId>,
        result_ty: Option<IrType>,
    ) -> Option<ValueId> {
        let result = result_ty.as_ref().map(|_| self.func.fresh_value());
        self.insert(
            IrInstr::Call {
                result,
                callee: callee.into(),
                args,
                result_ty: result_ty.clone(),
            },
            result_ty,
        );
        result
    }
}

/// Pointer type produced by a GEP over `base_ty` with `num_indices` indices.
fn gep_result_type(base_ty: Option<&IrType>, num_indices: usize) -> IrType {
    let mut ty = match base_ty.and_then(IrType::pointee) {
        Some(pointee) => pointee.clone(),
        None => return IrType::Void,
    };
    for _ in 1..num_indices {
        ty = match ty {
            IrType::Array { elem, .. } => *elem,
            _ => return IrType::Void,
        };
    }
    IrType::ptr(ty)
}
