//! Shared helpers for building small shaders through the builder API.
#![allow(dead_code)]

use dxir::dxil::opcode::overload_suffix;
use dxir::dxil::{is_dxil_op_call, CompType, DxilModule, OpCode};
use dxir::ir::block::BlockId;
use dxir::ir::function::IrFunction;
use dxir::ir::instr::{InstrId, IrInstr};
use dxir::ir::module::{IrFunctionBuilder, IrModule};
use dxir::ir::types::{DType, IrType};
use dxir::ir::value::ValueId;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Metadata with the given output elements, declared in order
/// (`(name, comp, rows, cols)`; ids are positions).
pub fn dxil_with_outputs(outputs: &[(&str, CompType, u32, u32)]) -> DxilModule {
    let mut dxil = DxilModule::new();
    for &(name, comp, rows, cols) in outputs {
        dxil.output_signature_mut()
            .append_element(name, comp, rows, cols);
    }
    dxil
}

/// A builder for a `void main()` with the entry block selected.
pub fn main_builder() -> (IrFunctionBuilder, BlockId) {
    let mut b = IrFunctionBuilder::new("main", vec![], IrType::Void);
    let entry = b.create_block(Some("entry"));
    b.set_current_block(entry);
    (b, entry)
}

pub fn i32_const(b: &mut IrFunctionBuilder, v: i64) -> ValueId {
    b.emit_const_int(v, IrType::i32())
}

pub fn i8_const(b: &mut IrFunctionBuilder, v: i64) -> ValueId {
    b.emit_const_int(v, IrType::i8())
}

pub fn f32_const(b: &mut IrFunctionBuilder, v: f64) -> ValueId {
    b.emit_const_float(v, IrType::f32())
}

/// Emits `dx.op.<class>.<ty>(opcode, sig, row, col, value)`.
pub fn emit_output_store(
    b: &mut IrFunctionBuilder,
    opcode: OpCode,
    sig: u32,
    row: ValueId,
    col: ValueId,
    value: ValueId,
    ty: DType,
) {
    let op = i32_const(b, i64::from(opcode.value()));
    let sig = i32_const(b, i64::from(sig));
    let callee = format!("dx.op.{}.{}", opcode.class_name(), overload_suffix(ty));
    b.emit_call(callee, vec![op, sig, row, col, value]);
}

/// `storeOutput.f32(sig, row, col, value)` with constant operands.
pub fn store_output_f32(b: &mut IrFunctionBuilder, sig: u32, row: i64, col: i64, value: f64) {
    let row = i32_const(b, row);
    let col = i8_const(b, col);
    let value = f32_const(b, value);
    emit_output_store(b, OpCode::StoreOutput, sig, row, col, value, DType::F32);
}

pub fn emit_br(b: &mut IrFunctionBuilder, target: BlockId) {
    b.push_instr(
        IrInstr::Br {
            target,
            args: vec![],
        },
        None,
    );
}

pub fn emit_cond_br(b: &mut IrFunctionBuilder, cond: ValueId, then_block: BlockId, else_block: BlockId) {
    b.push_instr(
        IrInstr::CondBr {
            cond,
            then_block,
            then_args: vec![],
            else_block,
            else_args: vec![],
        },
        None,
    );
}

pub fn module_with(func: IrFunction, dxil: DxilModule) -> IrModule {
    let mut module = IrModule::new("shader");
    module.add_function(func).expect("should add function");
    module.set_dxil_module(dxil);
    module
}

/// An output intrinsic call as seen in a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenStore {
    pub instr: InstrId,
    pub callee: String,
    pub opcode: OpCode,
    pub sig: Option<i64>,
    pub row: Option<i64>,
    pub col: Option<i64>,
    pub value: ValueId,
}

fn seen_store(func: &IrFunction, id: InstrId, instr: &IrInstr) -> Option<SeenStore> {
    let opcode = [OpCode::StoreOutput, OpCode::StorePatchConstant]
        .into_iter()
        .find(|&op| is_dxil_op_call(func, instr, op))?;
    match instr {
        IrInstr::Call { callee, args, .. } => Some(SeenStore {
            instr: id,
            callee: callee.clone(),
            opcode,
            sig: func.const_int(args[1]),
            row: func.const_int(args[2]),
            col: func.const_int(args[3]),
            value: args[4],
        }),
        _ => None,
    }
}

/// Every output intrinsic call in the function, in traversal order.
pub fn output_stores(func: &IrFunction) -> Vec<SeenStore> {
    func.iter_instrs()
        .filter_map(|(id, instr)| seen_store(func, id, instr))
        .collect()
}

/// Output intrinsic calls of one block, in program order.
pub fn output_stores_in(func: &IrFunction, block: BlockId) -> Vec<SeenStore> {
    func.block_instrs(block)
        .filter_map(|(id, instr)| seen_store(func, id, instr))
        .collect()
}

pub fn count_instrs(func: &IrFunction, pred: impl Fn(&IrInstr) -> bool) -> usize {
    func.iter_instrs().filter(|(_, i)| pred(i)).count()
}

pub fn allocas(func: &IrFunction) -> Vec<(ValueId, IrType, Option<String>)> {
    func.iter_instrs()
        .filter_map(|(_, instr)| match instr {
            IrInstr::Alloca {
                result,
                allocated_ty,
                name,
            } => Some((*result, allocated_ty.clone(), name.clone())),
            _ => None,
        })
        .collect()
}
