//! End-to-end tests for the preserve-all-outputs pass.
//! Shaders are built through the builder API, rewritten, then inspected
//! structurally and executed with the interpreter.

mod common;

use common::*;
use dxir::dxil::{CompType, DxilModule, OpCode};
use dxir::error::PassError;
use dxir::interp::{eval_function, IrValue};
use dxir::ir::function::{IrFunction, Param};
use dxir::ir::instr::{BinOp, CastOp, IrInstr};
use dxir::ir::module::IrFunctionBuilder;
use dxir::ir::types::{DType, IrType};
use dxir::pass::validate::validate_function;
use dxir::pass::{FunctionPass, PreserveAllOutputsPass};

fn run_pass(func: &mut IrFunction, dxil: &mut DxilModule) -> Result<bool, PassError> {
    init_logging();
    PreserveAllOutputsPass.run_on_function(func, dxil)
}

fn float(v: f64) -> IrValue {
    IrValue::Float(f64::from(v as f32))
}

// ---------------------------------------------------------------------------
// Single scalar output
// ---------------------------------------------------------------------------

#[test]
fn test_single_scalar_output() {
    let (mut b, _) = main_builder();
    store_output_f32(&mut b, 0, 0, 0, 1.0);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    let modified = run_pass(&mut func, &mut dxil).expect("pass should succeed");
    assert!(modified);
    validate_function(&func).expect("rewritten IR should validate");

    // One scalar scratch slot, first in the entry block.
    let slots = allocas(&func);
    assert_eq!(slots.len(), 1);
    let (scratch, ty, name) = &slots[0];
    assert_eq!(ty, &IrType::f32());
    assert_eq!(name.as_deref(), Some("SV_Target"));
    let first = func.entry_block().instrs[0];
    assert!(matches!(func.instr(first), Some(IrInstr::Alloca { .. })));

    // The original call became a store of 1.0 into the slot.
    let stores: Vec<_> = func
        .iter_instrs()
        .filter_map(|(_, i)| match i {
            IrInstr::Store { ptr, value } => Some((*ptr, *value)),
            _ => None,
        })
        .collect();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].0, *scratch);
    assert!(matches!(
        func.defining_instr(stores[0].1),
        Some(IrInstr::ConstFloat { value, .. }) if *value == 1.0
    ));

    // Exactly one output call: the epilogue's, right before the return.
    let calls = output_stores(&func);
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.opcode, OpCode::StoreOutput);
    assert_eq!((call.sig, call.row, call.col), (Some(0), Some(0), Some(0)));
    assert_eq!(call.callee, "dx.op.storeOutput.f32");
    assert!(matches!(
        func.defining_instr(call.value),
        Some(IrInstr::Load { ptr, .. }) if ptr == scratch
    ));
    let ids = &func.entry_block().instrs;
    assert_eq!(ids[ids.len() - 2], call.instr);
    assert!(func.instr(ids[ids.len() - 1]).map_or(false, IrInstr::is_return));

    assert!(dxil.op_table().function("dx.op.storeOutput.f32").is_some());

    let exec = eval_function(&func, &[]).expect("should execute");
    assert_eq!(exec.outputs.len(), 1);
    assert_eq!(exec.outputs[0].value, float(1.0));
}

// ---------------------------------------------------------------------------
// 2x4 matrix output, partial writes
// ---------------------------------------------------------------------------

#[test]
fn test_matrix_output_partial_writes() {
    let (mut b, _) = main_builder();
    store_output_f32(&mut b, 0, 0, 0, 1.0);
    store_output_f32(&mut b, 0, 1, 2, 2.0);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("TEXCOORD", CompType::F32, 2, 4)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");

    let slots = allocas(&func);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].1, IrType::array(IrType::f32(), 8));

    // Eight epilogue calls in row-major order.
    let calls = output_stores(&func);
    let cells: Vec<_> = calls
        .iter()
        .map(|c| (c.row.unwrap_or(-1), c.col.unwrap_or(-1)))
        .collect();
    let expected: Vec<_> = (0..2).flat_map(|r| (0..4).map(move |c| (r, c))).collect();
    assert_eq!(cells, expected);

    // Flat positions 0 and 6 carry the written values, the rest are undef.
    let exec = eval_function(&func, &[]).expect("should execute");
    let values: Vec<_> = exec.outputs.iter().map(|o| o.value.clone()).collect();
    for (i, v) in values.iter().enumerate() {
        match i {
            0 => assert_eq!(v, &float(1.0)),
            6 => assert_eq!(v, &float(2.0)),
            _ => assert_eq!(v, &IrValue::Undef, "position {} should be undef", i),
        }
    }
}

// ---------------------------------------------------------------------------
// Dynamic row index
// ---------------------------------------------------------------------------

fn dynamic_row_shader(row_ty: IrType) -> IrFunction {
    let params = vec![
        Param {
            name: "i".into(),
            ty: row_ty.clone(),
        },
        Param {
            name: "v".into(),
            ty: IrType::f32(),
        },
    ];
    let mut b = IrFunctionBuilder::new("main", params, IrType::Void);
    let entry = b.create_block(Some("entry"));
    let i = b.add_block_param(entry, Some("i"), row_ty);
    let v = b.add_block_param(entry, Some("v"), IrType::f32());
    b.set_current_block(entry);
    let col = i8_const(&mut b, 0);
    emit_output_store(&mut b, OpCode::StoreOutput, 3, i, col, v, DType::F32);
    b.emit_return(vec![]);
    b.build()
}

fn four_outputs() -> DxilModule {
    dxil_with_outputs(&[
        ("SV_Position", CompType::F32, 1, 4),
        ("NORMAL", CompType::F32, 1, 3),
        ("TEXCOORD", CompType::F32, 1, 2),
        ("COLOR", CompType::F32, 4, 1),
    ])
}

#[test]
fn test_dynamic_row_index() {
    let mut func = dynamic_row_shader(IrType::i32());
    let row = func.entry_block().params[0].id;
    let mut dxil = four_outputs();

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");

    let slots = allocas(&func);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].1, IrType::array(IrType::f32(), 4));
    assert_eq!(slots[0].2.as_deref(), Some("COLOR"));

    // The rewrite computes %i * 1 at the row's width.
    let mul = func.iter_instrs().find_map(|(_, instr)| match instr {
        IrInstr::BinOp {
            op: BinOp::Mul,
            lhs,
            rhs,
            ..
        } if *lhs == row => Some(*rhs),
        _ => None,
    });
    let stride = mul.expect("row offset multiply");
    assert_eq!(func.const_int(stride), Some(1));
    assert_eq!(func.value_type(stride), Some(&IrType::i32()));

    let calls = output_stores(&func);
    assert_eq!(calls.len(), 4);
    for (r, call) in calls.iter().enumerate() {
        assert_eq!(call.sig, Some(3));
        assert_eq!(call.row, Some(r as i64));
        assert_eq!(call.col, Some(0));
    }

    let exec = eval_function(&func, &[IrValue::Int(2), IrValue::Float(5.0)])
        .expect("should execute");
    let values: Vec<_> = exec.outputs.iter().map(|o| o.value.clone()).collect();
    assert_eq!(
        values,
        vec![IrValue::Undef, IrValue::Undef, IrValue::Float(5.0), IrValue::Undef]
    );
}

#[test]
fn test_wide_row_index_is_rejected() {
    let mut func = dynamic_row_shader(IrType::Scalar(DType::I64));
    let mut dxil = four_outputs();

    let err = run_pass(&mut func, &mut dxil).expect_err("i64 row cannot index the scratch");
    assert!(
        matches!(err, PassError::IndexWidthMismatch { width: 64, .. }),
        "got {:?}",
        err
    );
    let err = dxir::Error::from(err);
    assert_eq!(err.diagnostic_code(), "E0203");

    // Nothing of the address computation is emitted for the rejected store.
    assert_eq!(
        count_instrs(&func, |i| matches!(i, IrInstr::BinOp { .. } | IrInstr::Cast { .. })),
        0
    );
}

// ---------------------------------------------------------------------------
// Mixed column widths
// ---------------------------------------------------------------------------

fn column_shader(col_ty: IrType) -> (IrFunction, dxir::ir::value::ValueId) {
    let (mut b, _) = main_builder();
    let row = i32_const(&mut b, 1);
    let col = b.emit_const_int(2, col_ty);
    let value = f32_const(&mut b, 4.0);
    emit_output_store(&mut b, OpCode::StoreOutput, 0, row, col, value, DType::F32);
    b.emit_return(vec![]);
    (b.build(), col)
}

fn casts_of(func: &IrFunction, operand: dxir::ir::value::ValueId) -> Vec<CastOp> {
    func.iter_instrs()
        .filter_map(|(_, instr)| match instr {
            IrInstr::Cast {
                op, operand: o, to_ty, ..
            } if *o == operand => {
                assert_eq!(to_ty, &IrType::i32());
                Some(*op)
            }
            _ => None,
        })
        .collect()
}

#[test]
fn test_narrow_column_is_zero_extended() {
    let (mut func, col) = column_shader(IrType::i8());
    let mut dxil = dxil_with_outputs(&[("TEXCOORD", CompType::F32, 2, 3)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");
    assert_eq!(casts_of(&func, col), vec![CastOp::ZExt]);

    // Emission is unaffected by the column width.
    assert_eq!(output_stores(&func).len(), 6);
    let exec = eval_function(&func, &[]).expect("should execute");
    let written = exec.final_writes();
    assert_eq!(written[&(5, 0, 1, 2)], float(4.0));
}

#[test]
fn test_i32_column_is_used_directly() {
    let (mut func, col) = column_shader(IrType::i32());
    let mut dxil = dxil_with_outputs(&[("TEXCOORD", CompType::F32, 2, 3)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    assert!(casts_of(&func, col).is_empty());
    let exec = eval_function(&func, &[]).expect("should execute");
    assert_eq!(exec.final_writes()[&(5, 0, 1, 2)], float(4.0));
}

#[test]
fn test_wide_column_is_truncated() {
    let (mut func, col) = column_shader(IrType::Scalar(DType::I64));
    let mut dxil = dxil_with_outputs(&[("TEXCOORD", CompType::F32, 2, 3)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");
    assert_eq!(casts_of(&func, col), vec![CastOp::Trunc]);
}

// ---------------------------------------------------------------------------
// Patch-constant path
// ---------------------------------------------------------------------------

#[test]
fn test_patch_constant_output() {
    let (mut b, _) = main_builder();
    let row = i32_const(&mut b, 1);
    let col = i8_const(&mut b, 0);
    let value = f32_const(&mut b, 0.5);
    emit_output_store(&mut b, OpCode::StorePatchConstant, 0, row, col, value, DType::F32);
    b.emit_return(vec![]);
    let mut func = b.build();

    let mut dxil = DxilModule::new();
    dxil.patch_constant_signature_mut()
        .append_element("SV_TessFactor", CompType::F32, 3, 1);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");

    let calls = output_stores(&func);
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(call.opcode, OpCode::StorePatchConstant);
        assert_eq!(call.callee, "dx.op.storePatchConstant.f32");
    }
    assert!(dxil.op_table().function("dx.op.storeOutput.f32").is_none());

    let exec = eval_function(&func, &[]).expect("should execute");
    assert_eq!(exec.final_writes()[&(106, 0, 1, 0)], float(0.5));
}

fn mixed_kind_shader(patch_id: u32) -> IrFunction {
    let (mut b, _) = main_builder();
    store_output_f32(&mut b, 0, 0, 0, 1.0);
    let row = i32_const(&mut b, 0);
    let col = i8_const(&mut b, 0);
    let value = f32_const(&mut b, 0.5);
    emit_output_store(&mut b, OpCode::StorePatchConstant, patch_id, row, col, value, DType::F32);
    b.emit_return(vec![]);
    b.build()
}

fn hull_metadata() -> DxilModule {
    let mut dxil = dxil_with_outputs(&[
        ("SV_Target", CompType::F32, 1, 1),
        ("COLOR", CompType::F32, 1, 1),
    ]);
    dxil.patch_constant_signature_mut()
        .append_element("SV_TessFactor", CompType::F32, 3, 1);
    dxil.patch_constant_signature_mut()
        .append_element("SV_InsideTessFactor", CompType::F32, 1, 1);
    dxil
}

#[test]
fn test_output_and_patch_constant_sharing_an_id_is_rejected() {
    let mut func = mixed_kind_shader(0);
    let mut dxil = hull_metadata();

    let err = run_pass(&mut func, &mut dxil).expect_err("id 0 is written by both kinds");
    match &err {
        PassError::UnsupportedShader { detail, .. } => {
            assert!(detail.contains("signature id 0"), "{}", detail)
        }
        other => panic!("expected UnsupportedShader, got {:?}", other),
    }

    // Rejected before any rewriting.
    assert!(allocas(&func).is_empty());
    assert_eq!(output_stores(&func).len(), 2);
}

#[test]
fn test_output_and_patch_constant_with_distinct_ids() {
    let mut func = mixed_kind_shader(1);
    let mut dxil = hull_metadata();

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");

    let calls: Vec<_> = output_stores(&func)
        .iter()
        .map(|c| (c.opcode, c.sig, c.row, c.col))
        .collect();
    assert_eq!(
        calls,
        vec![
            (OpCode::StoreOutput, Some(0), Some(0), Some(0)),
            (OpCode::StorePatchConstant, Some(1), Some(0), Some(0)),
        ]
    );
    let slots = allocas(&func);
    assert_eq!(slots[1].2.as_deref(), Some("SV_InsideTessFactor"));
}

// ---------------------------------------------------------------------------
// Two returns
// ---------------------------------------------------------------------------

fn two_return_shader() -> IrFunction {
    let params = vec![Param {
        name: "c".into(),
        ty: IrType::Scalar(DType::I1),
    }];
    let mut b = IrFunctionBuilder::new("main", params, IrType::Void);
    let entry = b.create_block(Some("entry"));
    let then_bb = b.create_block(Some("then"));
    let else_bb = b.create_block(Some("else"));
    let c = b.add_block_param(entry, Some("c"), IrType::Scalar(DType::I1));

    b.set_current_block(entry);
    store_output_f32(&mut b, 0, 0, 1, 1.0);
    emit_cond_br(&mut b, c, then_bb, else_bb);

    b.set_current_block(then_bb);
    store_output_f32(&mut b, 1, 0, 0, 0.25);
    b.emit_return(vec![]);

    b.set_current_block(else_bb);
    b.emit_return(vec![]);
    b.build()
}

#[test]
fn test_epilogue_before_every_return() {
    let mut func = two_return_shader();
    let mut dxil = dxil_with_outputs(&[
        ("SV_Target", CompType::F32, 1, 4),
        ("SV_Depth", CompType::F32, 1, 1),
    ]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");

    // 2 returns x (1*4 + 1*1) components.
    assert_eq!(output_stores(&func).len(), 10);

    // Allocas for both elements dominate both returns.
    assert_eq!(allocas(&func).len(), 2);
    let entry_allocas = func
        .block_instrs(func.entry_block().id)
        .take(2)
        .filter(|(_, i)| matches!(i, IrInstr::Alloca { .. }))
        .count();
    assert_eq!(entry_allocas, 2);

    // Each return block flushes every element in ascending id order.
    for block in func.blocks().iter().skip(1) {
        let sigs: Vec<_> = output_stores_in(&func, block.id)
            .iter()
            .map(|c| c.sig.unwrap_or(-1))
            .collect();
        assert_eq!(sigs, vec![0, 0, 0, 0, 1], "block {}", block.label());
    }
    assert!(output_stores_in(&func, func.entry_block().id).is_empty());

    let taken = eval_function(&func, &[IrValue::Int(1)]).expect("then path");
    let writes = taken.final_writes();
    assert_eq!(writes[&(5, 0, 0, 1)], float(1.0));
    assert_eq!(writes[&(5, 1, 0, 0)], float(0.25));

    let not_taken = eval_function(&func, &[IrValue::Int(0)]).expect("else path");
    let writes = not_taken.final_writes();
    assert_eq!(writes[&(5, 0, 0, 1)], float(1.0));
    assert_eq!(writes[&(5, 1, 0, 0)], IrValue::Undef);
}

// ---------------------------------------------------------------------------
// Stores, errors and edge cases
// ---------------------------------------------------------------------------

#[test]
fn test_last_write_wins() {
    let (mut b, _) = main_builder();
    store_output_f32(&mut b, 0, 0, 0, 1.0);
    store_output_f32(&mut b, 0, 0, 0, 3.0);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    assert_eq!(allocas(&func).len(), 1);
    assert_eq!(output_stores(&func).len(), 1);

    let exec = eval_function(&func, &[]).expect("should execute");
    assert_eq!(exec.outputs.len(), 1);
    assert_eq!(exec.outputs[0].value, float(3.0));
}

#[test]
fn test_no_output_stores_is_a_no_op() {
    let (mut b, _) = main_builder();
    let v = f32_const(&mut b, 2.0);
    b.emit_return(vec![v]);
    let mut func = b.build();
    let before = func.clone();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    let modified = run_pass(&mut func, &mut dxil).expect("pass should succeed");
    assert!(!modified);
    assert_eq!(
        dxir::codegen::emit_function_text(&func).unwrap(),
        dxir::codegen::emit_function_text(&before).unwrap()
    );
    assert_eq!(dxil.op_table().functions().count(), 0);
}

#[test]
fn test_non_constant_signature_id_is_rejected() {
    let params = vec![Param {
        name: "sig".into(),
        ty: IrType::i32(),
    }];
    let mut b = IrFunctionBuilder::new("main", params, IrType::Void);
    let entry = b.create_block(Some("entry"));
    let sig = b.add_block_param(entry, Some("sig"), IrType::i32());
    b.set_current_block(entry);
    let op = i32_const(&mut b, 5);
    let row = i32_const(&mut b, 0);
    let col = i8_const(&mut b, 0);
    let value = f32_const(&mut b, 1.0);
    b.emit_call("dx.op.storeOutput.f32", vec![op, sig, row, col, value]);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    let err = run_pass(&mut func, &mut dxil).expect_err("dynamic signature id");
    assert!(
        matches!(err, PassError::UnsupportedShader { .. }),
        "got {:?}",
        err
    );
    assert!(err.to_string().contains("non-constant signature id"));
}

#[test]
fn test_unknown_signature_id_is_rejected() {
    let (mut b, _) = main_builder();
    store_output_f32(&mut b, 7, 0, 0, 1.0);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    let err = run_pass(&mut func, &mut dxil).expect_err("id 7 is not declared");
    match err {
        PassError::UnknownSignatureElement { signature, id, .. } => {
            assert_eq!(signature, "output");
            assert_eq!(id, 7);
        }
        other => panic!("expected UnknownSignatureElement, got {:?}", other),
    }
}

#[test]
fn test_other_intrinsics_are_left_alone() {
    let (mut b, _) = main_builder();
    // Opcode 4 is not an output store.
    let op = i32_const(&mut b, 4);
    let sig = i32_const(&mut b, 0);
    b.emit_call("dx.op.loadInput.f32", vec![op, sig]);
    // Right opcode, but not a DXIL intrinsic.
    let op = i32_const(&mut b, 5);
    b.emit_call("my.storeOutput", vec![op]);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    assert!(!run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    assert_eq!(count_instrs(&func, |i| matches!(i, IrInstr::Call { .. })), 2);
}

#[test]
fn test_function_without_return_gets_no_epilogue() {
    let (mut b, _) = main_builder();
    let lp = b.create_block(Some("loop"));
    store_output_f32(&mut b, 0, 0, 0, 1.0);
    emit_br(&mut b, lp);
    b.set_current_block(lp);
    emit_br(&mut b, lp);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_Target", CompType::F32, 1, 1)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");
    assert!(output_stores(&func).is_empty());
    assert_eq!(allocas(&func).len(), 1);
    assert_eq!(count_instrs(&func, |i| matches!(i, IrInstr::Store { .. })), 1);
}

#[test]
fn test_integer_output_uses_its_own_overload() {
    let (mut b, _) = main_builder();
    let row = i32_const(&mut b, 0);
    let col = i8_const(&mut b, 1);
    let value = i32_const(&mut b, 42);
    emit_output_store(&mut b, OpCode::StoreOutput, 0, row, col, value, DType::I32);
    b.emit_return(vec![]);
    let mut func = b.build();
    let mut dxil = dxil_with_outputs(&[("SV_InstanceID", CompType::U32, 1, 2)]);

    assert!(run_pass(&mut func, &mut dxil).expect("pass should succeed"));
    validate_function(&func).expect("rewritten IR should validate");
    let calls = output_stores(&func);
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.callee == "dx.op.storeOutput.i32"));

    let exec = eval_function(&func, &[]).expect("should execute");
    assert_eq!(exec.final_writes()[&(5, 0, 0, 1)], IrValue::Int(42));
}
