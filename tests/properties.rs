//! Property tests for the preserve-all-outputs pass over randomly shaped
//! shaders: random output signatures, random stores, straight-line or
//! branching control flow.

mod common;

use std::collections::BTreeSet;

use common::*;
use dxir::codegen::emit_ir_text;
use dxir::dxil::CompType;
use dxir::interp::{eval_function, IrValue};
use dxir::ir::function::{IrFunction, Param};
use dxir::ir::module::{IrFunctionBuilder, IrModule};
use dxir::ir::types::{DType, IrType};
use dxir::pass::validate::validate_function;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Store {
    sig: u32,
    row: u32,
    col: u32,
    value: i16,
    /// 0 = entry, 1 = then, 2 = else (entry only in straight-line shaders).
    place: u8,
}

#[derive(Debug, Clone)]
struct Shader {
    /// `(rows, cols)` per signature id.
    elements: Vec<(u32, u32)>,
    stores: Vec<Store>,
    branchy: bool,
}

fn shader_strategy() -> impl Strategy<Value = Shader> {
    let elements = prop::collection::vec((1u32..=3, 1u32..=4), 1..=4);
    (elements, any::<bool>()).prop_flat_map(|(elements, branchy)| {
        let n = elements.len();
        let dims = elements.clone();
        let store = (0..n, any::<u32>(), any::<u32>(), any::<i16>(), 0u8..3).prop_map(
            move |(sig, r, c, value, place)| {
                let (rows, cols) = dims[sig];
                Store {
                    sig: sig as u32,
                    row: r % rows,
                    col: c % cols,
                    value,
                    place: if branchy { place } else { 0 },
                }
            },
        );
        prop::collection::vec(store, 0..12).prop_map(move |stores| Shader {
            elements: elements.clone(),
            stores,
            branchy,
        })
    })
}

fn build(shader: &Shader) -> IrModule {
    let params = vec![Param {
        name: "c".into(),
        ty: IrType::Scalar(DType::I1),
    }];
    let mut b = IrFunctionBuilder::new("main", params, IrType::Void);
    let entry = b.create_block(Some("entry"));
    let c = b.add_block_param(entry, Some("c"), IrType::Scalar(DType::I1));
    let arms = if shader.branchy {
        Some((b.create_block(Some("then")), b.create_block(Some("else"))))
    } else {
        None
    };

    let emit_stores = |b: &mut IrFunctionBuilder, place: u8| {
        for s in shader.stores.iter().filter(|s| s.place == place) {
            store_output_f32(
                b,
                s.sig,
                i64::from(s.row),
                i64::from(s.col),
                f64::from(s.value),
            );
        }
    };

    b.set_current_block(entry);
    emit_stores(&mut b, 0);
    match arms {
        Some((then_bb, else_bb)) => {
            emit_cond_br(&mut b, c, then_bb, else_bb);
            b.set_current_block(then_bb);
            emit_stores(&mut b, 1);
            b.emit_return(vec![]);
            b.set_current_block(else_bb);
            emit_stores(&mut b, 2);
            b.emit_return(vec![]);
        }
        None => b.emit_return(vec![]),
    }

    let names: Vec<String> = (0..shader.elements.len())
        .map(|i| format!("OUT{}", i))
        .collect();
    let outputs: Vec<_> = shader
        .elements
        .iter()
        .zip(&names)
        .map(|(&(rows, cols), name)| (name.as_str(), CompType::F32, rows, cols))
        .collect();
    module_with(b.build(), dxil_with_outputs(&outputs))
}

fn rewritten(shader: &Shader) -> IrModule {
    let mut module = build(shader);
    dxir::preserve_all_outputs(&mut module).expect("pass should succeed");
    module
}

fn main_fn(module: &IrModule) -> &IrFunction {
    module.function_by_name("main").expect("main")
}

/// Every cell of every written element, ascending id then row-major.
fn expected_epilogue(shader: &Shader) -> Vec<(i64, i64, i64)> {
    let written: BTreeSet<u32> = shader.stores.iter().map(|s| s.sig).collect();
    written
        .into_iter()
        .flat_map(|sig| {
            let (rows, cols) = shader.elements[sig as usize];
            (0..rows).flat_map(move |r| {
                (0..cols).map(move |c| (i64::from(sig), i64::from(r), i64::from(c)))
            })
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn every_return_flushes_every_written_cell_once(shader in shader_strategy()) {
        let module = rewritten(&shader);
        let func = main_fn(&module);
        prop_assert!(validate_function(func).is_ok());

        let expected = expected_epilogue(&shader);
        let returns = func.returns();
        prop_assert_eq!(returns.len(), if shader.branchy { 2 } else { 1 });
        for ret in returns {
            let (block, _) = func.position(ret).expect("live return");
            let cells: Vec<_> = output_stores_in(func, block)
                .iter()
                .map(|s| (s.sig.unwrap_or(-1), s.row.unwrap_or(-1), s.col.unwrap_or(-1)))
                .collect();
            prop_assert_eq!(&cells, &expected);
        }
    }

    #[test]
    fn original_stores_are_removed(shader in shader_strategy()) {
        let module = rewritten(&shader);
        let func = main_fn(&module);
        let returns = if shader.branchy { 2 } else { 1 };
        let calls = output_stores(func);
        prop_assert_eq!(calls.len(), returns * expected_epilogue(&shader).len());
        prop_assert!(calls.iter().all(|s| s.row.is_some() && s.col.is_some()));
        // Each original call is now a store into scratch.
        let scratch_stores = count_instrs(func, |i| matches!(i, dxir::ir::IrInstr::Store { .. }));
        prop_assert_eq!(scratch_stores, shader.stores.len());
    }

    #[test]
    fn rewrite_is_deterministic(shader in shader_strategy()) {
        let a = emit_ir_text(&rewritten(&shader)).expect("print");
        let b = emit_ir_text(&rewritten(&shader)).expect("print");
        prop_assert_eq!(a, b);
    }

    #[test]
    fn final_writes_are_preserved(shader in shader_strategy()) {
        let original = build(&shader);
        let module = rewritten(&shader);
        for cond in [0, 1] {
            let args = [IrValue::Int(cond)];
            let before = eval_function(main_fn(&original), &args).expect("original runs");
            let after = eval_function(main_fn(&module), &args).expect("rewritten runs");

            let after_writes = after.final_writes();
            for (cell, value) in before.final_writes() {
                prop_assert_eq!(after_writes.get(&cell), Some(&value));
            }
            prop_assert!(after.write_counts().values().all(|&n| n == 1));
        }
    }
}
