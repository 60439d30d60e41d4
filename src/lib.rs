//! dxir: a block-parameter SSA IR for DXIL shaders.
//!
//! Pipeline:
//!
//! ```text
//! IrFunctionBuilder → [IrModule + DxilModule] → PassManager → emit_ir_text
//! ```
//!
//! Passes:
//! 1. `PreserveAllOutputsPass` (`hlsl-dxil-preserve-all-outputs`):
//!    every written output element is stored in full, exactly once, before
//!    every return
//! 2. `ValidatePass` (`validate`): SSA structure and memory operand types
//!
//! `interp` executes a function and records its output intrinsic calls.

pub mod codegen;
pub mod dxil;
pub mod error;
pub mod interp;
pub mod ir;
pub mod pass;

pub use error::Error;

use crate::ir::module::IrModule;
use crate::pass::{PassManager, PreserveAllOutputsPass};

/// Runs the preserve-all-outputs pass over every function in `module`.
///
/// Returns whether any function was modified.
pub fn preserve_all_outputs(module: &mut IrModule) -> Result<bool, Error> {
    let mut pm = PassManager::new();
    pm.add_pass(PreserveAllOutputsPass)?;
    pm.run(module).map_err(|(pass, e)| {
        log::debug!("pipeline aborted in '{}'", pass);
        Error::Pass(e)
    })
}
