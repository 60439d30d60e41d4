pub mod preserve_outputs;
pub mod registry;
pub mod validate;

pub use preserve_outputs::{create_dxil_preserve_all_outputs_pass, PreserveAllOutputsPass};
pub use registry::{PassInfo, PassRegistry};
pub use validate::ValidatePass;

use crate::dxil::DxilModule;
use crate::error::PassError;
use crate::ir::function::IrFunction;
use crate::ir::module::IrModule;

/// A compiler pass that transforms one function at a time.
///
/// Passes must be deterministic: given the same input, the transformed
/// output must be identical across runs (no global mutable state, no
/// randomness). A pass only touches the function it is given and the
/// module's shader metadata.
pub trait FunctionPass {
    /// Registry argument, used in pipelines, error messages and diagnostics.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Whether running the pass twice in a row is equivalent to running it
    /// once. Non-idempotent passes may be scheduled only once per pipeline.
    fn is_idempotent(&self) -> bool {
        true
    }

    /// Runs the pass on `func`. Returns whether the function was modified.
    ///
    /// On error, the function state is unspecified and the pipeline aborts.
    fn run_on_function(
        &mut self,
        func: &mut IrFunction,
        dxil: &mut DxilModule,
    ) -> Result<bool, PassError>;
}

/// Manages and executes an ordered sequence of function passes.
///
/// Each pass runs over every function (in `FunctionId` order) before the
/// next pass starts. The pipeline aborts at the first error.
pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
    /// If set, dumps IR text to the log after the pass with this name completes.
    dump_after: Option<String>,
    /// If set, validates every function after every pass.
    verify_each: bool,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            dump_after: None,
            verify_each: false,
        }
    }

    /// Builds a pipeline from a comma-separated list of registry arguments,
    /// e.g. `"hlsl-dxil-preserve-all-outputs,validate"`.
    pub fn from_pipeline(registry: &PassRegistry, pipeline: &str) -> Result<Self, PassError> {
        let mut pm = Self::new();
        for arg in pipeline.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let info = registry.lookup(arg).ok_or_else(|| PassError::UnknownPass {
                arg: arg.to_owned(),
            })?;
            pm.add_boxed((info.factory)())?;
        }
        Ok(pm)
    }

    /// Appends a pass to the end of the pipeline.
    pub fn add_pass(&mut self, pass: impl FunctionPass + 'static) -> Result<(), PassError> {
        self.add_boxed(Box::new(pass))
    }

    /// Appends an already-boxed pass, e.g. one produced by a registry factory.
    ///
    /// Fails if `pass` is not idempotent and is already scheduled.
    pub fn add_boxed(&mut self, pass: Box<dyn FunctionPass>) -> Result<(), PassError> {
        if !pass.is_idempotent() && self.passes.iter().any(|p| p.name() == pass.name()) {
            return Err(PassError::PassScheduledTwice {
                pass: pass.name().to_owned(),
            });
        }
        self.passes.push(pass);
        Ok(())
    }

    /// Configures the manager to dump IR to the log after the named pass completes.
    pub fn set_dump_after(&mut self, pass_name: impl Into<String>) {
        self.dump_after = Some(pass_name.into());
    }

    /// Validates every function after every pass when enabled.
    pub fn set_verify_each(&mut self, verify: bool) {
        self.verify_each = verify;
    }

    /// Runs all passes in registration order on `module`.
    ///
    /// Returns whether any pass modified any function, or
    /// `Err((pass_name, error))` at the first failure.
    pub fn run(&mut self, module: &mut IrModule) -> Result<bool, (String, PassError)> {
        let mut modified = false;
        for pass in &mut self.passes {
            let name = pass.name();
            {
                let IrModule {
                    functions, dxil, ..
                } = &mut *module;
                let dxil = dxil.get_or_insert_with(DxilModule::default);
                for func in functions.iter_mut() {
                    let changed = pass
                        .run_on_function(func, dxil)
                        .map_err(|e| (name.to_owned(), e))?;
                    log::debug!("pass '{}' on '{}': modified = {}", name, func.name, changed);
                    modified |= changed;
                }
            }

            if self.verify_each {
                for func in module.functions() {
                    validate::validate_function(func).map_err(|e| (name.to_owned(), e))?;
                }
            }

            if self.dump_after.as_deref() == Some(name) {
                use crate::codegen::printer::emit_ir_text;
                match emit_ir_text(module) {
                    Ok(text) => log::debug!("--- IR after {} ---\n{}", name, text),
                    Err(e) => log::debug!("could not print IR after {}: {}", name, e),
                }
            }
        }
        Ok(modified)
    }

    /// Returns the names of all registered passes in pipeline order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
