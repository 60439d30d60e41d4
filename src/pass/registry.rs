//! Pass registration: maps pipeline arguments to pass factories.

use std::collections::BTreeMap;

use crate::error::PassError;
use crate::pass::preserve_outputs::{self, create_dxil_preserve_all_outputs_pass};
use crate::pass::validate::{self, ValidatePass};
use crate::pass::FunctionPass;

/// A registered pass: its pipeline argument, description and factory.
#[derive(Clone, Copy)]
pub struct PassInfo {
    pub arg: &'static str,
    pub description: &'static str,
    pub factory: fn() -> Box<dyn FunctionPass>,
}

impl std::fmt::Debug for PassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassInfo")
            .field("arg", &self.arg)
            .field("description", &self.description)
            .finish()
    }
}

/// Registered passes, keyed (and iterated) by argument.
#[derive(Debug, Default)]
pub struct PassRegistry {
    passes: BTreeMap<&'static str, PassInfo>,
}

fn create_validate_pass() -> Box<dyn FunctionPass> {
    Box::new(ValidatePass)
}

impl PassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every pass this crate provides.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins = [
            PassInfo {
                arg: validate::PASS_ARG,
                description: validate::PASS_DESCRIPTION,
                factory: create_validate_pass,
            },
            PassInfo {
                arg: preserve_outputs::PASS_ARG,
                description: preserve_outputs::PASS_DESCRIPTION,
                factory: create_dxil_preserve_all_outputs_pass,
            },
        ];
        for info in builtins {
            if let Err(e) = registry.register(info) {
                log::warn!("skipping built-in pass: {}", e);
            }
        }
        registry
    }

    /// Registers `info`. Fails if its argument is already taken.
    pub fn register(&mut self, info: PassInfo) -> Result<(), PassError> {
        if self.passes.contains_key(info.arg) {
            return Err(PassError::DuplicateRegistration {
                arg: info.arg.to_owned(),
            });
        }
        log::trace!("registered pass '{}'", info.arg);
        self.passes.insert(info.arg, info);
        Ok(())
    }

    pub fn lookup(&self, arg: &str) -> Option<&PassInfo> {
        self.passes.get(arg)
    }

    /// Registered passes in argument order.
    pub fn passes(&self) -> impl Iterator<Item = &PassInfo> {
        self.passes.values()
    }
}
