use std::collections::HashMap;

use crate::dxil::DxilModule;
use crate::ir::block::{BlockId, IrBlock};
use crate::ir::function::{FunctionId, IrFunction, Param};
use crate::ir::instr::IrInstr;
use crate::ir::types::IrType;
use crate::ir::value::{BlockParam, ValueDef, ValueId};

/// The top-level IR container.
///
/// Invariants:
/// - Function names are unique within a module.
/// - `FunctionId(n)` always indexes `functions[n]`.
/// - Once a function is added via `add_function()`, it is immutable to external
///   callers. Passes mutate through the `pub(crate)` fields.
#[derive(Debug, Default)]
pub struct IrModule {
    pub name: String,
    pub(crate) functions: Vec<IrFunction>,
    pub(crate) function_index: HashMap<String, FunctionId>,
    /// Shader metadata: signatures and the intrinsic table.
    pub(crate) dxil: Option<DxilModule>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            function_index: HashMap::new(),
            dxil: None,
        }
    }

    pub fn function(&self, id: FunctionId) -> Option<&IrFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&IrFunction> {
        let id = self.function_index.get(name)?;
        self.functions.get(id.0 as usize)
    }

    pub fn functions(&self) -> &[IrFunction] {
        &self.functions
    }

    /// Seals and registers a function built by `IrFunctionBuilder`.
    /// Returns `Err` if the name is already taken.
    pub fn add_function(&mut self, mut func: IrFunction) -> Result<FunctionId, String> {
        if self.function_index.contains_key(&func.name) {
            return Err(format!("function '{}' already defined", func.name));
        }
        let id = FunctionId(self.functions.len() as u32);
        func.id = id;
        self.function_index.insert(func.name.clone(), id);
        self.functions.push(func);
        Ok(id)
    }

    /// Attaches shader metadata, replacing any existing metadata.
    pub fn set_dxil_module(&mut self, dxil: DxilModule) {
        self.dxil = Some(dxil);
    }

    pub fn dxil_module(&self) -> Option<&DxilModule> {
        self.dxil.as_ref()
    }

    /// Returns the shader metadata, creating empty metadata if none is attached.
    pub fn get_or_create_dxil_module(&mut self) -> &mut DxilModule {
        self.dxil.get_or_insert_with(DxilModule::default)
    }
}

/// Builder for constructing an `IrFunction` incrementally.
///
/// Call order:
/// 1. `create_block()`: allocate one or more blocks
/// 2. `add_block_param()`: add typed params to each block
/// 3. `set_current_block()`: point the cursor at a block
/// 4. `push_instr()` / `emit_*()`: emit instructions into the current block
/// 5. `build()`: consume the builder and return the completed `IrFunction`
///
/// `build()` panics in debug builds if any block lacks a terminator.
pub struct IrFunctionBuilder {
    func: IrFunction,
    current_block: Option<BlockId>,
}

impl IrFunctionBuilder {
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_ty: IrType) -> Self {
        Self {
            func: IrFunction::empty(name.into(), params, return_ty),
            current_block: None,
        }
    }

    /// Creates a new block and returns its `BlockId`.
    pub fn create_block(&mut self, name: Option<&str>) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func
            .blocks
            .push(IrBlock::new(id, name.map(str::to_owned)));
        id
    }

    /// Adds a typed parameter to a block. Returns the `ValueId` of the new param.
    pub fn add_block_param(&mut self, block: BlockId, name: Option<&str>, ty: IrType) -> ValueId {
        let value_id = self.func.fresh_value();
        let param = BlockParam {
            id: value_id,
            ty: ty.clone(),
            name: name.map(str::to_owned),
        };
        self.func.blocks[block.0 as usize].params.push(param);
        self.func
            .value_defs
            .insert(value_id, ValueDef::BlockParam { block });
        self.func.value_types.insert(value_id, ty);
        value_id
    }

    /// Returns the current insertion block.
    pub fn current_block(&self) -> BlockId {
        self.current_block.expect("IrFunctionBuilder: no current block set")
    }

    /// Sets the current insertion block.
    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// Allocates a fresh `ValueId` without attaching it to any instruction.
    pub fn fresh_value(&mut self) -> ValueId {
        self.func.fresh_value()
    }

    /// Appends an instruction to the current block.
    ///
    /// `result_ty` is the type of the instruction's result value, if any.
    /// It must be `Some` iff the instruction produces a result.
    ///
    /// Panics in debug builds if the current block is already sealed.
    pub fn push_instr(&mut self, instr: IrInstr, result_ty: Option<IrType>) -> Option<ValueId> {
        let block_id = self
            .current_block
            .expect("IrFunctionBuilder: no current block set before push_instr");
        debug_assert!(
            !self.func.is_sealed(block_id),
            "push_instr called on already-sealed block {:?}",
            block_id
        );

        let result = instr.result();
        let id = self.func.alloc_instr(instr, result_ty);
        self.func.blocks[block_id.0 as usize].instrs.push(id);
        result
    }

    /// Returns true if the current block already ends with a terminator.
    pub fn is_current_block_terminated(&self) -> bool {
        self.current_block
            .map_or(false, |block| self.func.is_sealed(block))
    }

    /// Emits an integer constant of type `ty`.
    pub fn emit_const_int(&mut self, value: i64, ty: IrType) -> ValueId {
        let result = self.func.fresh_value();
        self.push_instr(
            IrInstr::ConstInt {
                result,
                value,
                ty: ty.clone(),
            },
            Some(ty),
        );
        result
    }

    /// Emits a floating-point constant of type `ty`.
    pub fn emit_const_float(&mut self, value: f64, ty: IrType) -> ValueId {
        let result = self.func.fresh_value();
        self.push_instr(
            IrInstr::ConstFloat {
                result,
                value,
                ty: ty.clone(),
            },
            Some(ty),
        );
        result
    }

    /// Emits a call with no result.
    pub fn emit_call(&mut self, callee: impl Into<String>, args: Vec<ValueId>) {
        self.push_instr(
            IrInstr::Call {
                result: None,
                callee: callee.into(),
                args,
                result_ty: None,
            },
            None,
        );
    }

    /// Terminates the current block with `ret`.
    pub fn emit_return(&mut self, values: Vec<ValueId>) {
        self.push_instr(IrInstr::Return { values }, None);
    }

    /// Consumes the builder and returns the completed `IrFunction`.
    ///
    /// Panics in debug builds if any block is not sealed (lacks a terminator).
    pub fn build(self) -> IrFunction {
        #[cfg(debug_assertions)]
        for block in &self.func.blocks {
            assert!(
                self.func.is_sealed(block.id),
                "build() called with unsealed block {:?} ('{:?}')",
                block.id,
                block.name
            );
        }
        self.func
    }
}
