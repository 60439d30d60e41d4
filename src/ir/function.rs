use std::collections::HashMap;

use crate::ir::block::{BlockId, IrBlock};
use crate::ir::instr::{InstrId, IrInstr};
use crate::ir::types::IrType;
use crate::ir::value::{ValueDef, ValueId};

/// Uniquely identifies a function within an `IrModule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// A named, typed parameter of a function.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

/// A function in SSA form.
///
/// Blocks are a flat `Vec` indexed by `BlockId`; the entry block is always
/// `blocks[0]` and its block params are the function arguments.
///
/// Instructions live in an arena indexed by `InstrId`. Blocks only record
/// program order, so a handle taken before a rewrite still names the same
/// instruction afterwards. Erased instructions leave a tombstone in the arena.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_ty: IrType,
    /// Flat list of blocks. `BlockId(n)` indexes `blocks[n]`.
    pub(crate) blocks: Vec<IrBlock>,
    /// Instruction arena. `InstrId(n)` indexes `instrs[n]`; `None` once erased.
    pub(crate) instrs: Vec<Option<IrInstr>>,
    /// Maps `ValueId` → its definition site.
    pub(crate) value_defs: HashMap<ValueId, ValueDef>,
    /// Maps `ValueId` → its type.
    pub(crate) value_types: HashMap<ValueId, IrType>,
    /// Counter for allocating fresh `ValueId`s.
    pub(crate) next_value: u32,
}

impl IrFunction {
    pub(crate) fn empty(name: String, params: Vec<Param>, return_ty: IrType) -> Self {
        Self {
            id: FunctionId(0), // reassigned by IrModule::add_function
            name,
            params,
            return_ty,
            blocks: Vec::new(),
            instrs: Vec::new(),
            value_defs: HashMap::new(),
            value_types: HashMap::new(),
            next_value: 0,
        }
    }

    /// Returns the entry block (always `BlockId(0)`).
    pub fn entry_block(&self) -> &IrBlock {
        &self.blocks[0]
    }

    pub fn block(&self, id: BlockId) -> Option<&IrBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn blocks(&self) -> &[IrBlock] {
        &self.blocks
    }

    /// Returns a live instruction by handle.
    pub fn instr(&self, id: InstrId) -> Option<&IrInstr> {
        self.instrs.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Iterates over every live instruction in block order, then program order.
    pub fn iter_instrs(&self) -> impl Iterator<Item = (InstrId, &IrInstr)> + '_ {
        self.blocks.iter().flat_map(move |block| {
            block
                .instrs
                .iter()
                .filter_map(move |&id| self.instr(id).map(|instr| (id, instr)))
        })
    }

    /// Instructions of one block in program order.
    pub fn block_instrs(&self, block: BlockId) -> impl Iterator<Item = (InstrId, &IrInstr)> + '_ {
        self.blocks
            .get(block.0 as usize)
            .into_iter()
            .flat_map(move |b| {
                b.instrs
                    .iter()
                    .filter_map(move |&id| self.instr(id).map(|instr| (id, instr)))
            })
    }

    /// Returns the terminator of `block` if the block is sealed.
    pub fn terminator(&self, block: BlockId) -> Option<&IrInstr> {
        let last = *self.block(block)?.instrs.last()?;
        self.instr(last).filter(|i| i.is_terminator())
    }

    /// A block is sealed when it ends with a terminator.
    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }

    /// Locates a live instruction: its block and index within that block.
    pub fn position(&self, id: InstrId) -> Option<(BlockId, usize)> {
        self.instr(id)?;
        self.blocks
            .iter()
            .find_map(|b| b.position_of(id).map(|idx| (b.id, idx)))
    }

    /// Returns the type of a value, if known.
    pub fn value_type(&self, v: ValueId) -> Option<&IrType> {
        self.value_types.get(&v)
    }

    /// Returns the definition site of a value.
    pub fn value_def(&self, v: ValueId) -> Option<&ValueDef> {
        self.value_defs.get(&v)
    }

    /// Returns the instruction that defines `v`, if it is an instruction result.
    pub fn defining_instr(&self, v: ValueId) -> Option<&IrInstr> {
        match self.value_defs.get(&v)? {
            ValueDef::InstrResult { instr } => self.instr(*instr),
            ValueDef::BlockParam { .. } => None,
        }
    }

    /// Returns the value of `v` if it is defined by an integer constant.
    pub fn const_int(&self, v: ValueId) -> Option<i64> {
        match self.defining_instr(v)? {
            IrInstr::ConstInt { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Handles of all `Return` instructions, in traversal order.
    pub fn returns(&self) -> Vec<InstrId> {
        self.iter_instrs()
            .filter(|(_, instr)| instr.is_return())
            .map(|(id, _)| id)
            .collect()
    }

    /// Allocates a fresh `ValueId`.
    pub(crate) fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Places `instr` in the arena and records its result's definition and
    /// type. The caller is responsible for linking the handle into a block.
    pub(crate) fn alloc_instr(&mut self, instr: IrInstr, result_ty: Option<IrType>) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        if let (Some(result), Some(ty)) = (instr.result(), result_ty) {
            self.value_defs
                .insert(result, ValueDef::InstrResult { instr: id });
            self.value_types.insert(result, ty);
        }
        self.instrs.push(Some(instr));
        id
    }

    /// Erases a live instruction from its block. Its handle is retired and
    /// its result (if any) loses its definition. Returns the erased
    /// instruction, or `None` if the handle was not live.
    pub fn erase_instr(&mut self, id: InstrId) -> Option<IrInstr> {
        let (block, idx) = self.position(id)?;
        self.blocks[block.0 as usize].instrs.remove(idx);
        let instr = self.instrs[id.0 as usize].take()?;
        if let Some(result) = instr.result() {
            self.value_defs.remove(&result);
            self.value_types.remove(&result);
        }
        Some(instr)
    }
}
