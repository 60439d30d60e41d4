//! Store every element of every written output exactly once per return.
//!
//! Shaders may write outputs sparsely, conditionally, or more than once.
//! Downstream stages expect each output component to be written exactly
//! once on every path, so this pass:
//!
//! 1. collects the `storeOutput` / `storePatchConstant` calls of a function,
//! 2. creates one scratch `alloca` per written signature element at entry,
//! 3. redirects each original call into a store to its scratch slot,
//! 4. before every `ret`, reloads every component of every scratch slot and
//!    re-emits the output intrinsic for it,
//! 5. erases the original calls.
//!
//! Scratch slots are left for a later promotion pass to turn into SSA values.

use std::collections::BTreeMap;

use crate::dxil::{is_dxil_op_call, DxilModule, OpCode, OpTable, SignatureElement};
use crate::error::PassError;
use crate::ir::builder::InstrBuilder;
use crate::ir::function::IrFunction;
use crate::ir::instr::{InstrId, IrInstr};
use crate::ir::types::IrType;
use crate::ir::value::ValueId;
use crate::pass::FunctionPass;

pub const PASS_ARG: &str = "hlsl-dxil-preserve-all-outputs";
pub const PASS_DESCRIPTION: &str = "DXIL preserve all outputs";

/// Creates the preserve-all-outputs pass.
pub fn create_dxil_preserve_all_outputs_pass() -> Box<dyn FunctionPass> {
    Box::new(PreserveAllOutputsPass)
}

// ===========================================================================
// OutputStore
// ===========================================================================

/// An original output-store intrinsic call.
///
/// Operand layout: `(opcode, signature id, row, column, value)`.
#[derive(Debug, Clone)]
struct OutputStore {
    call: InstrId,
    opcode: OpCode,
    signature_id: u32,
    args: Vec<ValueId>,
}

impl OutputStore {
    const SIGNATURE_INDEX: usize = 1;
    const ROW_INDEX: usize = 2;
    const COLUMN_INDEX: usize = 3;
    const VALUE_INDEX: usize = 4;

    /// Returns the store view of `instr`, or `None` if it is not an output
    /// store. The signature id must be a constant.
    fn recognize(
        func: &IrFunction,
        call: InstrId,
        instr: &IrInstr,
    ) -> Result<Option<Self>, PassError> {
        let opcode = if is_dxil_op_call(func, instr, OpCode::StoreOutput) {
            OpCode::StoreOutput
        } else if is_dxil_op_call(func, instr, OpCode::StorePatchConstant) {
            OpCode::StorePatchConstant
        } else {
            return Ok(None);
        };
        let args = match instr {
            IrInstr::Call { args, .. } => args.clone(),
            _ => return Ok(None),
        };

        let unsupported = |detail: String| PassError::UnsupportedShader {
            func: func.name.clone(),
            detail,
        };
        if args.len() <= Self::VALUE_INDEX {
            return Err(unsupported(format!(
                "{} call has {} operands, expected {}",
                opcode,
                args.len(),
                Self::VALUE_INDEX + 1
            )));
        }
        let id = func
            .const_int(args[Self::SIGNATURE_INDEX])
            .ok_or_else(|| unsupported(format!("{} with a non-constant signature id", opcode)))?;
        let signature_id = u32::try_from(id)
            .map_err(|_| unsupported(format!("{} with signature id {}", opcode, id)))?;

        Ok(Some(Self {
            call,
            opcode,
            signature_id,
            args,
        }))
    }

    fn row(&self) -> ValueId {
        self.args[Self::ROW_INDEX]
    }

    fn column(&self) -> ValueId {
        self.args[Self::COLUMN_INDEX]
    }

    fn value(&self) -> ValueId {
        self.args[Self::VALUE_INDEX]
    }

    /// The signature element this store writes. Patch-constant stores
    /// resolve against the patch-constant signature.
    fn signature_element<'d>(
        &self,
        func: &str,
        dxil: &'d DxilModule,
    ) -> Result<&'d SignatureElement, PassError> {
        let (signature, label) = match self.opcode {
            OpCode::StorePatchConstant => (dxil.patch_constant_signature(), "patch constant"),
            OpCode::StoreOutput => (dxil.output_signature(), "output"),
        };
        signature
            .element(self.signature_id)
            .ok_or_else(|| PassError::UnknownSignatureElement {
                func: func.to_owned(),
                signature: label,
                id: self.signature_id,
            })
    }
}

// ===========================================================================
// OutputElement
// ===========================================================================

/// Per-signature-element scratch storage.
///
/// Created from the element's metadata; `materialize` then allocates the
/// scratch slot. Single-component elements get a scalar slot, everything
/// else a flat `[rows * cols x T]` array addressed as `row * cols + col`.
#[derive(Debug, Clone)]
struct OutputElement {
    element: SignatureElement,
    scratch: Option<ValueId>,
}

impl OutputElement {
    fn new(element: SignatureElement) -> Self {
        Self {
            element,
            scratch: None,
        }
    }

    fn num_elements(&self) -> u32 {
        self.element.rows * self.element.cols
    }

    fn is_single_element(&self) -> bool {
        self.element.rows == 1 && self.element.cols == 1
    }

    fn output_opcode(&self) -> OpCode {
        if self.element.is_patch_constant() {
            OpCode::StorePatchConstant
        } else {
            OpCode::StoreOutput
        }
    }

    /// Emits the scratch `alloca` at the builder's insertion point.
    fn materialize(&mut self, builder: &mut InstrBuilder<'_>) {
        let elem_ty = self.element.comp_type.ir_type();
        let alloca_ty = if self.is_single_element() {
            elem_ty
        } else {
            IrType::array(elem_ty, self.num_elements() as usize)
        };
        let scratch = builder.create_alloca(alloca_ty, Some(self.element.name.as_str()));
        log::trace!(
            "{}: scratch {} for '{}' (id {}, {}x{})",
            builder.func().name,
            scratch,
            self.element.name,
            self.element.id,
            self.element.rows,
            self.element.cols
        );
        self.scratch = Some(scratch);
    }

    fn scratch(&self, builder: &InstrBuilder<'_>) -> Result<ValueId, PassError> {
        self.scratch.ok_or_else(|| PassError::Internal {
            func: builder.func().name.clone(),
            detail: format!("scratch for '{}' used before it was created", self.element.name),
        })
    }

    /// Stores `value` into the scratch slot at (`row`, `col`).
    fn store_temp(
        &self,
        builder: &mut InstrBuilder<'_>,
        row: ValueId,
        col: ValueId,
        value: ValueId,
    ) -> Result<(), PassError> {
        let addr = self.temp_addr(builder, row, col)?;
        builder.create_store(value, addr);
        Ok(())
    }

    /// Reloads every component in row-major order and emits one output
    /// intrinsic call per component.
    fn store_output(
        &self,
        builder: &mut InstrBuilder<'_>,
        op_table: &mut OpTable,
    ) -> Result<(), PassError> {
        let opcode = self.output_opcode();
        let callee = op_table
            .get_op_func(opcode, self.element.comp_type.base_type())
            .name
            .clone();
        for row in 0..self.element.rows {
            for col in 0..self.element.cols {
                self.store_output_component(builder, &callee, opcode, row, col)?;
            }
        }
        Ok(())
    }

    fn store_output_component(
        &self,
        builder: &mut InstrBuilder<'_>,
        callee: &str,
        opcode: OpCode,
        row: u32,
        col: u32,
    ) -> Result<(), PassError> {
        let col = u8::try_from(col).map_err(|_| PassError::UnsupportedShader {
            func: builder.func().name.clone(),
            detail: format!("'{}' has more than 256 columns", self.element.name),
        })?;
        let opcode_v = builder.get_int32(opcode.value());
        let sig_id = builder.get_int32(self.element.id);
        let row_v = builder.get_int32(row);
        let col_v = builder.get_int8(col);
        let value = self.load_temp(builder, row_v, col_v)?;
        builder.create_call(callee, vec![opcode_v, sig_id, row_v, col_v, value], None);
        Ok(())
    }

    fn load_temp(
        &self,
        builder: &mut InstrBuilder<'_>,
        row: ValueId,
        col: ValueId,
    ) -> Result<ValueId, PassError> {
        let addr = self.temp_addr(builder, row, col)?;
        Ok(builder.create_load(addr))
    }

    fn temp_addr(
        &self,
        builder: &mut InstrBuilder<'_>,
        row: ValueId,
        col: ValueId,
    ) -> Result<ValueId, PassError> {
        // Scalar slots are used directly; row and col are 0 by construction.
        if self.is_single_element() {
            self.scratch(builder)
        } else {
            self.create_gep(builder, row, col)
        }
    }

    /// `&scratch[0][row * cols + col]`. The stride is built at the row's own
    /// width; the column is normalized to i32.
    fn create_gep(
        &self,
        builder: &mut InstrBuilder<'_>,
        row: ValueId,
        col: ValueId,
    ) -> Result<ValueId, PassError> {
        let scratch = self.scratch(builder)?;
        let row_ty = self.int_operand_type(builder, row, "row")?;
        if row_ty != IrType::i32() {
            return Err(PassError::IndexWidthMismatch {
                func: builder.func().name.clone(),
                width: row_ty.int_width().unwrap_or(0),
            });
        }
        let stride = builder.const_int(row_ty, i64::from(self.element.cols));
        let row_offset = builder.create_mul(row, stride);
        let col = self.as_i32(builder, col)?;
        let index = builder.create_add(row_offset, col);
        let zero = builder.get_int32(0);
        Ok(builder.create_inbounds_gep(scratch, vec![zero, index]))
    }

    /// Truncates or zero-extends an integer index to i32.
    fn as_i32(&self, builder: &mut InstrBuilder<'_>, col: ValueId) -> Result<ValueId, PassError> {
        let col_ty = self.int_operand_type(builder, col, "column")?;
        let i32_ty = IrType::i32();
        let width = col_ty.int_width().unwrap_or(32);
        Ok(if width > 32 {
            builder.create_trunc(col, i32_ty)
        } else if width < 32 {
            builder.create_zext(col, i32_ty)
        } else {
            col
        })
    }

    fn int_operand_type(
        &self,
        builder: &InstrBuilder<'_>,
        v: ValueId,
        what: &str,
    ) -> Result<IrType, PassError> {
        builder
            .value_type(v)
            .filter(|ty| ty.is_int())
            .cloned()
            .ok_or_else(|| PassError::UnsupportedShader {
                func: builder.func().name.clone(),
                detail: format!("{} index {} of '{}' is not an integer", what, v, self.element.name),
            })
    }
}

/// Signature id → scratch storage, iterated in ascending id order.
type OutputMap = BTreeMap<u32, OutputElement>;

// ===========================================================================
// PreserveAllOutputsPass
// ===========================================================================

/// Rewrites output stores so that each written signature element is stored
/// in full, exactly once, before every return.
///
/// Not idempotent: a second run would see the epilogue's calls as original
/// stores and emit another epilogue.
pub struct PreserveAllOutputsPass;

impl FunctionPass for PreserveAllOutputsPass {
    fn name(&self) -> &'static str {
        PASS_ARG
    }

    fn description(&self) -> &'static str {
        PASS_DESCRIPTION
    }

    fn is_idempotent(&self) -> bool {
        false
    }

    fn run_on_function(
        &mut self,
        func: &mut IrFunction,
        dxil: &mut DxilModule,
    ) -> Result<bool, PassError> {
        let output_stores = collect_output_stores(func)?;
        if output_stores.is_empty() {
            log::debug!("{}: no output stores in '{}'", PASS_ARG, func.name);
            return Ok(false);
        }

        let mut output_map = generate_output_map(&func.name, &output_stores, dxil)?;
        log::debug!(
            "{}: '{}' has {} output stores to {} signature elements",
            PASS_ARG,
            func.name,
            output_stores.len(),
            output_map.len()
        );

        create_temp_allocas(&mut output_map, func);
        insert_temp_output_stores(func, &output_stores, &output_map)?;
        insert_final_output_stores(func, &output_map, dxil.op_table_mut())?;
        remove_original_output_stores(func, &output_stores);

        Ok(true)
    }
}

/// All output-store calls in traversal order. Does not modify `func`.
fn collect_output_stores(func: &IrFunction) -> Result<Vec<OutputStore>, PassError> {
    let mut stores = Vec::new();
    for (id, instr) in func.iter_instrs() {
        if let Some(store) = OutputStore::recognize(func, id, instr)? {
            stores.push(store);
        }
    }
    Ok(stores)
}

/// One `OutputElement` per distinct signature id; the first store seen for
/// an id determines its element. Output and patch-constant stores may not
/// share an id.
fn generate_output_map(
    func: &str,
    stores: &[OutputStore],
    dxil: &DxilModule,
) -> Result<OutputMap, PassError> {
    let mut map = OutputMap::new();
    for store in stores {
        if let Some(output) = map.get(&store.signature_id) {
            if output.output_opcode() != store.opcode {
                return Err(PassError::UnsupportedShader {
                    func: func.to_owned(),
                    detail: format!(
                        "{} and {} both write signature id {}",
                        output.output_opcode(),
                        store.opcode,
                        store.signature_id
                    ),
                });
            }
            continue;
        }
        let element = store.signature_element(func, dxil)?;
        map.insert(store.signature_id, OutputElement::new(element.clone()));
    }
    Ok(map)
}

/// Allocates every scratch slot at the first insertion point of the entry
/// block, so each slot dominates every store and every return.
fn create_temp_allocas(map: &mut OutputMap, func: &mut IrFunction) {
    let mut builder = InstrBuilder::at_entry(func);
    for output in map.values_mut() {
        output.materialize(&mut builder);
    }
}

/// Adds a scratch store in front of every original call. The calls stay in
/// place until `remove_original_output_stores`.
fn insert_temp_output_stores(
    func: &mut IrFunction,
    stores: &[OutputStore],
    map: &OutputMap,
) -> Result<(), PassError> {
    for store in stores {
        let output = map
            .get(&store.signature_id)
            .ok_or_else(|| PassError::MissingOutputElement {
                func: func.name.clone(),
                id: store.signature_id,
            })?;
        let func_name = func.name.clone();
        let mut builder =
            InstrBuilder::before(func, store.call).ok_or_else(|| PassError::Internal {
                func: func_name,
                detail: format!("output store {:?} is no longer in the function", store.call),
            })?;
        output.store_temp(&mut builder, store.row(), store.column(), store.value())?;
    }
    Ok(())
}

/// Emits the full epilogue, every element in ascending id order, before
/// each return.
fn insert_final_output_stores(
    func: &mut IrFunction,
    map: &OutputMap,
    op_table: &mut OpTable,
) -> Result<(), PassError> {
    let returns = func.returns();
    log::trace!("{}: {} returns in '{}'", PASS_ARG, returns.len(), func.name);

    for ret in returns {
        for output in map.values() {
            let func_name = func.name.clone();
            let mut builder = InstrBuilder::before(func, ret).ok_or_else(|| PassError::Internal {
                func: func_name,
                detail: format!("return {:?} is no longer in the function", ret),
            })?;
            output.store_output(&mut builder, op_table)?;
        }
    }
    Ok(())
}

fn remove_original_output_stores(func: &mut IrFunction, stores: &[OutputStore]) {
    for store in stores {
        func.erase_instr(store.call);
    }
}
