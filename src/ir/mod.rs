pub mod block;
pub mod builder;
pub mod function;
pub mod instr;
pub mod module;
pub mod types;
pub mod value;

pub use block::{BlockId, IrBlock};
pub use builder::InstrBuilder;
pub use function::{FunctionId, IrFunction, Param};
pub use instr::{BinOp, CastOp, InstrId, IrInstr};
pub use module::{IrFunctionBuilder, IrModule};
pub use types::{DType, IrType};
pub use value::{BlockParam, ValueDef, ValueId};
