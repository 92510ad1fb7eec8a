//! Macro execution: statement building, binding and result normalization

mod engine;
mod result;

pub use engine::MacroExecutor;
pub use result::ExecutionResult;
