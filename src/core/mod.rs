//! Core types shared across the mining pipeline.

mod dialect;
mod error;
mod method;

pub use dialect::JavaDialect;
pub use error::{Error, Result};
pub use method::{CompileState, ExtractedMethod, ENTRY_POINT, UNASSIGNED_ID};
