//! Protocol implementations.

pub mod stk500;

// Re-export common types
pub use stk500::{Command, CommandFrame, Response};
