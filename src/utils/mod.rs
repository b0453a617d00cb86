//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Process execution with a deadline
//! - `io` - Atomic file writes with consistent error handling
//! - `validation` - Input validation helpers

pub mod command;
pub mod io;
pub mod validation;
