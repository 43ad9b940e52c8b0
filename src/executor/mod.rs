//! Command execution module
//!
//! Provides async command execution with:
//! - Argument-vector construction for make
//! - Timeout support with process-group termination
//! - Output capture and truncation
//! - Working directory control

pub mod runner;

pub use runner::*;
