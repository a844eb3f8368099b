//! Infrastructure layer
//!
//! - Configuration loading
//! - CLI argument processing for the demo binary
//! - Result storage
//! - In-memory back stack surface

pub mod back_stack;
pub mod cli;
pub mod config;
pub mod result_store;
