//! Shared helpers.

pub mod file_handler;
pub mod rounding;
