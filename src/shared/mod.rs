// Shared kernel: error types and utilities used by every module

pub mod errors;
pub mod utils;

pub use errors::{AppError, AppResult};
