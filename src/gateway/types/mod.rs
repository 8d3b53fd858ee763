//! Gateway types module
//!
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`RpcError`]: handler errors with numeric codes
//! - [`response::error_codes`]: code constants

pub mod response;

// Re-export commonly used types at module root
pub use response::{ApiResponse, RpcError, RpcResult, error_codes, ok};
