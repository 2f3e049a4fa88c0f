/// Shared types for the Otter Flow client
///
/// This crate provides common type definitions, constants, and utilities
/// that are used across the SDK and the command-line front end.

pub mod address;
pub mod amount;
pub mod constants;
pub mod errors;
pub mod pool;
pub mod position;
pub mod role;
pub mod transaction;

// Re-export all public types
pub use address::*;
pub use amount::*;
pub use constants::*;
pub use errors::*;
pub use pool::*;
pub use position::*;
pub use role::*;
pub use transaction::*;

pub use ethnum::U256;

/// Result type alias using the shared error type
pub type OtterResult<T> = std::result::Result<T, OtterError>;
