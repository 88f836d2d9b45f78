//! Shared types for the plaza backend
//!
//! Common types used across crates: the unified error system and the
//! domain models for shops, vouchers and voucher orders.

pub mod error;
pub mod models;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
