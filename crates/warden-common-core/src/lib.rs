//! Warden common core types and utilities.

pub mod id;
pub mod timestamp;

pub use id::*;
pub use timestamp::Timestamp;
