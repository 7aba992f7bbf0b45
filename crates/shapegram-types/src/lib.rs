//! Shared types for shapegram.
//!
//! This crate defines the grammar AST, the payloads that flow through a
//! derivation, hierarchical indices and the sparse change matrix used to
//! express incremental output updates.

mod error;
mod index;
mod payload;
pub mod ast;
pub mod matrix;

pub use error::StructureError;
pub use index::{index_key, Index};
pub use payload::Payload;

/// Result type for structural checks.
pub type Result<T> = std::result::Result<T, StructureError>;
