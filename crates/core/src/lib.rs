//! `kardex-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, quantities, optimistic-concurrency expectations and the domain
//! error model shared by every other crate in the workspace.

pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{MovementId, ProductId, TransferId, WarehouseId};
pub use quantity::Quantity;
pub use value_object::ValueObject;
pub use version::{ExpectedVersion, Versioned};
