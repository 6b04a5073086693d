//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod menu;
pub mod orders;
pub mod types;
