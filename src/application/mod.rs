//! Application services: read-through and invalidate-on-write over the repositories.

pub mod error;
pub mod menu;
pub mod orders;
pub mod repos;
pub mod tables;
