//! Domain layer types and invariants.

pub mod commands;
pub mod content;
pub mod error;
pub mod filters;
pub mod types;
