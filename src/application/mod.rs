//! Application services: filter strategies, registry loading and evaluation.

pub mod engine;
pub mod error;
pub mod filters;
pub mod invalidation;
pub mod registry_loader;
pub mod repos;
