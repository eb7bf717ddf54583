//! Filter-driven visibility for context-menu commands.
//!
//! Commands and their filters are configuration records in a content tree.
//! [`application::engine::FilterChainEngine`] answers whether a command is
//! shown for a selected node, memoizing the command registry in a
//! [`cache::NamespacedCache`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
