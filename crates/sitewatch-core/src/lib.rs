//! Core domain + scheduling logic for the sitewatch monitor.
//!
//! This crate is intentionally framework-agnostic. Discord / OpenAI live
//! behind ports (traits) implemented in adapter crates; command routing and
//! the chat gateway are outside collaborators entirely.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fetch;
pub mod logging;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use errors::{Error, Result};
