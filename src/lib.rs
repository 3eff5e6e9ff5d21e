//! mixgate aggregates dynamically registered information modules for a
//! coordinate.
//!
//! Modules register over HTTP, declare dependencies on each other, and are
//! queried recursively with per-coordinate response caching.

pub mod admin;
pub mod config;
pub mod core;
pub mod logging;
pub mod service;
pub(crate) mod utils;
