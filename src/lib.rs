//! Weatherdeck - Weather monitoring dashboard service
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod error;
pub mod registry;
pub mod routes;
pub mod source;
pub mod store;
