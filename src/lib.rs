//! Library exports for authrelay, shared between the binary and tests.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod metrics;
pub mod models;
pub mod store;
pub mod utils;
