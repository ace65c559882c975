//! Library exports for wishtree, shared between the binary and tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
