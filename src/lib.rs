//! Library exports for storefront-session, shared between the binary and tests.

pub mod api;
pub mod config;
pub mod error;
pub mod guards;
pub mod identity;
pub mod models;
pub mod navigation;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
