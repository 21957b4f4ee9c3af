//! Outbound request mediation for calls to the API gateway.

mod client;

pub use client::ApiClient;
