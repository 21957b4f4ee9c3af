//! Presentation-boundary access checks. These only shape what the user sees;
//! the API gateway enforces access on its own.

mod inline;
mod route;

pub use inline::InlineGuard;
pub use route::{RouteDecision, RouteGuard};
