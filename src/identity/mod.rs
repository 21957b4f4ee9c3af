pub mod keycloak;
pub mod pkce;
pub mod provider;

// Re-export from provider.rs so we can do "use crate::identity::*;"
pub use keycloak::KeycloakClient;
pub use provider::*;
