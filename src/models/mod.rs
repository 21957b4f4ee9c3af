pub mod claims;
pub mod session;
pub mod token;

pub use claims::{parse_claims, Claims, RolesContainer};
pub use session::{AppGate, InitializationState, Role, Session, SessionState};
pub use token::{PendingLogin, TokenSet};
