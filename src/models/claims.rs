use std::collections::HashMap;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims read from an access token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Claims {
    pub sub: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub preferred_username: Option<String>,
    pub scope: Option<String>,
    pub realm_access: Option<RolesContainer>,
    pub resource_access: Option<HashMap<String, RolesContainer>>,
    /// Any additional claim fields we don't explicitly model.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RolesContainer {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Realm roles, in token order.
    pub fn realm_roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|ra| ra.roles.as_slice())
            .unwrap_or_default()
    }

    /// Roles granted on a specific client of the realm.
    pub fn resource_roles(&self, client_id: &str) -> &[String] {
        self.resource_access
            .as_ref()
            .and_then(|access| access.get(client_id))
            .map(|container| container.roles.as_slice())
            .unwrap_or_default()
    }

    /// `preferred_username`, falling back to the subject.
    pub fn username(&self) -> Option<&str> {
        self.preferred_username.as_deref().or(self.sub.as_deref())
    }
}

/// Reads the payload of a JWT without checking its signature.
///
/// The client only uses claims for display and guard decisions; the gateway
/// validates every token it receives.
pub fn parse_claims(token: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| format!("Failed to decode token claims: {}", e))
}
