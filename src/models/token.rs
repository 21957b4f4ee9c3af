use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The credentials issued by the token endpoint for one session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// True if the access token stays valid for at least `min_validity` more.
    pub fn is_valid_for(&self, min_validity: Duration) -> bool {
        self.expires_at - Utc::now() > min_validity
    }

    /// True if a refresh token exists and has not passed its own expiry.
    pub fn can_refresh(&self) -> bool {
        match (&self.refresh_token, self.refresh_expires_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(at)) => at > Utc::now(),
        }
    }
}

/// What the client must remember between sending the browser to the login
/// screen and receiving it back with an authorization code.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_set(expires_in: i64, refresh: Option<i64>) -> TokenSet {
        TokenSet {
            access_token: "access".to_string(),
            refresh_token: refresh.map(|_| "refresh".to_string()),
            id_token: None,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            refresh_expires_at: refresh.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    #[test]
    fn test_validity_window() {
        let tokens = token_set(60, None);
        assert!(tokens.is_valid_for(Duration::seconds(30)));
        assert!(!tokens.is_valid_for(Duration::seconds(90)));
    }

    #[test]
    fn test_can_refresh() {
        assert!(!token_set(60, None).can_refresh());
        assert!(token_set(60, Some(1800)).can_refresh());
        assert!(!token_set(60, Some(-5)).can_refresh());
    }
}
