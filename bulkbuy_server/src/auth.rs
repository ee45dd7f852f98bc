//! Access tokens for the WebSocket endpoint.
//!
//! Tokens are deliberately simple: `buyer_id:expiry:signature`, where the signature is
//! the HMAC-SHA256 of `buyer_id:expiry` under the server's `BB_API_SECRET`. They grant
//! nothing beyond the ability to open an event stream, so a full JWT stack is overkill.

use bb_common::Secret;
use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{errors::AuthError, helpers::calculate_hmac};

pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;

#[derive(Clone)]
pub struct TokenIssuer {
    secret: Secret<String>,
    validity: Duration,
}

impl TokenIssuer {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret, validity: Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS) }
    }

    pub fn with_validity(secret: Secret<String>, validity: Duration) -> Self {
        Self { secret, validity }
    }

    /// Issue a signed access token for `buyer_id`, valid until `now + validity`.
    pub fn issue(&self, buyer_id: &str) -> String {
        let expiry = (Utc::now() + self.validity).timestamp();
        let payload = format!("{buyer_id}:{expiry}");
        let sig = calculate_hmac(self.secret.reveal(), payload.as_bytes());
        format!("{payload}:{sig}")
    }

    /// Verify a token and return the buyer id it was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        // buyer ids may contain colons, so peel the signature and expiry off the right
        let mut parts = token.rsplitn(3, ':');
        let sig = parts.next().ok_or_else(|| AuthError::PoorlyFormattedToken("empty token".into()))?;
        let expiry = parts.next().ok_or_else(|| AuthError::PoorlyFormattedToken("missing expiry".into()))?;
        let buyer_id = parts.next().ok_or_else(|| AuthError::PoorlyFormattedToken("missing buyer id".into()))?;
        let payload = format!("{buyer_id}:{expiry}");
        let expected = calculate_hmac(self.secret.reveal(), payload.as_bytes());
        if sig != expected {
            warn!("🔐️ Rejecting access token with an invalid signature");
            return Err(AuthError::ValidationError);
        }
        let expiry = expiry
            .parse::<i64>()
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("invalid expiry timestamp. {e}")))?;
        let expiry = DateTime::from_timestamp(expiry, 0)
            .ok_or_else(|| AuthError::PoorlyFormattedToken("expiry out of range".into()))?;
        if expiry < Utc::now() {
            return Err(AuthError::TokenExpired);
        }
        Ok(buyer_id.to_string())
    }
}
