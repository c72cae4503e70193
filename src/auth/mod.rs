//! Credential issuance and verification.
//!
//! Handlers only see the [`TokenMaker`] capability; [`JwtMaker`] is the
//! HS256 implementation wired in by `main`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod jwt;
pub mod password;

pub use jwt::{JwtMaker, MIN_SECRET_LEN};
pub use password::{PasswordError, PasswordHasher};

/// Authenticated identity carried by a verified access token.
///
/// Lives in the request extensions for one request and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Payload {
    pub fn new(user_id: i64, username: impl Into<String>, duration: Duration) -> Self {
        // Whole seconds, so the payload survives the token round trip unchanged
        let issued_at = Utc::now().trunc_subsecs(0);
        Self {
            id: Uuid::new_v4(),
            user_id,
            username: username.into(),
            issued_at,
            expired_at: issued_at + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expired_at
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid key size: must be at least {0} characters")]
    InvalidKey(usize),

    #[error("token has expired")]
    Expired,

    #[error("token is invalid: {0}")]
    Invalid(String),

    #[error("token generation failed: {0}")]
    Encoding(String),
}

/// Creates and verifies bearer tokens.
pub trait TokenMaker: Send + Sync {
    fn create_token(
        &self,
        user_id: i64,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError>;

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}
