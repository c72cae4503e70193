use std::sync::Arc;

use bcrypt::BcryptError;
use thiserror::Error;

/// bcrypt only reads this many bytes of input; longer passwords are refused
/// instead of being silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

const DUMMY_PASSWORD: &str = "devora-tasks-unknown-user";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must be at most {} bytes", MAX_PASSWORD_BYTES)]
    TooLong,

    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// bcrypt hashing at a fixed cost. The work runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Fails when `cost` is outside the range bcrypt accepts.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)?;
        Ok(Self {
            cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }

        let password = password.to_owned();
        let cost = self.cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// Check `password` against a stored hash. A missing user (`None`) is checked
    /// against a dummy hash so it costs the same as a wrong password.
    pub async fn verify(&self, password: &str, hashed: Option<&str>) -> Result<bool, PasswordError> {
        let known = hashed.is_some();
        let usable = password.len() <= MAX_PASSWORD_BYTES;
        let hashed = hashed.map_or_else(|| self.dummy_hash.to_string(), str::to_owned);
        let password = password.to_owned();

        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await?;
        match matched {
            Ok(matched) => Ok(known && usable && matched),
            Err(e) => {
                tracing::warn!("Stored password hash is unreadable: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).unwrap()
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = hasher();
        let hashed = hasher.hash("83nicomoreno19").await.unwrap();
        assert!(hashed.starts_with("$2b$04$"));
        assert!(hasher.verify("83nicomoreno19", Some(&hashed)).await.unwrap());
        assert!(!hasher.verify("83nicomoreno18", Some(&hashed)).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() {
        let hasher = hasher();
        let a = hasher.hash("secret-pass").await.unwrap();
        let b = hasher.hash("secret-pass").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn overlong_password_is_refused_by_bytes() {
        let hasher = hasher();
        assert!(hasher.hash(&"a".repeat(MAX_PASSWORD_BYTES)).await.is_ok());
        assert!(matches!(
            hasher.hash(&"a".repeat(MAX_PASSWORD_BYTES + 1)).await,
            Err(PasswordError::TooLong)
        ));
        // 40 characters, 80 bytes
        assert!(matches!(
            hasher.hash(&"ü".repeat(40)).await,
            Err(PasswordError::TooLong)
        ));
    }

    #[tokio::test]
    async fn overlong_password_never_matches_its_prefix() {
        let hasher = hasher();
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);
        let hashed = hasher.hash(&prefix).await.unwrap();
        let longer = format!("{}extra", prefix);
        assert!(!hasher.verify(&longer, Some(&hashed)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_user_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify(DUMMY_PASSWORD, None).await.unwrap());
        assert!(!hasher.verify("anything", None).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("anything", Some("no-separator")).await.unwrap());
        assert!(!hasher.verify("anything", Some("")).await.unwrap());
    }

    #[test]
    fn invalid_cost_is_rejected() {
        assert!(PasswordHasher::new(3).is_err());
        assert!(PasswordHasher::new(32).is_err());
    }
}
