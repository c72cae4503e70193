//! Ownership gate for owned resources.
//!
//! A request reaches the gate with a verified [`Payload`]. From there the
//! check runs in a fixed order: the resource must exist, then its owner must
//! match the payload subject. The types enforce that order:
//! [`Verified::locate`] yields a [`Located`], and only a `Located` can
//! [`confirm_owner`](Located::confirm_owner). A missing resource is always
//! reported as [`AuthorizationError::NotFound`], and a mismatched owner as
//! [`AuthorizationError::Forbidden`].

use thiserror::Error;

use crate::auth::Payload;

/// A persisted entity with a single, immutable owner.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("resource not found")]
    NotFound,

    #[error("resource does not belong to the authenticated user")]
    Forbidden,
}

/// Credential verified; nothing located yet.
#[derive(Debug, Clone, Copy)]
pub struct Verified<'p> {
    payload: &'p Payload,
}

impl<'p> Verified<'p> {
    pub fn new(payload: &'p Payload) -> Self {
        Self { payload }
    }

    /// Existence check on the storage lookup result.
    pub fn locate<R: Owned>(self, found: Option<R>) -> Result<Located<'p, R>, AuthorizationError> {
        match found {
            Some(resource) => Ok(Located {
                payload: self.payload,
                resource,
            }),
            None => {
                tracing::debug!(user_id = self.payload.user_id, "requested resource does not exist");
                Err(AuthorizationError::NotFound)
            }
        }
    }
}

/// Resource exists; ownership not yet confirmed.
#[derive(Debug)]
pub struct Located<'p, R> {
    payload: &'p Payload,
    resource: R,
}

impl<'p, R: Owned> Located<'p, R> {
    /// Ownership check. A mismatch is a hard failure, never a silent filter.
    pub fn confirm_owner(self) -> Result<R, AuthorizationError> {
        let owner_id = self.resource.owner_id();
        if owner_id != self.payload.user_id {
            tracing::warn!(
                user_id = self.payload.user_id,
                owner_id,
                "ownership check rejected request"
            );
            return Err(AuthorizationError::Forbidden);
        }
        Ok(self.resource)
    }
}

/// Run both phases: existence, then ownership.
pub fn authorize<R: Owned>(payload: &Payload, found: Option<R>) -> Result<R, AuthorizationError> {
    Verified::new(payload).locate(found)?.confirm_owner()
}
