//! Guest session token.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a cookie value is not a guest token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed guest session token")]
pub struct GuestTokenError;

/// Opaque token identifying an anonymous shopper.
///
/// Issued as a UUID v4 and carried in the `guest_session` cookie. Only the
/// textual form ever leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a token received from a cookie.
    ///
    /// # Errors
    ///
    /// Returns [`GuestTokenError`] if the value is not a UUID.
    pub fn parse(value: &str) -> Result<Self, GuestTokenError> {
        let uuid = Uuid::parse_str(value.trim()).map_err(|_| GuestTokenError)?;
        Ok(Self(uuid.to_string()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
