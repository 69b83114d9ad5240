//! Credkit core library.
//!
//! This crate intentionally stays stateless: it holds the identifier types,
//! the minor-unit [`Amount`] type, the structured error taxonomy, and the
//! pure rotation policy. Everything that touches storage or billing lives in
//! `credkit-rotations` and consumes these types through trait-based
//! dependency injection.
//!
//! # Example
//!
//! ```
//! use credkit_lib::policy::{Decision, RotationPolicy};
//!
//! let policy = RotationPolicy::default();
//!
//! // Two free rotations in, the next one is still free.
//! assert_eq!(policy.evaluate(2, false), Decision::Free);
//!
//! // A blocked record only admits the recovery flow.
//! assert_eq!(policy.evaluate(12, true), Decision::Blocked);
//! ```

pub mod amount;
pub mod errors;
pub mod policy;

pub use amount::Amount;
pub use errors::{CredkitError, CredkitErrorCode};
pub use policy::{Decision, PolicyConfig, RotationPolicy};

/// Common result alias for credkit operations.
pub type Result<T> = std::result::Result<T, CredkitError>;

/// Identifier for the account that owns a credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the account ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an integration channel.
///
/// A channel is an independent integration surface with its own credential
/// but identical policy logic. The engine treats the channel as data, so new
/// channels need configuration, not code.
///
/// # Example
///
/// ```
/// use credkit_lib::Channel;
///
/// // Create from &str
/// let channel: Channel = "atlas".into();
///
/// // Or explicitly
/// let channel = Channel::atlas();
///
/// assert_eq!(channel.as_str(), "atlas");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Channel(pub String);

impl Channel {
    /// Well-known channel ID for the Atlas integration.
    pub const ATLAS: &'static str = "atlas";

    /// Well-known channel ID for the Ceres integration.
    pub const CERES: &'static str = "ceres";

    /// Create a new channel ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the channel ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create the Atlas channel ID.
    pub fn atlas() -> Self {
        Self::new(Self::ATLAS)
    }

    /// Create the Ceres channel ID.
    pub fn ceres() -> Self {
        Self::new(Self::CERES)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Channel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque secret authenticating a channel integration.
///
/// The code value is treated as a secret: `Debug` output is redacted so the
/// credential never leaks through logs or panic messages. How the secret is
/// generated is not part of the policy contract beyond "a fresh value
/// distinct from the current one"; [`AccessCode::generate`] produces 32
/// random bytes, hex-encoded.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessCode(String);

impl AccessCode {
    /// Wrap an existing code value.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generate a fresh random code.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Generate a fresh code guaranteed to differ from `current`.
    pub fn generate_distinct_from(current: &AccessCode) -> Self {
        loop {
            let candidate = Self::generate();
            if &candidate != current {
                return candidate;
            }
        }
    }

    /// Expose the secret value.
    ///
    /// Callers hand this to the integration surface; it must not end up in
    /// logs.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessCode(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_well_known_ids() {
        assert_eq!(Channel::atlas().as_str(), "atlas");
        assert_eq!(Channel::ceres().as_str(), "ceres");
        assert_eq!(Channel::from("custom").as_str(), "custom");
    }

    #[test]
    fn access_code_debug_is_redacted() {
        let code = AccessCode::new("super-secret-value");
        let debug = format!("{:?}", code);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn generated_codes_are_distinct() {
        let current = AccessCode::generate();
        let next = AccessCode::generate_distinct_from(&current);
        assert_ne!(current, next);
        assert_eq!(next.reveal().len(), 64);
    }
}
