//! Error handling for Beacon
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for precise handling in polling loops
//! 2. **Self-describing messages** that carry the offending input or the
//!    dependency's canonical string form
//!
//! # Error Categories
//!
//! - **Parsing**: [`BeaconError::MalformedIdentifier`],
//!   [`BeaconError::InvalidFilter`] - identifier failed grammar validation;
//!   raised before a dependency instance exists
//! - **Cancellation**: [`BeaconError::Stopped`] - a fetch attempted after (or
//!   observing) a stop signal; treat as loop termination, not as a failure
//! - **Transport**: [`BeaconError::Transport`] - wraps any
//!   [`TransportError`] from the collaborator, tagged with the dependency
//!   that issued the request
//!
//! # Examples
//!
//! ```rust
//! use beacon_deps::core::BeaconError;
//! use beacon_deps::dependency::KvGetQuery;
//!
//! match KvGetQuery::new("@dc-only") {
//!     Err(BeaconError::MalformedIdentifier { kind, input }) => {
//!         eprintln!("{kind}: cannot parse {input:?}");
//!     }
//!     _ => unreachable!("a bare datacenter segment is not a valid key"),
//! }
//! ```

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias used throughout Beacon.
pub type Result<T> = std::result::Result<T, BeaconError>;

/// The main error type for Beacon operations
///
/// Each variant represents a specific failure mode. Parsing errors are
/// terminal and never retried; [`Stopped`](Self::Stopped) is advisory;
/// transport errors are propagated unchanged (wrapped with context) so the
/// caller can apply its own retry/backoff policy.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// The identifier string did not match the query kind's grammar.
    ///
    /// Carries the kind tag (e.g. `kv.get`) and the full offending input.
    #[error("{kind}: invalid format: {input:?}")]
    MalformedIdentifier {
        /// Kind tag of the query that attempted the parse
        kind: &'static str,
        /// The offending identifier string
        input: String,
    },

    /// A health filter token was not in the fixed status vocabulary.
    #[error("{kind}: invalid filter: {token:?} in {input:?}")]
    InvalidFilter {
        /// Kind tag of the query that attempted the parse
        kind: &'static str,
        /// The token that failed validation
        token: String,
        /// The full identifier string containing the token
        input: String,
    },

    /// The dependency was stopped.
    ///
    /// Returned by every fetch after the cancellation signal has fired,
    /// without touching the network. Polling loops should treat this as a
    /// normal termination signal.
    #[error("dependency stopped")]
    Stopped,

    /// The transport collaborator failed.
    ///
    /// `dependency` is the canonical string form of the query that issued
    /// the request, e.g. `kv.get(key@dc1)`.
    #[error("{dependency}: {source}")]
    Transport {
        /// Canonical string form of the failing dependency
        dependency: String,
        /// The underlying transport failure
        #[source]
        source: TransportError,
    },
}

impl BeaconError {
    /// Returns `true` if this error is the cancellation signal.
    ///
    /// Convenience for polling loops that exit cleanly on stop but log or
    /// back off on everything else.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_identifier_display() {
        let err = BeaconError::MalformedIdentifier {
            kind: "kv.get",
            input: "@dc1".to_string(),
        };
        assert_eq!(err.to_string(), r#"kv.get: invalid format: "@dc1""#);
    }

    #[test]
    fn test_invalid_filter_display_names_token() {
        let err = BeaconError::InvalidFilter {
            kind: "health.service",
            token: "bogus".to_string(),
            input: "svc|passing,bogus".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"bogus\""));
        assert!(msg.contains("health.service"));
    }

    #[test]
    fn test_is_stopped() {
        assert!(BeaconError::Stopped.is_stopped());
        let err = BeaconError::MalformedIdentifier {
            kind: "kv.list",
            input: String::new(),
        };
        assert!(!err.is_stopped());
    }
}
