//! Long-poll query options and response metadata.
//!
//! A *blocking query* asks the coordination service to hold the connection
//! open until the watched state changes past a known version marker
//! ([`QueryOptions::wait_index`]) or a timeout elapses
//! ([`QueryOptions::wait_time`]). Each dependency owns a current set of
//! options, replaced by the caller between fetches, and merges kind-specific
//! overrides (such as the configured datacenter) on top of them at fetch
//! time.
//!
//! The merge policy is deterministic and field-independent: a zero/unset
//! field in the override falls back to the base, a non-zero field always
//! wins. Wire parameters are rendered only when non-default so that absent
//! options never perturb server-side defaults.

use std::time::Duration;

/// Options that shape a single fetch against the coordination service.
///
/// The zero value ([`QueryOptions::default`]) means "no preferences": no
/// datacenter override, no proximity hint, fresh reads, no long-poll.
///
/// # Merge Semantics
///
/// [`merge`](Self::merge) never silently drops a non-zero field from the
/// override; zero-valued override fields fall back to the base:
///
/// ```rust
/// use beacon_deps::query::QueryOptions;
///
/// let base = QueryOptions { wait_index: 100, ..Default::default() };
/// let over = QueryOptions { datacenter: Some("dc2".into()), ..Default::default() };
///
/// let effective = base.merge(&over);
/// assert_eq!(effective.wait_index, 100);
/// assert_eq!(effective.datacenter.as_deref(), Some("dc2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Permit the read to be served by a non-authoritative replica.
    pub allow_stale: bool,

    /// Target datacenter; `None` uses the agent's local datacenter.
    pub datacenter: Option<String>,

    /// Sort results by network proximity to this node (health queries only).
    pub near: Option<String>,

    /// Last-seen version marker; non-zero turns the fetch into a blocking
    /// query that waits for a newer version.
    pub wait_index: u64,

    /// Maximum time the server may hold a blocking query open.
    pub wait_time: Option<Duration>,
}

impl QueryOptions {
    /// Merges `other` over `self`, returning the effective options.
    ///
    /// Pure: neither input is mutated. Total: every field is merged
    /// independently, with no cross-field coupling.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            allow_stale: if other.allow_stale { true } else { self.allow_stale },
            datacenter: other.datacenter.clone().or_else(|| self.datacenter.clone()),
            near: other.near.clone().or_else(|| self.near.clone()),
            wait_index: if other.wait_index != 0 { other.wait_index } else { self.wait_index },
            wait_time: other.wait_time.or(self.wait_time),
        }
    }

    /// Renders the options into the query-string parameters expected by the
    /// remote API.
    ///
    /// Parameters are present only when non-default: `dc`, `near`, `index`,
    /// `wait` (milliseconds), and the bare `stale` flag. Omitting defaults
    /// keeps server-side behavior untouched for unset fields.
    #[must_use]
    pub fn wire_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(dc) = &self.datacenter {
            params.push(("dc", dc.clone()));
        }
        if let Some(near) = &self.near {
            params.push(("near", near.clone()));
        }
        if self.wait_index != 0 {
            params.push(("index", self.wait_index.to_string()));
        }
        if let Some(wait) = self.wait_time {
            params.push(("wait", format!("{}ms", wait.as_millis())));
        }
        if self.allow_stale {
            // The remote API treats `stale` as a value-less flag.
            params.push(("stale", String::new()));
        }
        params
    }
}

/// Metadata returned alongside every fetch result.
///
/// `last_index` is an opaque, monotonically-nondecreasing cursor: feed it
/// back into the next fetch's [`QueryOptions::wait_index`] to block until the
/// watched state changes. `last_contact` is how long ago the serving replica
/// heard from the authoritative leader, meaningful when stale reads are
/// permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The remote service's version marker for the returned data.
    pub last_index: u64,

    /// Staleness indicator for reads served by a non-authoritative replica.
    pub last_contact: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_zero_override_is_identity() {
        let base = QueryOptions {
            allow_stale: true,
            datacenter: Some("dc1".to_string()),
            near: Some("node7".to_string()),
            wait_index: 42,
            wait_time: Some(Duration::from_secs(60)),
        };
        assert_eq!(base.merge(&QueryOptions::default()), base);
    }

    #[test]
    fn test_merge_override_wins_per_field() {
        let base = QueryOptions {
            datacenter: Some("dc1".to_string()),
            wait_index: 42,
            ..Default::default()
        };
        let over = QueryOptions {
            datacenter: Some("dc2".to_string()),
            wait_time: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let effective = base.merge(&over);
        assert_eq!(effective.datacenter.as_deref(), Some("dc2"));
        assert_eq!(effective.wait_index, 42);
        assert_eq!(effective.wait_time, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let base = QueryOptions { wait_index: 1, ..Default::default() };
        let over = QueryOptions { wait_index: 2, ..Default::default() };
        let _ = base.merge(&over);
        assert_eq!(base.wait_index, 1);
        assert_eq!(over.wait_index, 2);
    }

    #[test]
    fn test_wire_params_empty_for_defaults() {
        assert!(QueryOptions::default().wire_params().is_empty());
    }

    #[test]
    fn test_wire_params_rendering() {
        let opts = QueryOptions {
            allow_stale: true,
            datacenter: Some("dc1".to_string()),
            near: Some("node7".to_string()),
            wait_index: 100,
            wait_time: Some(Duration::from_secs(1)),
        };
        let params = opts.wire_params();
        assert!(params.contains(&("dc", "dc1".to_string())));
        assert!(params.contains(&("near", "node7".to_string())));
        assert!(params.contains(&("index", "100".to_string())));
        assert!(params.contains(&("wait", "1000ms".to_string())));
        assert!(params.contains(&("stale", String::new())));
    }
}
