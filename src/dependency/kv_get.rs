//! `kv.get` - blocking read of a single key.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::{BeaconError, Result};
use crate::dependency::{DepValue, Dependency};
use crate::ident;
use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::Transport;

const KIND: &str = "kv.get";

/// Queries the KV store for the value at a single key.
///
/// Blocking-capable: a caller that feeds `last_index` back into
/// [`QueryOptions::wait_index`] long-polls until the key changes.
///
/// An empty stored value and a missing key are distinct results:
/// `DepValue::KvValue(Some(""))` versus `DepValue::KvValue(None)`, both
/// successful fetches.
///
/// # Examples
///
/// ```rust
/// use beacon_deps::dependency::KvGetQuery;
///
/// let dep = KvGetQuery::new("app/config/timeout@dc1")?;
/// assert_eq!(dep.to_string(), "kv.get(app/config/timeout@dc1)");
/// # Ok::<(), beacon_deps::core::BeaconError>(())
/// ```
pub struct KvGetQuery {
    key: String,
    dc: Option<String>,
    opts: QueryOptions,
    stop: CancellationToken,
}

impl KvGetQuery {
    /// Parses a `[key][@datacenter]` identifier into a get query.
    ///
    /// A single leading `/` is trimmed from the key; the empty identifier is
    /// legal and denotes "no key".
    ///
    /// # Errors
    ///
    /// [`BeaconError::MalformedIdentifier`] when the identifier does not
    /// match the grammar.
    pub fn new(s: &str) -> Result<Self> {
        let ident = ident::parse_kv(KIND, s)?;
        Ok(Self {
            key: ident.key,
            dc: ident.datacenter,
            opts: QueryOptions::default(),
            stop: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Dependency for KvGetQuery {
    async fn fetch(&self, transport: &dyn Transport) -> Result<(DepValue, ResponseMetadata)> {
        if self.stop.is_cancelled() {
            return Err(BeaconError::Stopped);
        }

        let opts = self.opts.merge(&QueryOptions {
            datacenter: self.dc.clone(),
            ..Default::default()
        });

        trace!("{self}: GET kv/{}", self.key);
        let (pair, meta) = tokio::select! {
            () = self.stop.cancelled() => return Err(BeaconError::Stopped),
            res = transport.kv_get(&self.key, &opts) => {
                res.map_err(|source| BeaconError::Transport {
                    dependency: self.to_string(),
                    source,
                })?
            }
        };

        debug!("{self}: returned {}", if pair.is_some() { "1 pair" } else { "no pair" });

        // A pair with a missing value still exists; it holds the empty string.
        let value = pair.map(|p| p.value.unwrap_or_default());
        Ok((DepValue::KvValue(value), meta))
    }

    fn set_options(&mut self, opts: QueryOptions) {
        self.opts = opts;
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

impl fmt::Display for KvGetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dc {
            Some(dc) => write!(f, "{KIND}({}@{dc})", self.key),
            None => write!(f, "{KIND}({})", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    #[test]
    fn test_new_rejects_bare_datacenter() {
        assert!(KvGetQuery::new("@dc1").is_err());
    }

    #[test]
    fn test_blocking() {
        let dep = KvGetQuery::new("").unwrap();
        assert!(dep.is_blocking());
    }

    #[test]
    fn test_set_options_keeps_wait_fields() {
        let mut dep = KvGetQuery::new("").unwrap();
        dep.set_options(QueryOptions {
            wait_index: 100,
            wait_time: Some(std::time::Duration::from_millis(100)),
            ..Default::default()
        });
        assert_eq!(dep.opts.wait_index, 100);
        assert!(dep.opts.wait_time.is_some());
    }

    #[test]
    fn test_string() {
        let dep = KvGetQuery::new("key").unwrap();
        assert_eq!(dep.to_string(), "kv.get(key)");

        let dep = KvGetQuery::new("key@dc1").unwrap();
        assert_eq!(dep.to_string(), "kv.get(key@dc1)");

        let dep = KvGetQuery::new("").unwrap();
        assert_eq!(dep.to_string(), "kv.get()");
    }

    #[tokio::test]
    async fn test_fetch_distinguishes_empty_from_missing() {
        let transport = MockTransport::new();
        transport.set_kv("test-kv-get/key", "value");
        transport.set_kv("test-kv-get/key_empty", "");

        let cases: &[(&str, Option<&str>)] = &[
            ("test-kv-get/key", Some("value")),
            ("test-kv-get/key_empty", Some("")),
            ("test-kv-get/not/a/real/key", None),
        ];

        for (ident, exp) in cases {
            let dep = KvGetQuery::new(ident).unwrap();
            let (value, _) = dep.fetch(&transport).await.unwrap();
            assert_eq!(value, DepValue::KvValue(exp.map(str::to_string)), "{ident}");
        }
    }

    #[tokio::test]
    async fn test_fetch_after_stop_makes_no_calls() {
        let transport = MockTransport::new();
        transport.set_kv("key", "value");

        let dep = KvGetQuery::new("key").unwrap();
        dep.stop();

        let err = dep.fetch(&transport).await.unwrap_err();
        assert!(err.is_stopped());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_carries_canonical_string() {
        let transport = MockTransport::new();
        transport.fail_next("connection refused");

        let dep = KvGetQuery::new("key@dc1").unwrap();
        let err = dep.fetch(&transport).await.unwrap_err();
        assert!(err.to_string().starts_with("kv.get(key@dc1)"));
    }
}
