//! `kv.list` - blocking listing of all pairs under a prefix.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::{BeaconError, Result};
use crate::dependency::{DepValue, Dependency};
use crate::ident;
use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::Transport;

const KIND: &str = "kv.list";

/// A normalized key-value pair.
///
/// `path` is the full key as stored; `key` is the path relative to the
/// queried prefix (with leading separators stripped), which is what
/// templates usually address. The remaining fields are copied verbatim from
/// the raw API record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Full key path as stored in the service.
    pub path: String,
    /// Key relative to the queried prefix.
    pub key: String,
    /// Stored value; the empty string is a legal value.
    pub value: String,

    // Lesser-used, but still valuable metadata from the raw record.
    pub create_index: u64,
    pub modify_index: u64,
    pub lock_index: u64,
    pub flags: u64,
    pub session: String,
}

/// Queries the KV store for all pairs under a prefix.
///
/// Blocking-capable. Results keep the server's order, which is already
/// lexicographic by full path — re-sorting client-side would only risk
/// disagreeing with it.
pub struct KvListQuery {
    prefix: String,
    dc: Option<String>,
    opts: QueryOptions,
    stop: CancellationToken,
}

impl KvListQuery {
    /// Parses a `[prefix][@datacenter]` identifier into a list query.
    ///
    /// The empty identifier is legal and lists everything. A trailing `/`
    /// is preserved: it marks a directory-like prefix, which matters for
    /// relative-key derivation.
    ///
    /// # Errors
    ///
    /// [`BeaconError::MalformedIdentifier`] when the identifier does not
    /// match the grammar.
    pub fn new(s: &str) -> Result<Self> {
        let ident = ident::parse_kv(KIND, s)?;
        Ok(Self {
            prefix: ident.key,
            dc: ident.datacenter,
            opts: QueryOptions::default(),
            stop: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Dependency for KvListQuery {
    async fn fetch(&self, transport: &dyn Transport) -> Result<(DepValue, ResponseMetadata)> {
        if self.stop.is_cancelled() {
            return Err(BeaconError::Stopped);
        }

        let opts = self.opts.merge(&QueryOptions {
            datacenter: self.dc.clone(),
            ..Default::default()
        });

        trace!("{self}: GET kv/{}?recurse", self.prefix);
        let (list, meta) = tokio::select! {
            () = self.stop.cancelled() => return Err(BeaconError::Stopped),
            res = transport.kv_list(&self.prefix, &opts) => {
                res.map_err(|source| BeaconError::Transport {
                    dependency: self.to_string(),
                    source,
                })?
            }
        };

        debug!("{self}: returned {} pairs", list.len());

        let pairs = list
            .into_iter()
            .map(|pair| {
                let key = pair
                    .key
                    .strip_prefix(&self.prefix)
                    .unwrap_or(&pair.key)
                    .trim_start_matches('/')
                    .to_string();
                KeyPair {
                    path: pair.key,
                    key,
                    value: pair.value.unwrap_or_default(),
                    create_index: pair.create_index,
                    modify_index: pair.modify_index,
                    lock_index: pair.lock_index,
                    flags: pair.flags,
                    session: pair.session,
                }
            })
            .collect();

        Ok((DepValue::KvPairs(pairs), meta))
    }

    fn set_options(&mut self, opts: QueryOptions) {
        self.opts = opts;
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

impl fmt::Display for KvListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dc {
            Some(dc) => write!(f, "{KIND}({}@{dc})", self.prefix),
            None => write!(f, "{KIND}({})", self.prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    #[test]
    fn test_string() {
        let dep = KvListQuery::new("prefix").unwrap();
        assert_eq!(dep.to_string(), "kv.list(prefix)");

        let dep = KvListQuery::new("prefix@dc1").unwrap();
        assert_eq!(dep.to_string(), "kv.list(prefix@dc1)");

        let dep = KvListQuery::new("").unwrap();
        assert_eq!(dep.to_string(), "kv.list()");
    }

    #[tokio::test]
    async fn test_fetch_derives_relative_keys() {
        let transport = MockTransport::new();
        transport.set_kv("app/config/timeout", "30");
        transport.set_kv("app/config/retries", "3");

        let dep = KvListQuery::new("app/config").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();

        let DepValue::KvPairs(pairs) = value else {
            panic!("expected pairs");
        };
        // Server order is lexicographic by full path.
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].path, "app/config/retries");
        assert_eq!(pairs[0].key, "retries");
        assert_eq!(pairs[0].value, "3");
        assert_eq!(pairs[1].path, "app/config/timeout");
        assert_eq!(pairs[1].key, "timeout");
    }

    #[tokio::test]
    async fn test_fetch_trailing_slash_prefix() {
        let transport = MockTransport::new();
        transport.set_kv("app/config/timeout", "30");

        let dep = KvListQuery::new("app/config/").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();

        let DepValue::KvPairs(pairs) = value else {
            panic!("expected pairs");
        };
        assert_eq!(pairs[0].key, "timeout");
    }

    #[tokio::test]
    async fn test_fetch_empty_prefix_lists_everything() {
        let transport = MockTransport::new();
        transport.set_kv("a", "1");
        transport.set_kv("b/c", "2");

        let dep = KvListQuery::new("").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();

        let DepValue::KvPairs(pairs) = value else {
            panic!("expected pairs");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key, "a");
        assert_eq!(pairs[1].key, "b/c");
    }

    #[tokio::test]
    async fn test_unchanged_state_yields_equal_results() {
        let transport = MockTransport::new();
        transport.set_kv("app/x", "1");
        transport.set_kv("app/y", "2");

        let dep = KvListQuery::new("app").unwrap();
        let (first, _) = dep.fetch(&transport).await.unwrap();
        let (second, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(first, second);
    }
}
