//! `kv.exists` - non-blocking existence check for a single key.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::{BeaconError, Result};
use crate::dependency::{DepValue, Dependency};
use crate::ident;
use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::Transport;

const KIND: &str = "kv.exists";

/// Checks whether a key exists, without long-polling.
///
/// This is a fast-path probe: wait-index/wait-duration are dropped in
/// [`set_options`](Dependency::set_options) so a caller-supplied blocking
/// configuration can never stall the check in a server-side long-poll.
pub struct KvExistsQuery {
    key: String,
    dc: Option<String>,
    opts: QueryOptions,
    stop: CancellationToken,
}

impl KvExistsQuery {
    /// Parses a `[key][@datacenter]` identifier into an existence query.
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
impl Dependency for KvExistsQuery {
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

        debug!("{self}: exists={}", pair.is_some());
        Ok((DepValue::KvExists(pair.is_some()), meta))
    }

    /// Stores the options with the blocking fields cleared.
    fn set_options(&mut self, mut opts: QueryOptions) {
        opts.wait_index = 0;
        opts.wait_time = None;
        self.opts = opts;
    }

    fn stop(&self) {
        self.stop.cancel();
    }

    fn is_blocking(&self) -> bool {
        false
    }
}

impl fmt::Display for KvExistsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dc {
            Some(dc) => write!(f, "{KIND}({}@{dc})", self.key),
            None => write!(f, "{KIND}({})", self.key),
        }
    }
}
