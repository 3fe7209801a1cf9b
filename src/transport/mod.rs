//! Transport collaborator - unified interface to the coordination service.
//!
//! Dependencies never speak HTTP themselves; they hand wire-ready query
//! options to a [`Transport`] implementation and normalize whatever raw
//! records come back. This keeps the dependency layer free of connection
//! management, authentication, and retry/backoff policy, all of which belong
//! to the collaborator (or the caller).
//!
//! # Implementations
//!
//! - [`http::HttpTransport`] - reqwest-backed client for the service's HTTP API
//! - `MockTransport` (behind the `test-utils` feature) - scripted in-memory
//!   transport for tests
//!
//! All implementations must be `Send + Sync`; a single transport is shared by
//! many dependency instances.

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::query::{QueryOptions, ResponseMetadata};

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures raised by a transport implementation.
///
/// These are wrapped into [`BeaconError::Transport`] by the dependency that
/// issued the request; the transport layer itself performs no retries.
///
/// [`BeaconError::Transport`]: crate::core::BeaconError::Transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (connect, timeout, decode).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The base URL handed to the transport could not be parsed.
    #[error("invalid base url: {url:?}")]
    InvalidBaseUrl {
        /// The offending URL string
        url: String,
    },

    /// The server answered with a status the operation cannot interpret.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Request URL for context
        url: String,
    },

    /// A response metadata header was present but unparseable.
    #[error("invalid {header} header: {value:?}")]
    InvalidMetadata {
        /// Header name
        header: &'static str,
        /// The value that failed to parse
        value: String,
    },

    /// Any other failure, used by scripted test transports.
    #[error("{0}")]
    Other(String),
}

/// Raw key-value record as returned by the remote API.
///
/// Field names follow the service's JSON casing. Values are copied into
/// normalized [`KeyPair`] records by the list/get dependencies.
///
/// [`KeyPair`]: crate::dependency::KeyPair
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawKeyPair {
    /// Full key path.
    pub key: String,
    /// Stored value; `None` and `Some("")` are distinct states.
    pub value: Option<String>,
    pub create_index: u64,
    pub modify_index: u64,
    pub lock_index: u64,
    pub flags: u64,
    /// Session holding the lock on this key, if any.
    pub session: String,
}

/// Raw service health entry: the node, the service instance on it, and the
/// health checks covering both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawServiceEntry {
    pub node: RawNode,
    pub service: RawService,
    pub checks: Vec<RawCheck>,
}

/// Raw node record inside a service health entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawNode {
    pub node: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub address: String,
    pub datacenter: String,
    pub tagged_addresses: HashMap<String, String>,
    pub meta: HashMap<String, String>,
}

/// Raw service instance record inside a service health entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    /// Service-specific address; empty means "use the node address".
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub meta: HashMap<String, String>,
    pub weights: RawServiceWeights,
    pub namespace: String,
}

/// DNS weights attached to a service instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawServiceWeights {
    pub passing: u32,
    pub warning: u32,
}

/// Raw health check record inside a service health entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawCheck {
    pub node: String,
    #[serde(rename = "CheckID")]
    pub check_id: String,
    pub name: String,
    /// Raw status text (`passing`, `warning`, `critical`).
    pub status: String,
    pub notes: String,
    pub output: String,
    #[serde(rename = "ServiceID")]
    pub service_id: String,
    pub service_name: String,
    pub service_tags: Vec<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    pub namespace: String,
}

/// Interface to the coordination service, one operation per query shape.
///
/// Every operation takes the effective [`QueryOptions`] (already merged by
/// the calling dependency) and returns the raw records together with the
/// response's [`ResponseMetadata`]. Implementations decide how options map
/// onto the wire — [`QueryOptions::wire_params`] gives the canonical HTTP
/// rendering.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads a single key. `Ok(None)` means the key does not exist, which is
    /// distinct from a key holding an empty value.
    async fn kv_get(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> TransportResult<(Option<RawKeyPair>, ResponseMetadata)>;

    /// Lists all pairs under a prefix, in the server's lexicographic order.
    async fn kv_list(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawKeyPair>, ResponseMetadata)>;

    /// Lists health entries for a service, optionally restricted to a tag.
    ///
    /// `passing_only` asks the server to pre-filter to passing instances —
    /// the fast path for the default filter set. Any other filter set is
    /// applied client-side by the dependency.
    async fn health_service(
        &self,
        name: &str,
        tag: Option<&str>,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)>;

    /// Like [`health_service`](Self::health_service) but for
    /// Connect-capable instances.
    async fn health_connect(
        &self,
        name: &str,
        tag: Option<&str>,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)>;
}
