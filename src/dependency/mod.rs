//! The dependency contract and the concrete query kinds.
//!
//! A *dependency* is a self-contained, repeatable query against the
//! coordination service: it owns an immutable parsed descriptor, a mutable
//! set of long-poll options, and exactly one cancellation signal. The kind
//! set is closed — key-value get/exists/list and service health (plus its
//! Connect variant) — and every kind implements the one capability trait
//! [`Dependency`] rather than an open inheritance scheme.
//!
//! # Lifecycle
//!
//! A dependency is Active from construction until [`Dependency::stop`] fires,
//! which is terminal. Fetching is legal in both states: an Active fetch does
//! work, a Stopped fetch fails fast with [`BeaconError::Stopped`] and never
//! touches the network. Exactly one task should drive `fetch`/`set_options`;
//! `stop` is the one operation designed to be called from elsewhere (a
//! shutdown coordinator), which is why cancellation is an independent
//! one-shot token rather than ordinary mutable state.
//!
//! # Determinism
//!
//! Result normalization canonicalizes everything order-sensitive (filter
//! sets, tag lists, health entry order) so that two fetches over unchanged
//! remote state are structurally equal — the property callers rely on to
//! skip downstream recomputation.
//!
//! [`BeaconError::Stopped`]: crate::core::BeaconError::Stopped

pub mod health_service;
pub mod kv_exists;
pub mod kv_get;
pub mod kv_list;

pub use health_service::{
    HealthCheck, HealthService, HealthServiceQuery, HealthStatus, ServiceWeights,
};
pub use kv_exists::KvExistsQuery;
pub use kv_get::KvGetQuery;
pub use kv_list::{KeyPair, KvListQuery};

use std::fmt;

use async_trait::async_trait;

use crate::core::Result;
use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::Transport;

/// Normalized result of a fetch, tagged by query kind.
///
/// The kind set is fixed, so consumers match exhaustively instead of
/// downcasting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepValue {
    /// `kv.get`: the stored value, or `None` when the key does not exist.
    /// `Some("")` is a real (empty) value, distinct from `None`.
    KvValue(Option<String>),

    /// `kv.exists`: whether the key exists.
    KvExists(bool),

    /// `kv.list`: pairs under the prefix, in server (lexicographic) order.
    KvPairs(Vec<KeyPair>),

    /// `health.service` / `health.connect`: filtered, deterministically
    /// ordered health entries.
    HealthServices(Vec<HealthService>),
}

/// The common capability set every concrete query kind implements.
///
/// `Display` renders the canonical string form `"<kind>(<identifier>)"` —
/// deterministic for a given descriptor, and therefore usable as a stable
/// identity for logging and deduplication keys.
#[async_trait]
pub trait Dependency: fmt::Display + Send + Sync {
    /// Performs one fetch against the transport collaborator.
    ///
    /// Checks the cancellation signal non-blockingly first: once stopped,
    /// every fetch fails with [`BeaconError::Stopped`] without any network
    /// access. Otherwise the instance's current options are merged with
    /// kind-forced fields, the transport is invoked (raced against
    /// cancellation so an in-flight long-poll can be abandoned), and raw
    /// records are normalized into a [`DepValue`].
    ///
    /// # Errors
    ///
    /// - [`BeaconError::Stopped`] after (or upon observing) a stop signal
    /// - [`BeaconError::Transport`] wrapping any collaborator failure, with
    ///   this dependency's canonical string attached; never retried here
    ///
    /// [`BeaconError::Stopped`]: crate::core::BeaconError::Stopped
    /// [`BeaconError::Transport`]: crate::core::BeaconError::Transport
    async fn fetch(&self, transport: &dyn Transport) -> Result<(DepValue, ResponseMetadata)>;

    /// Replaces the instance's current query options.
    ///
    /// Only fields meaningful to the concrete kind take effect; a
    /// non-blocking kind silently drops wait-index/wait-duration. Must only
    /// be called by the task that owns the instance, between fetches.
    fn set_options(&mut self, opts: QueryOptions);

    /// Signals cancellation.
    ///
    /// Idempotent and non-blocking; safe to call from another task while a
    /// fetch is in flight. A blocked fetch observes the signal and returns
    /// [`BeaconError::Stopped`]; at the latest, the next fetch fails fast.
    ///
    /// [`BeaconError::Stopped`]: crate::core::BeaconError::Stopped
    fn stop(&self);

    /// Whether results from this instance may be shared across consumers
    /// issuing structurally identical queries.
    fn can_share(&self) -> bool {
        true
    }

    /// Whether this kind honors wait-index/wait-duration long-polling.
    ///
    /// Non-blocking kinds are fast-path checks that must never stall in a
    /// server-side long-poll, even if the caller sets blocking options.
    fn is_blocking(&self) -> bool {
        true
    }
}
