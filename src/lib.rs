//! Beacon - pollable, cancellable data dependencies
//!
//! Beacon models queries against a coordination service's HTTP API (key-value
//! pairs, service health records) as *dependencies*: self-contained, repeatable
//! fetch units behind a uniform fetch/cancel/configure contract. A caller —
//! typically a single polling task per dependency — invokes
//! [`Dependency::fetch`] in a loop, feeds the returned
//! [`ResponseMetadata::last_index`] back in as the next wait index, and
//! re-renders its output whenever the normalized result changes.
//!
//! # Architecture Overview
//!
//! Beacon follows a parse/fetch/normalize model where:
//! - A compact string identifier (e.g. `key@dc1`, `tag.name@dc~node|passing,warning`)
//!   is parsed into an immutable query descriptor
//! - Long-poll ("blocking query") parameters are merged deterministically
//!   between the dependency's defaults and per-call overrides
//! - Raw API records are filtered and sorted into a stable, diff-friendly
//!   shape so unchanged remote state yields structurally equal results
//! - Cancellation is a one-shot broadcast signal, safe to fire from a
//!   different task before, during, or after a fetch
//!
//! ## Key Features
//!
//! - **Blocking queries**: wait-index/wait-duration long-polling for the
//!   kinds that support it; fast-path kinds ignore blocking parameters
//! - **Deterministic results**: canonical filter/tag ordering and stable
//!   (node, id) sorting make repeated fetches byte-comparable
//! - **Cooperative cancellation**: `stop()` is idempotent and observed by
//!   in-flight fetches without tight polling
//! - **No hidden retries**: every transport failure is wrapped with the
//!   dependency's canonical string and returned to the caller, who owns
//!   retry/backoff policy
//!
//! # Core Modules
//!
//! - [`core`] - Error taxonomy and the crate-wide [`Result`] alias
//! - [`ident`] - Tokenizer for the compact identifier grammar
//! - [`query`] - Long-poll query options, merge policy, response metadata
//! - [`transport`] - Transport collaborator trait, raw records, HTTP client
//! - [`dependency`] - The dependency contract and the concrete query kinds
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_deps::dependency::{Dependency, KvGetQuery};
//! use beacon_deps::query::QueryOptions;
//! use beacon_deps::transport::http::HttpTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = HttpTransport::new("http://127.0.0.1:8500")?;
//! let mut dep = KvGetQuery::new("app/config/timeout@dc1")?;
//!
//! let mut index = 0;
//! loop {
//!     dep.set_options(QueryOptions { wait_index: index, ..Default::default() });
//!     let (value, meta) = dep.fetch(&transport).await?;
//!     index = meta.last_index;
//!     println!("{value:?}");
//! }
//! # }
//! ```
//!
//! [`Dependency::fetch`]: dependency::Dependency::fetch
//! [`ResponseMetadata::last_index`]: query::ResponseMetadata
//! [`Result`]: core::Result

// Core functionality modules
pub mod core;
pub mod dependency;
pub mod ident;
pub mod query;
pub mod transport;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
