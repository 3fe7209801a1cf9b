//! Shared test utilities.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite. The centerpiece is [`MockTransport`], a scripted
//! in-memory [`Transport`] that lets dependency tests run without a real
//! coordination service: seed it with key-value pairs or health entries,
//! optionally inject a failure or an artificial delay, and count how many
//! calls the dependency actually made.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::{
    RawCheck, RawKeyPair, RawNode, RawService, RawServiceEntry, Transport, TransportError,
    TransportResult,
};

/// Scripted in-memory transport.
///
/// All mutation methods take `&self`, so a single instance can be shared
/// (via `Arc`) between a test body and a polling task. Every state change
/// bumps an internal version marker that is reported back as
/// [`ResponseMetadata::last_index`], mirroring how the real service
/// advances its modify index.
#[derive(Default)]
pub struct MockTransport {
    // BTreeMap keeps listings in lexicographic order, like the real server.
    kv: Mutex<BTreeMap<String, RawKeyPair>>,
    services: Mutex<HashMap<String, Vec<RawServiceEntry>>>,
    connect: Mutex<HashMap<String, Vec<RawServiceEntry>>>,
    last_index: AtomicU64,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<String>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a key-value pair, bumping the version marker.
    pub fn set_kv(&self, key: &str, value: &str) {
        let index = self.last_index.fetch_add(1, Ordering::SeqCst) + 1;
        let pair = RawKeyPair {
            key: key.to_string(),
            value: Some(value.to_string()),
            create_index: index,
            modify_index: index,
            ..Default::default()
        };
        self.kv.lock().unwrap().insert(key.to_string(), pair);
    }

    /// Removes a key, bumping the version marker.
    pub fn delete_kv(&self, key: &str) {
        self.last_index.fetch_add(1, Ordering::SeqCst);
        self.kv.lock().unwrap().remove(key);
    }

    /// Replaces the health entries returned for `name`.
    pub fn set_service(&self, name: &str, entries: Vec<RawServiceEntry>) {
        self.last_index.fetch_add(1, Ordering::SeqCst);
        self.services.lock().unwrap().insert(name.to_string(), entries);
    }

    /// Replaces the Connect-capable health entries returned for `name`.
    pub fn set_connect(&self, name: &str, entries: Vec<RawServiceEntry>) {
        self.last_index.fetch_add(1, Ordering::SeqCst);
        self.connect.lock().unwrap().insert(name.to_string(), entries);
    }

    /// Forces the version marker to a specific value.
    pub fn set_last_index(&self, index: u64) {
        self.last_index.store(index, Ordering::SeqCst);
    }

    /// Number of transport operations served so far, failures included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next operation fail with [`TransportError::Other`].
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Delays every operation, simulating a server-side long poll.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn begin(&self) -> TransportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(TransportError::Other(message));
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn meta(&self) -> ResponseMetadata {
        ResponseMetadata {
            last_index: self.last_index.load(Ordering::SeqCst),
            last_contact: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn kv_get(
        &self,
        key: &str,
        _opts: &QueryOptions,
    ) -> TransportResult<(Option<RawKeyPair>, ResponseMetadata)> {
        self.begin().await?;
        let pair = self.kv.lock().unwrap().get(key).cloned();
        Ok((pair, self.meta()))
    }

    async fn kv_list(
        &self,
        prefix: &str,
        _opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawKeyPair>, ResponseMetadata)> {
        self.begin().await?;
        let pairs = self
            .kv
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, pair)| pair.clone())
            .collect();
        Ok((pairs, self.meta()))
    }

    async fn health_service(
        &self,
        name: &str,
        _tag: Option<&str>,
        _passing_only: bool,
        _opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)> {
        self.begin().await?;
        let entries = self
            .services
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default();
        Ok((entries, self.meta()))
    }

    async fn health_connect(
        &self,
        name: &str,
        _tag: Option<&str>,
        _passing_only: bool,
        _opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)> {
        self.begin().await?;
        let entries = self
            .connect
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default();
        Ok((entries, self.meta()))
    }
}

/// Builds a minimal healthy service entry for tests.
///
/// The entry carries a single passing serf check; adjust fields on the
/// returned value for warning, critical, or maintenance scenarios.
#[must_use]
pub fn service_entry(node: &str, address: &str, id: &str, service: &str) -> RawServiceEntry {
    RawServiceEntry {
        node: RawNode {
            node: node.to_string(),
            address: address.to_string(),
            datacenter: "dc1".to_string(),
            ..Default::default()
        },
        service: RawService {
            id: id.to_string(),
            service: service.to_string(),
            address: address.to_string(),
            port: 8000,
            ..Default::default()
        },
        checks: vec![RawCheck {
            node: node.to_string(),
            check_id: "serfHealth".to_string(),
            name: "Serf Health Status".to_string(),
            status: "passing".to_string(),
            ..Default::default()
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kv_list_returns_sorted_prefix_matches() {
        let transport = MockTransport::new();
        transport.set_kv("b", "2");
        transport.set_kv("a/x", "1");
        transport.set_kv("a/y", "3");

        let (pairs, _) = transport
            .kv_list("a", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key, "a/x");
        assert_eq!(pairs[1].key, "a/y");
    }

    #[tokio::test]
    async fn test_fail_next_consumed_once() {
        let transport = MockTransport::new();
        transport.fail_next("boom");

        assert!(transport.kv_get("k", &QueryOptions::default()).await.is_err());
        assert!(transport.kv_get("k", &QueryOptions::default()).await.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_mutations_advance_last_index() {
        let transport = MockTransport::new();
        transport.set_kv("k", "1");
        let (_, first) = transport.kv_get("k", &QueryOptions::default()).await.unwrap();
        transport.set_kv("k", "2");
        let (_, second) = transport.kv_get("k", &QueryOptions::default()).await.unwrap();
        assert!(second.last_index > first.last_index);
    }
}
