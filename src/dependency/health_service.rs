//! `health.service` / `health.connect` - blocking service health queries.
//!
//! Health entries go through the heaviest normalization of any kind: an
//! aggregated status is computed from each entry's checks, the configured
//! status filter is applied client-side, the service address falls back to
//! the node address, tag lists are copied and sorted, and the final list is
//! stably sorted by (node, service id) unless the caller asked for
//! proximity ordering with a near-node hint.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::{BeaconError, Result};
use crate::dependency::{DepValue, Dependency};
use crate::ident;
use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::{RawCheck, Transport};

/// Check id the service uses for node-level maintenance mode.
pub const NODE_MAINT: &str = "_node_maintenance";

/// Check id prefix for service-level maintenance mode.
pub const SERVICE_MAINT_PREFIX: &str = "_service_maintenance:";

/// The fixed health status vocabulary.
///
/// Used both as a filter token (`any` matches every status) and as the
/// aggregated status of an entry's checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Any,
    Passing,
    Warning,
    Critical,
    Maintenance,
}

impl HealthStatus {
    /// The wire/identifier spelling of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Passing => "passing",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Maintenance => "maintenance",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "passing" => Ok(Self::Passing),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DNS weights copied from the raw service record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWeights {
    pub passing: u32,
    pub warning: u32,
}

/// A normalized health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub node: String,
    pub check_id: String,
    pub name: String,
    /// Raw status text of this individual check.
    pub status: String,
    pub notes: String,
    pub output: String,
    pub service_id: String,
    pub service_name: String,
    pub service_tags: Vec<String>,
    pub kind: String,
    pub namespace: String,
}

/// A normalized service health entry.
///
/// `address` is the effective address: the service's own, falling back to
/// the node's when the service record leaves it empty. `tags` are sorted
/// lexicographically — canonical tag order is part of the record's identity
/// for equality and diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthService {
    pub node: String,
    pub node_id: String,
    pub node_address: String,
    pub node_datacenter: String,
    pub node_tagged_addresses: HashMap<String, String>,
    pub node_meta: HashMap<String, String>,
    pub service_meta: HashMap<String, String>,
    /// Effective service address (service address, or node address).
    pub address: String,
    pub id: String,
    pub name: String,
    /// Lexicographically sorted copy of the service's tags.
    pub tags: Vec<String>,
    pub checks: Vec<HealthCheck>,
    /// Status aggregated from `checks`.
    pub status: HealthStatus,
    pub port: u16,
    pub weights: ServiceWeights,
    pub namespace: String,
}

/// Queries the health endpoint for instances of a single service.
///
/// Covers both the plain service endpoint and the Connect variant, selected
/// at construction. Blocking-capable.
///
/// # Examples
///
/// ```rust
/// use beacon_deps::dependency::HealthServiceQuery;
///
/// let dep = HealthServiceQuery::new("release.webapp@dc1|passing,warning")?;
/// assert_eq!(dep.to_string(), "health.service(release.webapp@dc1|passing,warning)");
/// # Ok::<(), beacon_deps::core::BeaconError>(())
/// ```
#[derive(Debug)]
pub struct HealthServiceQuery {
    dc: Option<String>,
    filters: Vec<HealthStatus>,
    name: String,
    near: Option<String>,
    tag: Option<String>,
    connect: bool,
    opts: QueryOptions,
    stop: CancellationToken,
}

impl HealthServiceQuery {
    /// Parses a `[tag.]name[@dc][~near][|filters]` identifier into a
    /// service health query.
    ///
    /// An absent filter segment defaults to `{passing}`; the accepted
    /// filter set is sorted into canonical order at parse time so that
    /// [`Display`](fmt::Display) output and equality are deterministic.
    ///
    /// # Errors
    ///
    /// - [`BeaconError::MalformedIdentifier`] on a grammar violation
    /// - [`BeaconError::InvalidFilter`] naming the first token outside the
    ///   `{any, passing, warning, critical, maintenance}` vocabulary
    pub fn new(s: &str) -> Result<Self> {
        Self::parse(s, false, "health.service")
    }

    /// Like [`new`](Self::new), but queries the Connect variant.
    pub fn new_connect(s: &str) -> Result<Self> {
        Self::parse(s, true, "health.connect")
    }

    fn parse(s: &str, connect: bool, kind: &'static str) -> Result<Self> {
        let ident = ident::parse_health(kind, s)?;

        let mut filters = match ident.filters {
            Some(tokens) => tokens
                .into_iter()
                .map(|token| {
                    HealthStatus::from_str(&token).map_err(|()| BeaconError::InvalidFilter {
                        kind,
                        token,
                        input: s.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => vec![HealthStatus::Passing],
        };
        filters.sort_by_key(|status| status.as_str());

        Ok(Self {
            dc: ident.datacenter,
            filters,
            name: ident.name,
            near: ident.near,
            tag: ident.tag,
            connect,
            opts: QueryOptions::default(),
            stop: CancellationToken::new(),
        })
    }

    fn kind(&self) -> &'static str {
        if self.connect { "health.connect" } else { "health.service" }
    }

    /// `true` when the filter set accepts entries of the given status.
    fn accept(&self, status: HealthStatus) -> bool {
        self.filters
            .iter()
            .any(|filter| *filter == status || *filter == HealthStatus::Any)
    }
}

/// Aggregates an entry's checks into a single status.
///
/// Maintenance-mode check ids dominate, then critical, then warning. An
/// entry with no checks at all counts as passing.
fn aggregated_status(checks: &[RawCheck]) -> HealthStatus {
    let mut warning = false;
    let mut critical = false;
    let mut maintenance = false;

    for check in checks {
        if check.check_id == NODE_MAINT || check.check_id.starts_with(SERVICE_MAINT_PREFIX) {
            maintenance = true;
            continue;
        }
        match check.status.as_str() {
            "warning" => warning = true,
            "critical" => critical = true,
            _ => {}
        }
    }

    if maintenance {
        HealthStatus::Maintenance
    } else if critical {
        HealthStatus::Critical
    } else if warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Passing
    }
}

#[async_trait]
impl Dependency for HealthServiceQuery {
    async fn fetch(&self, transport: &dyn Transport) -> Result<(DepValue, ResponseMetadata)> {
        if self.stop.is_cancelled() {
            return Err(BeaconError::Stopped);
        }

        let opts = self.opts.merge(&QueryOptions {
            datacenter: self.dc.clone(),
            near: self.near.clone(),
            ..Default::default()
        });

        // The server can only pre-filter "passing instances". Any other
        // filter set needs the full entry list and client-side filtering.
        let passing_only = self.filters == [HealthStatus::Passing];

        trace!("{self}: GET health/{}/{}", if self.connect { "connect" } else { "service" }, self.name);
        let fut = if self.connect {
            transport.health_connect(&self.name, self.tag.as_deref(), passing_only, &opts)
        } else {
            transport.health_service(&self.name, self.tag.as_deref(), passing_only, &opts)
        };
        let (entries, meta) = tokio::select! {
            () = self.stop.cancelled() => return Err(BeaconError::Stopped),
            res = fut => {
                res.map_err(|source| BeaconError::Transport {
                    dependency: self.to_string(),
                    source,
                })?
            }
        };

        trace!("{self}: returned {} results", entries.len());

        let mut list = Vec::with_capacity(entries.len());
        for entry in entries {
            let status = aggregated_status(&entry.checks);
            if !self.accept(status) {
                continue;
            }

            // Effective address: the service's own, or the node's.
            let address = if entry.service.address.is_empty() {
                entry.node.address.clone()
            } else {
                entry.service.address.clone()
            };

            let checks = entry
                .checks
                .into_iter()
                .map(|c| HealthCheck {
                    node: c.node,
                    check_id: c.check_id,
                    name: c.name,
                    status: c.status,
                    notes: c.notes,
                    output: c.output,
                    service_id: c.service_id,
                    service_name: c.service_name,
                    service_tags: c.service_tags,
                    kind: c.kind,
                    namespace: c.namespace,
                })
                .collect();

            let mut tags = entry.service.tags;
            tags.sort();

            list.push(HealthService {
                node: entry.node.node,
                node_id: entry.node.id,
                node_address: entry.node.address,
                node_datacenter: entry.node.datacenter,
                node_tagged_addresses: entry.node.tagged_addresses,
                node_meta: entry.node.meta,
                service_meta: entry.service.meta,
                address,
                id: entry.service.id,
                name: entry.service.service,
                tags,
                checks,
                status,
                port: entry.service.port,
                weights: ServiceWeights {
                    passing: entry.service.weights.passing,
                    warning: entry.service.weights.warning,
                },
                namespace: entry.service.namespace,
            });
        }

        debug!("{self}: returned {} results after filtering", list.len());

        // Sort unless the user explicitly asked for nearness; proximity
        // order is the server's to decide.
        if self.near.is_none() {
            list.sort_by(|a, b| a.node.cmp(&b.node).then_with(|| a.id.cmp(&b.id)));
        }

        Ok((DepValue::HealthServices(list), meta))
    }

    fn set_options(&mut self, opts: QueryOptions) {
        self.opts = opts;
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

impl fmt::Display for HealthServiceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut name = self.name.clone();
        if let Some(tag) = &self.tag {
            name = format!("{tag}.{name}");
        }
        if let Some(dc) = &self.dc {
            name.push('@');
            name.push_str(dc);
        }
        if let Some(near) = &self.near {
            name.push('~');
            name.push_str(near);
        }
        // The default filter set is implied and omitted from the canonical
        // form.
        if self.filters != [HealthStatus::Passing] {
            name.push('|');
            let filters: Vec<&str> = self.filters.iter().map(|s| s.as_str()).collect();
            name.push_str(&filters.join(","));
        }
        write!(f, "{}({name})", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BeaconError;
    use crate::test_utils::{service_entry, MockTransport};

    fn fetch_names(list: &DepValue) -> Vec<(String, String)> {
        let DepValue::HealthServices(list) = list else {
            panic!("expected health services");
        };
        list.iter().map(|s| (s.node.clone(), s.id.clone())).collect()
    }

    #[test]
    fn test_new_parses_descriptor() {
        let dep = HealthServiceQuery::new("svc@dc1").unwrap();
        assert_eq!(dep.name, "svc");
        assert_eq!(dep.dc.as_deref(), Some("dc1"));
        assert_eq!(dep.filters, vec![HealthStatus::Passing]);
        assert_eq!(dep.to_string(), "health.service(svc@dc1)");
    }

    #[test]
    fn test_new_rejects_invalid_filter_token() {
        let err = HealthServiceQuery::new("svc|passing,bogus").unwrap_err();
        match err {
            BeaconError::InvalidFilter { token, .. } => assert_eq!(token, "bogus"),
            other => panic!("expected InvalidFilter, got {other:?}"),
        }
    }

    #[test]
    fn test_filters_are_canonically_sorted() {
        let dep = HealthServiceQuery::new("svc|warning,passing").unwrap();
        assert_eq!(dep.filters, vec![HealthStatus::Passing, HealthStatus::Warning]);
        assert_eq!(dep.to_string(), "health.service(svc|passing,warning)");
    }

    #[test]
    fn test_string_round_trip_is_stable() {
        for input in ["svc@dc1", "tag.svc@dc1~node1|critical,passing", "", "svc|any"] {
            let first = HealthServiceQuery::new(input).unwrap().to_string();
            // Re-parse the reconstructed identifier and stringify again.
            let inner = first
                .strip_prefix("health.service(")
                .and_then(|s| s.strip_suffix(')'))
                .unwrap();
            let second = HealthServiceQuery::new(inner).unwrap().to_string();
            assert_eq!(first, second, "{input}");
        }
    }

    #[test]
    fn test_connect_kind_tag() {
        let dep = HealthServiceQuery::new_connect("svc").unwrap();
        assert_eq!(dep.to_string(), "health.connect(svc)");
        assert!(dep.is_blocking());
    }

    #[test]
    fn test_aggregated_status() {
        let check = |id: &str, status: &str| RawCheck {
            check_id: id.to_string(),
            status: status.to_string(),
            ..Default::default()
        };

        assert_eq!(aggregated_status(&[]), HealthStatus::Passing);
        assert_eq!(
            aggregated_status(&[check("serf", "passing")]),
            HealthStatus::Passing
        );
        assert_eq!(
            aggregated_status(&[check("serf", "passing"), check("svc", "warning")]),
            HealthStatus::Warning
        );
        assert_eq!(
            aggregated_status(&[check("svc", "warning"), check("disk", "critical")]),
            HealthStatus::Critical
        );
        assert_eq!(
            aggregated_status(&[check(NODE_MAINT, "critical")]),
            HealthStatus::Maintenance
        );
        assert_eq!(
            aggregated_status(&[check("_service_maintenance:web1", "passing"), check("disk", "critical")]),
            HealthStatus::Maintenance
        );
    }

    #[tokio::test]
    async fn test_connect_fetch_uses_connect_endpoint() {
        let transport = MockTransport::new();
        // Same service name on both endpoints; only the Connect-capable
        // instance must come back.
        transport.set_service("web", vec![service_entry("node-a", "10.0.0.1", "a1", "web")]);
        transport.set_connect("web", vec![service_entry("node-c", "10.0.0.3", "c1", "web")]);

        let dep = HealthServiceQuery::new_connect("web").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(fetch_names(&value), vec![("node-c".to_string(), "c1".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_sorts_by_node_then_id() {
        let transport = MockTransport::new();
        transport.set_service(
            "web",
            vec![
                service_entry("node-b", "10.0.0.2", "b1", "web"),
                service_entry("node-a", "10.0.0.1", "a1", "web"),
            ],
        );

        let dep = HealthServiceQuery::new("web").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(
            fetch_names(&value),
            vec![
                ("node-a".to_string(), "a1".to_string()),
                ("node-b".to_string(), "b1".to_string()),
            ]
        );

        // Unchanged backing data: identical order on the next fetch.
        let (again, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(value, again);
    }

    #[tokio::test]
    async fn test_fetch_near_hint_preserves_server_order() {
        let transport = MockTransport::new();
        transport.set_service(
            "web",
            vec![
                service_entry("node-b", "10.0.0.2", "b1", "web"),
                service_entry("node-a", "10.0.0.1", "a1", "web"),
            ],
        );

        let dep = HealthServiceQuery::new("web~node-b").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(
            fetch_names(&value),
            vec![
                ("node-b".to_string(), "b1".to_string()),
                ("node-a".to_string(), "a1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_applies_status_filter_client_side() {
        let mut warn = service_entry("node-a", "10.0.0.1", "a1", "web");
        warn.checks[0].status = "warning".to_string();
        let transport = MockTransport::new();
        transport.set_service(
            "web",
            vec![warn, service_entry("node-b", "10.0.0.2", "b1", "web")],
        );

        let dep = HealthServiceQuery::new("web|warning").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();
        assert_eq!(fetch_names(&value), vec![("node-a".to_string(), "a1".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_address_fallback_and_tag_sort() {
        let mut entry = service_entry("node-a", "10.0.0.1", "a1", "web");
        entry.service.address = String::new();
        entry.service.tags = vec!["v2".to_string(), "v1".to_string()];
        let transport = MockTransport::new();
        transport.set_service("web", vec![entry]);

        let dep = HealthServiceQuery::new("web").unwrap();
        let (value, _) = dep.fetch(&transport).await.unwrap();
        let DepValue::HealthServices(list) = value else {
            panic!("expected health services");
        };
        assert_eq!(list[0].address, "10.0.0.1");
        assert_eq!(list[0].tags, vec!["v1".to_string(), "v2".to_string()]);
        assert_eq!(list[0].status, HealthStatus::Passing);
    }
}
