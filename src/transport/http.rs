//! reqwest-backed transport for the coordination service's HTTP API.
//!
//! Paths follow the service's v1 layout: `/v1/kv/<key>` for the key-value
//! store (with the `recurse` flag for prefix listings) and
//! `/v1/health/service/<name>` / `/v1/health/connect/<name>` for health
//! entries. Response metadata is read from the `X-Consul-Index` and
//! `X-Consul-LastContact` headers.
//!
//! This client is deliberately thin: no retries, no backoff, no caching.
//! Long-poll blocking happens server-side; the only client-side timeout is
//! whatever the underlying [`reqwest::Client`] is configured with, so callers
//! that need bounded latency must set a wait duration in their query options
//! and a request timeout on the client.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use async_trait::async_trait;

use crate::query::{QueryOptions, ResponseMetadata};
use crate::transport::{
    RawKeyPair, RawServiceEntry, Transport, TransportError, TransportResult,
};

const INDEX_HEADER: &str = "X-Consul-Index";
const LAST_CONTACT_HEADER: &str = "X-Consul-LastContact";

/// HTTP client for the coordination service.
///
/// Cheap to clone; the inner [`reqwest::Client`] is an `Arc` around a
/// connection pool, so one `HttpTransport` can serve many dependency
/// instances concurrently.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    /// Creates a transport for the service at `base` (e.g.
    /// `http://127.0.0.1:8500`) with a default [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidBaseUrl`] if `base` is not an
    /// absolute URL.
    pub fn new(base: &str) -> TransportResult<Self> {
        Self::with_client(Client::new(), base)
    }

    /// Creates a transport with a caller-configured client.
    ///
    /// Use this to set request timeouts, TLS, or proxy settings. Note that a
    /// blanket request timeout must exceed the longest wait duration used in
    /// blocking queries, or long-polls will be cut short client-side.
    pub fn with_client(client: Client, base: &str) -> TransportResult<Self> {
        let base = Url::parse(base).map_err(|_| TransportError::InvalidBaseUrl {
            url: base.to_string(),
        })?;
        Ok(Self { client, base })
    }

    /// Issues a GET and decodes a JSON body, tolerating the listed
    /// "empty" statuses (returned as `None`).
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        empty_statuses: &[StatusCode],
    ) -> TransportResult<(Option<T>, ResponseMetadata)> {
        let mut url = self.base.clone();
        url.set_path(path);

        trace!("GET {url} params={params:?}");
        let response = self.client.get(url.clone()).query(params).send().await?;

        let status = response.status();
        let meta = metadata_from_headers(response.headers())?;

        if empty_statuses.contains(&status) {
            debug!("GET {url}: {status} (empty)");
            return Ok((None, meta));
        }
        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.json::<T>().await?;
        Ok((Some(body), meta))
    }

    async fn health_entries(
        &self,
        endpoint: &str,
        name: &str,
        tag: Option<&str>,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)> {
        let mut params = opts.wire_params();
        if let Some(tag) = tag {
            params.push(("tag", tag.to_string()));
        }
        if passing_only {
            params.push(("passing", String::new()));
        }

        let path = format!("/v1/health/{endpoint}/{name}");
        let (entries, meta) = self
            .get_json::<Vec<RawServiceEntry>>(&path, &params, &[])
            .await?;
        Ok((entries.unwrap_or_default(), meta))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn kv_get(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> TransportResult<(Option<RawKeyPair>, ResponseMetadata)> {
        let params = opts.wire_params();
        let path = format!("/v1/kv/{key}");

        // The kv endpoint answers 404 for a missing key; that is "no data",
        // not a failure.
        let (pairs, meta) = self
            .get_json::<Vec<RawKeyPair>>(&path, &params, &[StatusCode::NOT_FOUND])
            .await?;
        let pair = pairs.and_then(|mut pairs| {
            if pairs.is_empty() { None } else { Some(pairs.remove(0)) }
        });
        Ok((pair, meta))
    }

    async fn kv_list(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawKeyPair>, ResponseMetadata)> {
        let mut params = opts.wire_params();
        params.push(("recurse", String::new()));
        let path = format!("/v1/kv/{prefix}");

        // An empty prefix match is also a 404; a listing of zero pairs.
        let (pairs, meta) = self
            .get_json::<Vec<RawKeyPair>>(&path, &params, &[StatusCode::NOT_FOUND])
            .await?;
        Ok((pairs.unwrap_or_default(), meta))
    }

    async fn health_service(
        &self,
        name: &str,
        tag: Option<&str>,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)> {
        self.health_entries("service", name, tag, passing_only, opts).await
    }

    async fn health_connect(
        &self,
        name: &str,
        tag: Option<&str>,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> TransportResult<(Vec<RawServiceEntry>, ResponseMetadata)> {
        self.health_entries("connect", name, tag, passing_only, opts).await
    }
}

/// Extracts the version marker and staleness indicator from response headers.
///
/// Both headers are optional (some endpoints omit them on error paths); an
/// absent header yields the zero value, a present-but-unparseable one is a
/// [`TransportError::InvalidMetadata`].
fn metadata_from_headers(headers: &HeaderMap) -> TransportResult<ResponseMetadata> {
    let last_index = match headers.get(INDEX_HEADER) {
        Some(value) => {
            let text = value.to_str().unwrap_or_default();
            text.parse::<u64>().map_err(|_| TransportError::InvalidMetadata {
                header: INDEX_HEADER,
                value: text.to_string(),
            })?
        }
        None => 0,
    };

    let last_contact = match headers.get(LAST_CONTACT_HEADER) {
        Some(value) => {
            let text = value.to_str().unwrap_or_default();
            let millis = text.parse::<u64>().map_err(|_| TransportError::InvalidMetadata {
                header: LAST_CONTACT_HEADER,
                value: text.to_string(),
            })?;
            Duration::from_millis(millis)
        }
        None => Duration::ZERO,
    };

    Ok(ResponseMetadata { last_index, last_contact })
}
