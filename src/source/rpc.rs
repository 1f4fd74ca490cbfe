//! JSON-RPC ledger source client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to a node's JSON-RPC endpoint
//! - Query health, events and ledger payloads
//! - Bound every call with a timeout
//! - Translate wire shapes into source types

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::event::EventFilter;
use crate::observability::metrics;
use crate::source::types::{
    EventsPage, EventsRequest, LedgerPage, LedgersRequest, RawEvent, RawLedger, SourceError,
    SourceHealth, SourceResult,
};
use crate::source::LedgerSource;

/// JSON-RPC client for a single node endpoint.
#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    http: reqwest::Client,
    timeout_secs: u64,
}

impl RpcClient {
    /// Create a client for `endpoint`.
    ///
    /// No request is made; connectivity problems surface on first use.
    pub fn new(endpoint: &str, timeout_secs: u64) -> SourceResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SourceError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_http_client(endpoint, http, timeout_secs)
    }

    /// Create a client that sends requests through an existing HTTP client.
    pub fn with_http_client(
        endpoint: &str,
        http: reqwest::Client,
        timeout_secs: u64,
    ) -> SourceResult<Self> {
        let url: url::Url = endpoint.parse().map_err(|e| {
            SourceError::Transport(format!("Invalid RPC URL '{}': {}", endpoint, e))
        })?;

        tracing::debug!(endpoint = %url, timeout_secs, "RPC client created");

        Ok(Self {
            endpoint: endpoint.to_string(),
            http,
            timeout_secs,
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> SourceResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: Uuid::new_v4().to_string(),
            method,
            params,
        };

        // The bound covers the body as well as the headers.
        match timeout(Duration::from_secs(self.timeout_secs), self.exchange(method, &request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(endpoint = %self.endpoint, method, "RPC timeout");
                Err(SourceError::Timeout(self.timeout_secs))
            }
        }
    }

    async fn exchange<P, R>(&self, method: &'static str, request: &RpcRequest<'_, P>) -> SourceResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, method, error = %e, "RPC error");
                SourceError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(SourceError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        body.result
            .ok_or_else(|| SourceError::InvalidResponse(format!("{} returned no result", method)))
    }

    async fn fetch_health(&self) -> SourceResult<SourceHealth> {
        let result: HealthResult = self.call("getHealth", serde_json::Value::Null).await?;
        let health = SourceHealth {
            healthy: result.status.eq_ignore_ascii_case("healthy"),
            oldest_ledger: result.oldest_ledger,
            latest_ledger: result.latest_ledger,
            retention_window: result.ledger_retention_window,
        };
        metrics::record_source_health(&self.endpoint, health.healthy);
        Ok(health)
    }

    async fn fetch_events(&self, request: &EventsRequest) -> SourceResult<EventsPage> {
        let params = EventsParams {
            start_ledger: request.start_ledger,
            end_ledger: request.end_ledger,
            filters: &request.filters,
            pagination: Pagination {
                cursor: request.cursor.as_deref(),
                limit: request.limit,
            },
        };
        let result: EventsResult = self.call("getEvents", params).await?;

        // The node always hands back a cursor; only a full page means more remain.
        let full_page = result.events.len() >= request.limit as usize;
        Ok(EventsPage {
            cursor: result.cursor.filter(|c| full_page && !c.is_empty()),
            events: result.events,
            latest_ledger: result.latest_ledger,
        })
    }

    async fn fetch_ledgers(&self, request: &LedgersRequest) -> SourceResult<LedgerPage> {
        let params = LedgersParams {
            start_ledger: request.start_ledger,
            pagination: Pagination {
                cursor: None,
                limit: request.limit,
            },
        };
        let result: LedgersResult = self.call("getLedgers", params).await?;
        Ok(LedgerPage {
            ledgers: result.ledgers,
            latest_ledger: result.latest_ledger,
            oldest_ledger: result.oldest_ledger,
        })
    }
}

impl LedgerSource for RpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_health(&self) -> BoxFuture<'_, SourceResult<SourceHealth>> {
        Box::pin(self.fetch_health())
    }

    fn get_events<'a>(&'a self, request: &'a EventsRequest) -> BoxFuture<'a, SourceResult<EventsPage>> {
        Box::pin(self.fetch_events(request))
    }

    fn get_ledgers<'a>(
        &'a self,
        request: &'a LedgersRequest,
    ) -> BoxFuture<'a, SourceResult<LedgerPage>> {
        Box::pin(self.fetch_ledgers(request))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    limit: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_ledger: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_ledger: Option<u32>,
    filters: &'a [EventFilter],
    pagination: Pagination<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgersParams<'a> {
    start_ledger: u32,
    pagination: Pagination<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResult {
    status: String,
    latest_ledger: u32,
    oldest_ledger: u32,
    #[serde(default)]
    ledger_retention_window: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResult {
    #[serde(default)]
    events: Vec<RawEvent>,
    latest_ledger: u32,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgersResult {
    #[serde(default)]
    ledgers: Vec<RawLedger>,
    latest_ledger: u32,
    #[serde(default)]
    oldest_ledger: u32,
}
