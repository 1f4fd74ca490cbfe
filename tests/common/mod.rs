//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ledger_ingest::ingest::BoxError;
use ledger_ingest::source::{
    EventsPage, EventsRequest, LedgerPage, LedgerSource, LedgersRequest, RawEvent, RawLedger,
    SourceError, SourceHealth, SourceResult,
};
use ledger_ingest::{ContractEvent, EngineConfig, EventHandler};

/// Engine config with short waits so loops finish quickly.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::new("http://127.0.0.1:1");
    config.page_size = 10;
    config.live_wait_interval_ms = 20;
    config.paging_interval_ms = 0;
    config.archival_interval_ms = 0;
    config
}

pub fn raw_event(ledger: u32, index: u32) -> RawEvent {
    contract_event(ledger, index, "CTOKEN")
}

pub fn contract_event(ledger: u32, index: u32, contract: &str) -> RawEvent {
    RawEvent {
        event_type: "contract".to_string(),
        ledger,
        ledger_closed_at: "2026-01-01T00:00:00Z".to_string(),
        contract_id: contract.to_string(),
        id: format!("{:012}-{:04}", ledger, index),
        topic: vec!["AAAADwAAAAh0cmFuc2Zlcg==".to_string()],
        value: "AAAAAQ==".to_string(),
        in_successful_contract_call: true,
        tx_hash: format!("tx-{}-{}", ledger, index),
    }
}

pub fn raw_ledger(sequence: u32, events: Vec<RawEvent>) -> RawLedger {
    RawLedger {
        sequence,
        hash: format!("hash-{}", sequence),
        ledger_close_time: "1767225600".to_string(),
        metadata_xdr: String::new(),
        events,
    }
}

fn health(oldest_ledger: u32, latest_ledger: u32) -> SourceHealth {
    SourceHealth {
        healthy: true,
        oldest_ledger,
        latest_ledger,
        retention_window: latest_ledger.saturating_sub(oldest_ledger),
    }
}

/// Scripted in-memory source.
///
/// Each health query consumes one scripted window; the last one repeats.
/// Event pages are served per ledger, with `page_overlap` events repeated
/// at the start of every continuation page.
pub struct MockSource {
    endpoint: String,
    windows: Mutex<VecDeque<SourceHealth>>,
    events: BTreeMap<u32, Vec<RawEvent>>,
    ledgers: BTreeMap<u32, RawLedger>,
    page_overlap: usize,
    fail_events_at: Option<u32>,
    fail_ledgers_at: Option<u32>,
    unhealthy: bool,
    health_calls: AtomicUsize,
    pub event_requests: Mutex<Vec<EventsRequest>>,
    pub ledger_requests: Mutex<Vec<LedgersRequest>>,
}

impl MockSource {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            windows: Mutex::new(VecDeque::new()),
            events: BTreeMap::new(),
            ledgers: BTreeMap::new(),
            page_overlap: 0,
            fail_events_at: None,
            fail_ledgers_at: None,
            unhealthy: false,
            health_calls: AtomicUsize::new(0),
            event_requests: Mutex::new(Vec::new()),
            ledger_requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a retention window to the health script.
    pub fn with_window(self, oldest_ledger: u32, latest_ledger: u32) -> Self {
        self.windows
            .lock()
            .unwrap()
            .push_back(health(oldest_ledger, latest_ledger));
        self
    }

    pub fn with_event(mut self, event: RawEvent) -> Self {
        self.events.entry(event.ledger).or_default().push(event);
        self
    }

    /// `count` events in each ledger of `ledgers`.
    pub fn with_events(mut self, ledgers: std::ops::RangeInclusive<u32>, count: u32) -> Self {
        for ledger in ledgers {
            for index in 0..count {
                self = self.with_event(raw_event(ledger, index));
            }
        }
        self
    }

    /// Archive ledgers, each carrying `count` events.
    pub fn with_ledgers(mut self, ledgers: std::ops::RangeInclusive<u32>, count: u32) -> Self {
        for sequence in ledgers {
            let events = (0..count).map(|i| raw_event(sequence, i)).collect();
            self.ledgers.insert(sequence, raw_ledger(sequence, events));
        }
        self
    }

    pub fn with_page_overlap(mut self, overlap: usize) -> Self {
        self.page_overlap = overlap;
        self
    }

    pub fn failing_events_at(mut self, ledger: u32) -> Self {
        self.fail_events_at = Some(ledger);
        self
    }

    pub fn failing_ledgers_at(mut self, ledger: u32) -> Self {
        self.fail_ledgers_at = Some(ledger);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn polled_ledgers(&self) -> Vec<u32> {
        self.event_requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.start_ledger)
            .collect()
    }

    pub fn ledger_batches(&self) -> Vec<LedgersRequest> {
        self.ledger_requests.lock().unwrap().clone()
    }

    fn current_window(&self) -> SourceHealth {
        self.windows
            .lock()
            .unwrap()
            .front()
            .copied()
            .unwrap_or_else(|| health(0, 0))
    }

    fn next_window(&self) -> SourceHealth {
        let mut windows = self.windows.lock().unwrap();
        let current = windows.front().copied().unwrap_or_else(|| health(0, 0));
        if windows.len() > 1 {
            windows.pop_front();
        }
        current
    }

    fn events_page(&self, request: &EventsRequest) -> SourceResult<EventsPage> {
        let (ledger, offset) = match &request.cursor {
            Some(cursor) => {
                let (ledger, offset) = cursor.split_once(':').unwrap();
                (ledger.parse().unwrap(), offset.parse::<usize>().unwrap())
            }
            None => (request.start_ledger.unwrap(), 0),
        };

        if self.fail_events_at == Some(ledger) {
            return Err(SourceError::Transport("connection reset".to_string()));
        }

        let all = self.events.get(&ledger).cloned().unwrap_or_default();
        let limit = request.limit as usize;
        let end = (offset + limit).min(all.len());
        let events = all[offset.min(end)..end].to_vec();
        let cursor = (events.len() == limit && end < all.len())
            .then(|| format!("{}:{}", ledger, end - self.page_overlap));

        Ok(EventsPage {
            events,
            latest_ledger: self.current_window().latest_ledger,
            cursor,
        })
    }

    fn ledgers_page(&self, request: &LedgersRequest) -> SourceResult<LedgerPage> {
        if self.fail_ledgers_at == Some(request.start_ledger) {
            return Err(SourceError::Http { status: 503 });
        }

        let ledgers = self
            .ledgers
            .range(request.start_ledger..)
            .take(request.limit as usize)
            .map(|(_, ledger)| ledger.clone())
            .collect();
        Ok(LedgerPage {
            ledgers,
            latest_ledger: self.ledgers.keys().next_back().copied().unwrap_or(0),
            oldest_ledger: self.ledgers.keys().next().copied().unwrap_or(0),
        })
    }
}

impl LedgerSource for MockSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_health(&self) -> BoxFuture<'_, SourceResult<SourceHealth>> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let mut window = self.next_window();
        window.healthy = !self.unhealthy;
        Box::pin(async move { Ok(window) })
    }

    fn get_events<'a>(&'a self, request: &'a EventsRequest) -> BoxFuture<'a, SourceResult<EventsPage>> {
        self.event_requests.lock().unwrap().push(request.clone());
        Box::pin(async move { self.events_page(request) })
    }

    fn get_ledgers<'a>(
        &'a self,
        request: &'a LedgersRequest,
    ) -> BoxFuture<'a, SourceResult<LedgerPage>> {
        self.ledger_requests.lock().unwrap().push(*request);
        Box::pin(async move { self.ledgers_page(request) })
    }
}

/// Handler that records every delivered event.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<ContractEvent>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    pub fn ledgers(&self) -> Vec<u32> {
        self.events.lock().unwrap().iter().map(|e| e.ledger).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&mut self, event: ContractEvent) -> impl Future<Output = Result<(), BoxError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

/// Start a programmable JSON-RPC backend on an ephemeral port.
///
/// `f` receives the decoded request body and returns the HTTP status and
/// the JSON body to send back.
pub async fn start_rpc_backend<F>(f: F) -> SocketAddr
where
    F: Fn(Value) -> (u16, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_json_body(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request);
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "400 Bad Request",
                        };
                        let body = body.to_string();
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Where a stalled backend stops responding.
#[derive(Debug, Clone, Copy)]
pub enum Stall {
    /// Read the request, then never send headers.
    BeforeHeaders,
    /// Send `200 OK` headers and part of the body, then go quiet.
    MidBody,
}

/// Backend that accepts JSON-RPC requests and hangs instead of answering.
pub async fn start_stalled_backend(stall: Stall) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_json_body(&mut socket).await.is_none() {
                    return;
                }
                if let Stall::MidBody = stall {
                    let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"jsonrpc\":\"2.0\",";
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.flush().await;
                }
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// JSON-RPC success envelope echoing the request id.
pub fn rpc_result(request: &Value, result: Value) -> Value {
    serde_json::json!({ "jsonrpc": "2.0", "id": request["id"], "result": result })
}

async fn read_json_body(socket: &mut tokio::net::TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    serde_json::from_slice(&buf[header_end..header_end + content_length]).ok()
}
