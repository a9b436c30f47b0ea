//! Firebase Realtime Database backend over its REST and streaming API.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    merge_at, set_at, value_at, DocPath, DocumentStore, DocumentSubscription, StoreError,
    TxnDecision, TxnOutcome, TxnUpdate,
};
use crate::tokio_tools::spawn_room_task;

const LOG_TARGET: &str = "rps_duel::store::firebase";
const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

#[derive(Debug, Clone)]
pub struct FirebaseStoreConfig {
    pub database_url: Url,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth: Option<String>,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_transaction_attempts: u32,
}

impl FirebaseStoreConfig {
    pub fn new(database_url: Url) -> Self {
        Self {
            database_url,
            auth: None,
            request_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            max_transaction_attempts: 8,
        }
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    fn url_for(&self, path: &DocPath) -> Result<Url, StoreError> {
        let mut url = self.database_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Transport("database url cannot be a base".into()))?;
            segments.pop_if_empty();
            match path.segments().split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }
}

#[derive(Clone)]
pub struct FirebaseDocumentStore {
    cfg: FirebaseStoreConfig,
    http: Client,
}

impl FirebaseDocumentStore {
    pub fn new(cfg: FirebaseStoreConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(cfg.request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { cfg, http })
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn decode_optional(response: Response) -> Result<Option<Value>, StoreError> {
    let value: Value = response.json().await.map_err(transport)?;
    Ok(if value.is_null() { None } else { Some(value) })
}

#[async_trait]
impl DocumentStore for FirebaseDocumentStore {
    async fn write(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError> {
        let response = self
            .http
            .patch(self.cfg.url_for(path)?)
            .timeout(self.cfg.request_timeout)
            .json(&Value::Object(fields))
            .send()
            .await
            .map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn remove(&self, path: &DocPath) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.cfg.url_for(path)?)
            .timeout(self.cfg.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        let response = self
            .http
            .get(self.cfg.url_for(path)?)
            .timeout(self.cfg.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        decode_optional(ensure_success(response).await?).await
    }

    async fn subscribe(&self, path: &DocPath) -> Result<DocumentSubscription, StoreError> {
        let url = self.cfg.url_for(path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        let stream = EventStream {
            http: self.http.clone(),
            url,
            reconnect_delay: self.cfg.reconnect_delay,
            tx,
            stop: stop.clone(),
        };
        let room = path.to_string();
        spawn_room_task("firebase-event-stream", &room, stream.run());
        Ok(DocumentSubscription::new(rx, Some(stop.drop_guard())))
    }

    async fn transact(
        &self,
        path: &DocPath,
        update: TxnUpdate<'_>,
    ) -> Result<TxnOutcome, StoreError> {
        let url = self.cfg.url_for(path)?;
        for attempt in 1..=self.cfg.max_transaction_attempts {
            let response = self
                .http
                .get(url.clone())
                .header(ETAG_REQUEST_HEADER, "true")
                .timeout(self.cfg.request_timeout)
                .send()
                .await
                .map_err(transport)?;
            let response = ensure_success(response).await?;
            let etag = response
                .headers()
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| StoreError::Transport("missing ETag header".into()))?;
            let current = decode_optional(response).await?;

            let value = match update(current.as_ref()) {
                TxnDecision::Commit(value) => value,
                TxnDecision::Abort => return Ok(TxnOutcome::Aborted(current)),
            };

            let response = self
                .http
                .put(url.clone())
                .header(header::IF_MATCH, etag)
                .timeout(self.cfg.request_timeout)
                .json(&value)
                .send()
                .await
                .map_err(transport)?;
            if response.status() == StatusCode::PRECONDITION_FAILED {
                debug!(target: LOG_TARGET, %path, attempt, "transaction lost a race, retrying");
                continue;
            }
            ensure_success(response).await?;
            return Ok(TxnOutcome::Committed(value));
        }
        Err(StoreError::Conflict {
            attempts: self.cfg.max_transaction_attempts,
        })
    }
}

// ---- Streaming subscription ----------------------------------------------------------------

struct EventStream {
    http: Client,
    url: Url,
    reconnect_delay: Duration,
    tx: mpsc::UnboundedSender<Option<Value>>,
    stop: CancellationToken,
}

/// Why a streaming connection ended.
enum StreamEnd {
    Reconnect,
    Finished,
}

impl EventStream {
    async fn run(self) {
        let url = redact(&self.url);
        info!(target: LOG_TARGET, %url, "starting event stream");
        let mut last_sent: Option<Option<Value>> = None;
        while !self.stop.is_cancelled() {
            match self.pump(&mut last_sent).await {
                Ok(StreamEnd::Finished) => break,
                Ok(StreamEnd::Reconnect) => {}
                Err(err) => {
                    warn!(target: LOG_TARGET, error = %err, "event stream ended with error");
                }
            }

            if self.stop.is_cancelled() || self.tx.is_closed() {
                break;
            }
            debug!(
                target: LOG_TARGET,
                delay_secs = self.reconnect_delay.as_secs_f32(),
                "waiting before reconnect attempt"
            );
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = sleep(self.reconnect_delay) => {}
            }
        }
        info!(target: LOG_TARGET, %url, "event stream stopped");
    }

    async fn pump(&self, last_sent: &mut Option<Option<Value>>) -> Result<StreamEnd, StoreError> {
        let response = self
            .http
            .get(self.url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport)?;
        let response = ensure_success(response).await?;
        let mut body = response.bytes_stream();
        let mut parser = SseParser::default();
        let mut mirror = Value::Null;

        loop {
            let chunk = tokio::select! {
                _ = self.stop.cancelled() => return Ok(StreamEnd::Finished),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else {
                debug!(target: LOG_TARGET, "event stream closed by server");
                return Ok(StreamEnd::Reconnect);
            };
            let chunk = chunk.map_err(transport)?;

            for event in parser.feed(&chunk) {
                match apply_event(&mut mirror, &event)? {
                    MirrorUpdate::Changed => {
                        let value = value_at(&mirror, &[]).cloned();
                        if last_sent.as_ref() != Some(&value) {
                            *last_sent = Some(value.clone());
                            if self.tx.send(value).is_err() {
                                return Ok(StreamEnd::Finished);
                            }
                        }
                    }
                    MirrorUpdate::Unchanged => {}
                    MirrorUpdate::Closed(reason) => {
                        warn!(target: LOG_TARGET, reason, "event stream closed by database");
                        return Ok(StreamEnd::Finished);
                    }
                }
            }
        }
    }
}

fn redact(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Incremental `text/event-stream` framing.
#[derive(Default)]
struct SseParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(event) = self.event.take() {
                    events.push(SseEvent {
                        event,
                        data: self.data.join("\n"),
                    });
                }
                self.data.clear();
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.event = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.trim_start().to_string());
            }
        }
        events
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    data: Value,
}

#[derive(Debug, PartialEq)]
enum MirrorUpdate {
    Changed,
    Unchanged,
    Closed(&'static str),
}

fn apply_event(mirror: &mut Value, event: &SseEvent) -> Result<MirrorUpdate, StoreError> {
    match event.event.as_str() {
        "put" | "patch" => {
            let payload: ChangePayload = serde_json::from_str(&event.data)?;
            let segments: Vec<String> = payload
                .path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if event.event == "put" {
                set_at(mirror, &segments, payload.data);
            } else if let Value::Object(fields) = payload.data {
                merge_at(mirror, &segments, fields);
            }
            Ok(MirrorUpdate::Changed)
        }
        "keep-alive" => Ok(MirrorUpdate::Unchanged),
        "cancel" => Ok(MirrorUpdate::Closed("cancel")),
        "auth_revoked" => Ok(MirrorUpdate::Closed("auth_revoked")),
        other => {
            debug!(target: LOG_TARGET, event = other, "ignoring stream event");
            Ok(MirrorUpdate::Unchanged)
        }
    }
}
