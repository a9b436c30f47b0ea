//! Shared document store.
//!
//! A key-path JSON store with field-level merges and per-path subscriptions.
//! Both players of a room read and write the same document through it; no
//! process arbitrates between them, so anything that must happen once per
//! round goes through [`DocumentStore::transact`].

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

pub mod firebase;
pub mod in_memory;

pub use firebase::{FirebaseDocumentStore, FirebaseStoreConfig};
pub use in_memory::InMemoryDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transaction kept conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error("subscription closed")]
    Closed,
    #[error("injected write failure")]
    Injected,
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Conflict { .. } | StoreError::Injected => true,
            StoreError::Rejected { status, .. } => *status >= 500,
            StoreError::Decode(_) | StoreError::Closed => false,
        }
    }
}

/// Path into the document tree, kept as raw segments so a room code never
/// needs escaping.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// What a transaction wants done with the value it was shown.
#[derive(Clone, Debug, PartialEq)]
pub enum TxnDecision {
    Commit(Value),
    Abort,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TxnOutcome {
    Committed(Value),
    Aborted(Option<Value>),
}

/// Read-modify-write step of a transaction. It may run several times when
/// the store retries on a conflicting concurrent write.
pub type TxnUpdate<'a> = &'a (dyn Fn(Option<&Value>) -> TxnDecision + Send + Sync);

/// Stream of full values at a subscribed path. `None` means the path is
/// absent. Dropping the subscription unsubscribes.
pub struct DocumentSubscription {
    rx: mpsc::UnboundedReceiver<Option<Value>>,
    _guard: Option<DropGuard>,
}

impl DocumentSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Option<Value>>, guard: Option<DropGuard>) -> Self {
        Self { rx, _guard: guard }
    }

    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge `fields` under `path`. Each key of `fields` is a relative path
    /// (it may contain `/`) whose value replaces whatever was there; siblings
    /// are left untouched. A `null` value removes the field.
    async fn write(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, path: &DocPath) -> Result<(), StoreError>;

    async fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError>;

    /// Deliver the value at `path` now and after every change until the
    /// returned subscription is dropped.
    async fn subscribe(&self, path: &DocPath) -> Result<DocumentSubscription, StoreError>;

    /// Atomically replace the value at `path` with what `update` decides.
    async fn transact(
        &self,
        path: &DocPath,
        update: TxnUpdate<'_>,
    ) -> Result<TxnOutcome, StoreError>;
}

// ---- JSON tree helpers shared by the backends ----------------------------------------------

pub(crate) fn value_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut cursor = root;
    for segment in segments {
        cursor = cursor.as_object()?.get(segment)?;
    }
    if cursor.is_null() {
        None
    } else {
        Some(cursor)
    }
}

/// Replace (or with `Value::Null`, remove) the node at `segments`, creating
/// intermediate objects and pruning the ones left empty.
pub(crate) fn set_at(root: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return;
    };
    if !root.is_object() {
        if value.is_null() {
            return;
        }
        *root = Value::Object(Map::new());
    }
    let Some(map) = root.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }
    let child = map.entry(head.clone()).or_insert(Value::Null);
    set_at(child, rest, value);
    if is_empty_node(child) {
        map.remove(head);
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Apply a multi-path merge rooted at `segments`.
pub(crate) fn merge_at(root: &mut Value, segments: &[String], fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut target = segments.to_vec();
        target.extend(
            key.split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
        set_at(root, &target, value);
    }
}
