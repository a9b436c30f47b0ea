use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    merge_at, set_at, value_at, DocPath, DocumentStore, DocumentSubscription, StoreError,
    TxnDecision, TxnOutcome, TxnUpdate,
};

const LOG_TARGET: &str = "rps_duel::store::in_memory";

struct Subscriber {
    path: DocPath,
    last: Option<Value>,
    tx: mpsc::UnboundedSender<Option<Value>>,
}

struct Inner {
    root: Value,
    subscribers: Vec<Subscriber>,
    failing_writes: u32,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            subscribers: Vec::new(),
            failing_writes: 0,
        }
    }
}

impl Inner {
    fn take_fault(&mut self) -> Result<(), StoreError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StoreError::Injected);
        }
        Ok(())
    }

    fn current(&self, path: &DocPath) -> Option<Value> {
        value_at(&self.root, path.segments()).cloned()
    }

    /// Push the new value to every subscriber whose view changed and drop the
    /// ones whose receiver is gone.
    fn notify(&mut self) {
        let root = &self.root;
        self.subscribers.retain_mut(|sub| {
            let now = value_at(root, sub.path.segments()).cloned();
            if now == sub.last {
                return !sub.tx.is_closed();
            }
            sub.last = now.clone();
            sub.tx.send(now).is_ok()
        });
    }
}

/// Process-local document store. Clones share the same tree, which is how
/// two clients in one process (tests, the demo binary) see each other.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` mutating calls fail with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.lock().failing_writes = count;
    }

    /// Copy of the whole tree, for assertions.
    pub fn dump(&self) -> Value {
        self.inner.lock().root.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|sub| !sub.tx.is_closed());
        inner.subscribers.len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn write(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        merge_at(&mut inner.root, path.segments(), fields);
        inner.notify();
        Ok(())
    }

    async fn remove(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        set_at(&mut inner.root, path.segments(), Value::Null);
        inner.notify();
        debug!(target: LOG_TARGET, %path, "removed document");
        Ok(())
    }

    async fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.lock().current(path))
    }

    async fn subscribe(&self, path: &DocPath) -> Result<DocumentSubscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let current = inner.current(path);
        tx.send(current.clone()).map_err(|_| StoreError::Closed)?;
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            last: current,
            tx,
        });
        Ok(DocumentSubscription::new(rx, None))
    }

    async fn transact(
        &self,
        path: &DocPath,
        update: TxnUpdate<'_>,
    ) -> Result<TxnOutcome, StoreError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        let current = inner.current(path);
        match update(current.as_ref()) {
            TxnDecision::Commit(value) => {
                set_at(&mut inner.root, path.segments(), value.clone());
                inner.notify();
                Ok(TxnOutcome::Committed(value))
            }
            TxnDecision::Abort => Ok(TxnOutcome::Aborted(current)),
        }
    }
}
