use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::RetryPolicy;
use crate::room::RoomCode;
use crate::store::{DocPath, DocumentStore, DocumentSubscription, StoreError, TxnDecision};

use super::document::SessionDocument;

const LOG_TARGET: &str = "rps_duel::session::repository";

/// Decision of a typed transaction step.
#[derive(Debug)]
pub enum Apply<R> {
    /// Replace the document and report `R`.
    Commit(SessionDocument, R),
    /// Leave the document as it is and report `R`.
    Skip(R),
}

/// Typed access to `rooms/<code>` documents.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn room_path(code: &RoomCode) -> DocPath {
        DocPath::new(["rooms", code.as_str()])
    }

    pub fn decode(value: Option<Value>) -> Result<Option<SessionDocument>, StoreError> {
        value
            .map(serde_json::from_value::<SessionDocument>)
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn load(&self, code: &RoomCode) -> Result<Option<SessionDocument>, StoreError> {
        let path = Self::room_path(code);
        let value = self.retry.run("read", || self.store.read(&path)).await?;
        Self::decode(value)
    }

    pub async fn subscribe(&self, code: &RoomCode) -> Result<DocumentSubscription, StoreError> {
        let path = Self::room_path(code);
        self.retry.run("subscribe", || self.store.subscribe(&path)).await
    }

    pub async fn delete(&self, code: &RoomCode) -> Result<(), StoreError> {
        let path = Self::room_path(code);
        self.retry.run("remove", || self.store.remove(&path)).await
    }

    /// Runs `step` against the latest document under the store's
    /// compare-and-set. `step` may be invoked several times when writers race;
    /// the value reported is the one from the invocation that settled.
    #[instrument(target = LOG_TARGET, level = "debug", skip_all, fields(room = %code))]
    pub async fn update<R, F>(&self, code: &RoomCode, step: F) -> Result<R, StoreError>
    where
        R: Send,
        F: Fn(Option<SessionDocument>) -> Apply<R> + Send + Sync,
    {
        let path = Self::room_path(code);
        let settled: Mutex<Option<Result<R, StoreError>>> = Mutex::new(None);

        let txn = |current: Option<&Value>| -> TxnDecision {
            let decoded = match Self::decode(current.cloned()) {
                Ok(doc) => doc,
                Err(err) => {
                    *settled.lock() = Some(Err(err));
                    return TxnDecision::Abort;
                }
            };
            match step(decoded) {
                Apply::Commit(doc, report) => match serde_json::to_value(&doc) {
                    Ok(value) => {
                        *settled.lock() = Some(Ok(report));
                        TxnDecision::Commit(value)
                    }
                    Err(err) => {
                        *settled.lock() = Some(Err(err.into()));
                        TxnDecision::Abort
                    }
                },
                Apply::Skip(report) => {
                    *settled.lock() = Some(Ok(report));
                    TxnDecision::Abort
                }
            }
        };

        let outcome = self
            .retry
            .run("transaction", || self.store.transact(&path, &txn))
            .await?;
        debug!(target: LOG_TARGET, ?outcome, "transaction settled");
        let settled = settled.lock().take();
        settled.unwrap_or(Err(StoreError::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::document::{PlayerSlot, SessionStatus};
    use crate::store::InMemoryDocumentStore;
    use anyhow::Result;
    use chrono::Utc;
    use uuid::Uuid;

    fn repo(store: &InMemoryDocumentStore) -> SessionRepository {
        SessionRepository::new(Arc::new(store.clone()), RetryPolicy::none())
    }

    #[tokio::test]
    async fn update_commits_and_reports() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let repo = repo(&store);
        let code = RoomCode::parse("AB12")?;

        let created = repo
            .update(&code, |current| match current {
                None => {
                    let host = PlayerSlot::new("Ann", Uuid::new_v4());
                    Apply::Commit(SessionDocument::new(&code, host, Utc::now()), true)
                }
                Some(_) => Apply::Skip(false),
            })
            .await?;
        assert!(created);

        let again = repo
            .update(&code, |current| match current {
                None => unreachable!("document was just written"),
                Some(_) => Apply::Skip(false),
            })
            .await?;
        assert!(!again);

        let loaded = repo.load(&code).await?.expect("document");
        assert_eq!(loaded.status, SessionStatus::Waiting);
        assert_eq!(loaded.code, "AB12");
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_documents_surface_as_decode_errors() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let repo = repo(&store);
        let code = RoomCode::parse("AB12")?;
        let mut fields = serde_json::Map::new();
        fields.insert("round".into(), Value::String("one".into()));
        store
            .write(&SessionRepository::room_path(&code), fields)
            .await?;

        let result = repo.update(&code, |_| Apply::Skip(())).await;
        assert!(matches!(result, Err(StoreError::Decode(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_writes_propagate_after_retries() -> Result<()> {
        let store = InMemoryDocumentStore::new();
        let repo = repo(&store);
        let code = RoomCode::parse("AB12")?;
        store.fail_next_writes(1);
        let result = repo.delete(&code).await;
        assert!(matches!(result, Err(StoreError::Injected)));
        repo.delete(&code).await?;
        Ok(())
    }
}
