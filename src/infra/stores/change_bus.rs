use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::domain::ports::{DocPath, Document, DocumentWatch, QueryWatch};
use crate::error::AppError;

const WATCH_BUFFER: usize = 16;

// Stores publish and subscribe while holding their write lock, which keeps
// channel contents in step with committed state.
pub(crate) struct ChangeBus {
    docs: Mutex<HashMap<DocPath, watch::Sender<Option<Value>>>>,
    collections: Mutex<HashMap<String, watch::Sender<u64>>>,
}

impl ChangeBus {
    pub(crate) fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            collections: Mutex::new(HashMap::new()),
        }
    }

    // Channels with no receivers left are pruned.
    pub(crate) fn publish(&self, path: &DocPath, value: Option<Value>) {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = docs.get(path) {
            sender.send_replace(value);
            if sender.receiver_count() == 0 {
                docs.remove(path);
            }
        }
        drop(docs);

        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = collections.get(&path.collection) {
            sender.send_modify(|tick| *tick = tick.wrapping_add(1));
            if sender.receiver_count() == 0 {
                collections.remove(&path.collection);
            }
        }
    }

    // current must be read under the same lock writers publish under; it
    // seeds the channel on first subscription.
    pub(crate) fn subscribe_doc(
        &self,
        path: &DocPath,
        current: Option<Value>,
    ) -> watch::Receiver<Option<Value>> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.entry(path.clone())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    pub(crate) fn subscribe_collection(&self, collection: &str) -> watch::Receiver<u64> {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }
}

// Emits the current value first, then one snapshot per change.
pub(crate) fn spawn_doc_forwarder(mut src: watch::Receiver<Option<Value>>) -> DocumentWatch {
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    tokio::spawn(async move {
        loop {
            let snapshot = src.borrow_and_update().clone();
            if tx.send(snapshot).await.is_err() {
                break;
            }
            if src.changed().await.is_err() {
                break;
            }
        }
    });
    DocumentWatch::new(rx)
}

// Ticks coalesce while the consumer lags, so a burst of writes costs one
// re-evaluation and the latest state always arrives.
pub(crate) fn spawn_query_forwarder<F, Fut>(
    mut ticks: watch::Receiver<u64>,
    initial: Vec<Document>,
    run: F,
) -> QueryWatch
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<Document>, AppError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    tokio::spawn(async move {
        if tx.send(initial).await.is_err() {
            return;
        }
        loop {
            if ticks.changed().await.is_err() {
                break;
            }
            let results = match run().await {
                Ok(results) => results,
                Err(err) => {
                    warn!("Query watch refresh failed, closing subscription: {err}");
                    break;
                }
            };
            if tx.send(results).await.is_err() {
                break;
            }
        }
    });
    QueryWatch::new(rx)
}
