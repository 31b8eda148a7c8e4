use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ports::{
    DocPath, Document, DocumentStore, DocumentWatch, FieldFilter, QueryWatch, TxApply, TxNext,
};
use crate::error::AppError;
use crate::infra::stores::change_bus::{spawn_doc_forwarder, spawn_query_forwarder, ChangeBus};

// Collections are ordered maps so query results come back in a stable id
// order, matching the SQLite backend.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    data: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    bus: ChangeBus,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                data: Mutex::new(HashMap::new()),
                bus: ChangeBus::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn read(&self, path: &DocPath) -> Option<Value> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .cloned()
    }

    fn run_query(&self, collection: &str, filters: &[FieldFilter]) -> Vec<Document> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let Some(docs) = data.get(collection) else {
            return Vec::new();
        };
        docs.iter()
            .filter(|(_, value)| matches_filters(value, filters))
            .map(|(id, value)| Document {
                id: id.clone(),
                data: value.clone(),
            })
            .collect()
    }
}

fn matches_filters(value: &Value, filters: &[FieldFilter]) -> bool {
    filters
        .iter()
        .all(|filter| value.get(&filter.field) == Some(&filter.value))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, AppError> {
        Ok(self.inner.read(path))
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), AppError> {
        let mut data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
        data.entry(path.collection.clone())
            .or_default()
            .insert(path.id.clone(), value.clone());
        self.inner.bus.publish(path, Some(value));
        Ok(())
    }

    async fn update(
        &self,
        path: &DocPath,
        fields: serde_json::Map<String, Value>,
    ) -> Result<(), AppError> {
        let mut data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
        let current = data
            .get_mut(&path.collection)
            .and_then(|docs| docs.get_mut(&path.id))
            .ok_or_else(|| AppError::NotFound(format!("document {path}")))?;
        let object = current
            .as_object_mut()
            .ok_or_else(|| AppError::Store(format!("document {path} is not an object")))?;
        for (key, value) in fields {
            object.insert(key, value);
        }
        let snapshot = current.clone();
        self.inner.bus.publish(path, Some(snapshot));
        Ok(())
    }

    async fn transaction(
        &self,
        path: &DocPath,
        mut apply: TxApply,
    ) -> Result<Option<Value>, AppError> {
        // The data lock is held across the whole read-apply-write sequence;
        // `apply` is synchronous, so nothing can interleave.
        let mut data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
        let current = data
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .cloned();
        match apply(current)? {
            TxNext::Write(next) => {
                data.entry(path.collection.clone())
                    .or_default()
                    .insert(path.id.clone(), next.clone());
                self.inner.bus.publish(path, Some(next.clone()));
                Ok(Some(next))
            }
            TxNext::Unchanged => Ok(None),
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, AppError> {
        Ok(self.inner.run_query(collection, filters))
    }

    async fn watch(&self, path: &DocPath) -> Result<DocumentWatch, AppError> {
        let rx = {
            let data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
            let current = data
                .get(&path.collection)
                .and_then(|docs| docs.get(&path.id))
                .cloned();
            self.inner.bus.subscribe_doc(path, current)
        };
        Ok(spawn_doc_forwarder(rx))
    }

    async fn watch_query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<QueryWatch, AppError> {
        let ticks = self.inner.bus.subscribe_collection(collection);
        let initial = self.inner.run_query(collection, filters);

        let inner = self.inner.clone();
        let collection = collection.to_string();
        let filters = filters.to_vec();
        Ok(spawn_query_forwarder(ticks, initial, move || {
            let inner = inner.clone();
            let collection = collection.clone();
            let filters = filters.clone();
            async move { Ok(inner.run_query(&collection, &filters)) }
        }))
    }
}
