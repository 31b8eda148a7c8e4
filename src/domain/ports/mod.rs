use crate::domain::models::user::AuthUser;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

// Field equality is the only predicate the stores support.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: &str, value: Value) -> Self {
        Self {
            field: field.to_string(),
            value,
        }
    }
}

pub enum TxNext {
    Write(Value),
    Unchanged,
}

pub type TxApply = Box<dyn FnMut(Option<Value>) -> Result<TxNext, AppError> + Send>;

pub struct DocumentWatch {
    rx: mpsc::Receiver<Option<Value>>,
}

impl DocumentWatch {
    pub(crate) fn new(rx: mpsc::Receiver<Option<Value>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }

    pub fn cancel(self) {}
}

pub struct QueryWatch {
    rx: mpsc::Receiver<Vec<Document>>,
}

impl QueryWatch {
    pub(crate) fn new(rx: mpsc::Receiver<Vec<Document>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }

    pub fn cancel(self) {}
}

pub struct SessionWatch {
    rx: mpsc::Receiver<Option<AuthUser>>,
}

impl SessionWatch {
    pub(crate) fn new(rx: mpsc::Receiver<Option<AuthUser>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Option<AuthUser>> {
        self.rx.recv().await
    }

    pub fn cancel(self) {}
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, AppError>;
    // Full overwrite; creates the document when absent.
    async fn set(&self, path: &DocPath, value: Value) -> Result<(), AppError>;
    // Top-level merge into an existing document.
    async fn update(
        &self,
        path: &DocPath,
        fields: serde_json::Map<String, Value>,
    ) -> Result<(), AppError>;
    // Atomic read-modify-write. Ok(Some) is the committed value, Ok(None)
    // means apply chose Unchanged; an apply error aborts the transaction.
    async fn transaction(&self, path: &DocPath, apply: TxApply)
        -> Result<Option<Value>, AppError>;
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, AppError>;
    // Snapshot now, then one emission per change to the document.
    async fn watch(&self, path: &DocPath) -> Result<DocumentWatch, AppError>;
    // Result-set snapshot now, then re-evaluated after every collection
    // write. Emissions coalesce under lag; the latest state always arrives.
    async fn watch_query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<QueryWatch, AppError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;
    fn session_changes(&self) -> SessionWatch;
}
