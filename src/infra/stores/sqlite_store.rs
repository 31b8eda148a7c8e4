use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteArguments;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::domain::ports::{
    DocPath, Document, DocumentStore, DocumentWatch, FieldFilter, QueryWatch, TxApply, TxNext,
};
use crate::error::AppError;
use crate::infra::stores::change_bus::{spawn_doc_forwarder, spawn_query_forwarder, ChangeBus};

type DocRowQuery<'q> = sqlx::query::QueryAs<'q, sqlx::Sqlite, (String, String), SqliteArguments<'q>>;

// A process-wide write lock serializes writers and keeps change
// notifications in commit order; readers run concurrently under WAL.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            bus: Arc::new(ChangeBus::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read(&self, path: &DocPath) -> Result<Option<Value>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(&path.collection)
                .bind(&path.id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, path: &DocPath, value: &Value) -> Result<(), AppError> {
        let body = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(&path.collection)
        .bind(&path.id)
        .bind(&body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn run_query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, AppError> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        for _ in filters {
            sql.push_str(" AND json_extract(body, ?) = ?");
        }
        sql.push_str(" ORDER BY id");

        let mut query: DocRowQuery<'_> = sqlx::query_as(&sql).bind(collection.to_string());
        for filter in filters {
            query = query.bind(format!("$.{}", filter.field));
            query = bind_filter_value(query, &filter.value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id, body)| {
                Ok(Document {
                    id,
                    data: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }
}

// json_extract yields SQL text for JSON strings and integers for JSON
// booleans, so the bound comparison value has to follow suit.
fn bind_filter_value<'q>(query: DocRowQuery<'q>, value: &Value) -> DocRowQuery<'q> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        Value::Bool(b) => query.bind(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, AppError> {
        self.read(path).await
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write(path, &value).await?;
        self.bus.publish(path, Some(value));
        Ok(())
    }

    async fn update(
        &self,
        path: &DocPath,
        fields: serde_json::Map<String, Value>,
    ) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read(path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {path}")))?;

        let mut next = current;
        let object = next
            .as_object_mut()
            .ok_or_else(|| AppError::Store(format!("document {path} is not an object")))?;
        for (key, value) in fields {
            object.insert(key, value);
        }

        self.write(path, &next).await?;
        self.bus.publish(path, Some(next));
        Ok(())
    }

    async fn transaction(
        &self,
        path: &DocPath,
        mut apply: TxApply,
    ) -> Result<Option<Value>, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(&path.collection)
                .bind(&path.id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = match row {
            Some((body,)) => Some(serde_json::from_str(&body)?),
            None => None,
        };

        // An error or an unchanged outcome drops the transaction, which
        // rolls it back.
        match apply(current)? {
            TxNext::Write(next) => {
                let body = serde_json::to_string(&next)?;
                sqlx::query(
                    "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                )
                .bind(&path.collection)
                .bind(&path.id)
                .bind(&body)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                self.bus.publish(path, Some(next.clone()));
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
        self.run_query(collection, filters).await
    }

    async fn watch(&self, path: &DocPath) -> Result<DocumentWatch, AppError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(path).await?;
        let rx = self.bus.subscribe_doc(path, current);
        Ok(spawn_doc_forwarder(rx))
    }

    async fn watch_query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<QueryWatch, AppError> {
        let ticks = self.bus.subscribe_collection(collection);
        let initial = self.run_query(collection, filters).await?;

        let store = self.clone();
        let collection = collection.to_string();
        let filters = filters.to_vec();
        Ok(spawn_query_forwarder(ticks, initial, move || {
            let store = store.clone();
            let collection = collection.clone();
            let filters = filters.clone();
            async move { store.run_query(&collection, &filters).await }
        }))
    }
}
