//! 데이터셋 문서 저장소.
//!
//! 데이터셋 이름을 키로 하는 upsert이므로 같은 업데이트를 반복해도 결과가 같습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use feed_core::{Dataset, DatasetDocument};

use crate::error::Result;

/// 데이터셋 문서 저장소.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, dataset: Dataset) -> Result<Option<DatasetDocument>>;

    async fn save(
        &self,
        dataset: Dataset,
        data: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// 문서를 타입으로 읽습니다.
pub async fn load_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    dataset: Dataset,
) -> Result<Option<T>> {
    match store.load(dataset).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// 값을 직렬화해 저장합니다.
pub async fn save_typed<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    dataset: Dataset,
    value: &T,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    store
        .save(dataset, serde_json::to_value(value)?, updated_at)
        .await
}

#[derive(Debug, FromRow)]
struct DocumentRecord {
    name: String,
    data: Json<serde_json::Value>,
    last_update: DateTime<Utc>,
}

/// PostgreSQL `dataset_documents` 저장소.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn load(&self, dataset: Dataset) -> Result<Option<DatasetDocument>> {
        let record: Option<DocumentRecord> = sqlx::query_as(
            r#"
            SELECT name, data, last_update
            FROM dataset_documents
            WHERE name = $1
            "#,
        )
        .bind(dataset.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|r| DatasetDocument {
            name: r.name,
            data: r.data.0,
            last_update: r.last_update,
        }))
    }

    #[instrument(skip(self, data), fields(dataset = %dataset))]
    async fn save(
        &self,
        dataset: Dataset,
        data: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dataset_documents (name, data, last_update)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                data = EXCLUDED.data,
                last_update = EXCLUDED.last_update
            "#,
        )
        .bind(dataset.as_str())
        .bind(Json(&data))
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        debug!("데이터셋 문서 저장");
        Ok(())
    }
}

/// 메모리 문서 저장소.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Dataset, DatasetDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, dataset: Dataset) -> Result<Option<DatasetDocument>> {
        Ok(self.documents.read().await.get(&dataset).cloned())
    }

    async fn save(
        &self,
        dataset: Dataset,
        data: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.documents.write().await.insert(
            dataset,
            DatasetDocument {
                name: dataset.as_str().to_string(),
                data,
                last_update: updated_at,
            },
        );
        Ok(())
    }
}
