//! 공급량 스냅샷 저장소.
//!
//! 버킷 키가 기본 키이며, 같은 버킷에 대한 두 번째 쓰기는 무시됩니다 (먼저 쓴 값 유지).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use feed_core::SupplySnapshot;

use crate::error::Result;

/// 공급량 스냅샷 저장소.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 스냅샷을 기록합니다. 새로 기록되면 true, 버킷이 이미 있으면 false.
    async fn upsert(&self, snapshot: &SupplySnapshot) -> Result<bool>;

    async fn get(&self, bucket_key: &str) -> Result<Option<SupplySnapshot>>;

    /// 최근 `limit`개 스냅샷 (타임스탬프 오름차순).
    async fn latest(&self, limit: i64) -> Result<Vec<SupplySnapshot>>;

    /// `cutoff`보다 오래된 스냅샷을 삭제하고 삭제 수를 반환합니다.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn count(&self) -> Result<i64>;
}

#[derive(Debug, FromRow)]
struct SnapshotRecord {
    bucket_key: String,
    timestamp: DateTime<Utc>,
    supplies: Json<BTreeMap<String, f64>>,
}

impl From<SnapshotRecord> for SupplySnapshot {
    fn from(record: SnapshotRecord) -> Self {
        SupplySnapshot {
            bucket_key: record.bucket_key,
            timestamp: record.timestamp,
            supplies: record.supplies.0,
        }
    }
}

/// PostgreSQL `supply_snapshots` 저장소.
#[derive(Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    #[instrument(skip(self, snapshot), fields(bucket = %snapshot.bucket_key, coins = snapshot.supplies.len()))]
    async fn upsert(&self, snapshot: &SupplySnapshot) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO supply_snapshots (bucket_key, timestamp, supplies)
            VALUES ($1, $2, $3)
            ON CONFLICT (bucket_key) DO NOTHING
            "#,
        )
        .bind(&snapshot.bucket_key)
        .bind(snapshot.timestamp)
        .bind(Json(&snapshot.supplies))
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(inserted, "스냅샷 기록");
        Ok(inserted)
    }

    async fn get(&self, bucket_key: &str) -> Result<Option<SupplySnapshot>> {
        let record: Option<SnapshotRecord> = sqlx::query_as(
            r#"
            SELECT bucket_key, timestamp, supplies
            FROM supply_snapshots
            WHERE bucket_key = $1
            "#,
        )
        .bind(bucket_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(SupplySnapshot::from))
    }

    async fn latest(&self, limit: i64) -> Result<Vec<SupplySnapshot>> {
        let records: Vec<SnapshotRecord> = sqlx::query_as(
            r#"
            SELECT bucket_key, timestamp, supplies
            FROM (
                SELECT bucket_key, timestamp, supplies
                FROM supply_snapshots
                ORDER BY timestamp DESC
                LIMIT $1
            ) recent
            ORDER BY timestamp ASC
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(SupplySnapshot::from).collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM supply_snapshots WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "오래된 스냅샷 삭제");
        }
        Ok(purged)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM supply_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// 메모리 스냅샷 저장소.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, SupplySnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: &SupplySnapshot) -> Result<bool> {
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&snapshot.bucket_key) {
            return Ok(false);
        }
        snapshots.insert(snapshot.bucket_key.clone(), snapshot.clone());
        Ok(true)
    }

    async fn get(&self, bucket_key: &str) -> Result<Option<SupplySnapshot>> {
        Ok(self.snapshots.read().await.get(bucket_key).cloned())
    }

    async fn latest(&self, limit: i64) -> Result<Vec<SupplySnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut all: Vec<SupplySnapshot> = snapshots.values().cloned().collect();
        all.sort_by_key(|s| s.timestamp);

        let keep = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let skip = all.len().saturating_sub(keep);
        Ok(all.split_off(skip))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|_, s| s.timestamp >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.snapshots.read().await.len() as i64)
    }
}
