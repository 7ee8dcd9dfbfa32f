//! 저장소.
//!
//! - `document`: 데이터셋 문서 (`dataset_documents`)
//! - `snapshot`: 공급량 스냅샷 (`supply_snapshots`)
//!
//! 각 저장소는 PostgreSQL 구현과 메모리 구현을 같은 trait 뒤에 둡니다.
//! 메모리 구현은 테스트와 DB 없이 실행하는 dry run에 사용합니다.

pub mod document;
pub mod snapshot;

pub use document::{load_typed, save_typed, DocumentStore, MemoryDocumentStore, PgDocumentStore};
pub use snapshot::{MemorySnapshotStore, PgSnapshotStore, SnapshotStore};

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::{DataError, Result};

/// 스키마 정의. 여러 번 실행해도 안전합니다.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS dataset_documents (
        name        TEXT PRIMARY KEY,
        data        JSONB NOT NULL,
        last_update TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS supply_snapshots (
        bucket_key  TEXT PRIMARY KEY,
        timestamp   TIMESTAMPTZ NOT NULL,
        supplies    JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_supply_snapshots_timestamp ON supply_snapshots (timestamp)",
];

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 연결 풀을 생성합니다.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!(max_connections, "데이터베이스 연결 중...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| DataError::QueryError(format!("연결 실패: {}", e)))?;

        info!("데이터베이스 연결 완료");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("스키마 확인 완료");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
