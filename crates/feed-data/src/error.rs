//! 데이터 모듈 오류 타입.

use thiserror::Error;

use crate::fetch::FetchError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 외부 소스 요청 실패
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// 업스트림 문서 파싱 오류 (RSS/HTML 형식 변경 등)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 업스트림이 빈 데이터를 반환
    #[error("No data: {0}")]
    NoData(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
