//! 에러 타입 정의.

use thiserror::Error;

use feed_core::FeedError;
use feed_data::{DataError, FetchError};

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(#[from] FeedError),

    /// 저장소/파싱 에러
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// 요청 에러
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// 사이클 전체 수집 실패 (기존 데이터 유지)
    #[error("Acquisition failed: {0}")]
    Acquisition(String),
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(DataError::from(err))
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
