//! 업데이트 결과 요약.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use feed_core::Dataset;

/// 업데이트 작업 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub dataset: Dataset,
    pub success: bool,
    /// 저장된 항목 수
    pub count: usize,
    /// 실패한 작업 단위 수 (페이지, 상세 조회 등)
    pub skipped: usize,
    /// 값의 출처 (live / cache / persisted 등)
    pub source: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl UpdateSummary {
    pub fn succeeded(dataset: Dataset, count: usize, elapsed: Duration) -> Self {
        Self {
            dataset,
            success: true,
            count,
            skipped: 0,
            source: None,
            elapsed,
        }
    }

    pub fn failed(dataset: Dataset, elapsed: Duration) -> Self {
        Self {
            dataset,
            success: false,
            count: 0,
            skipped: 0,
            source: None,
            elapsed,
        }
    }

    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 요약 로그 출력
    pub fn log_summary(&self) {
        let elapsed = format!("{:.1}s", self.elapsed.as_secs_f64());
        let source = self.source.as_deref().unwrap_or("-");
        if self.success {
            tracing::info!(
                dataset = %self.dataset,
                count = self.count,
                skipped = self.skipped,
                source,
                elapsed = %elapsed,
                "업데이트 완료"
            );
        } else {
            tracing::warn!(
                dataset = %self.dataset,
                skipped = self.skipped,
                elapsed = %elapsed,
                "업데이트 실패, 기존 데이터 유지"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let summary = UpdateSummary::succeeded(Dataset::CryptoList, 500, Duration::from_secs(3))
            .with_skipped(1)
            .with_source("live");
        assert!(summary.success);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.source.as_deref(), Some("live"));

        let failed = UpdateSummary::failed(Dataset::FedRate, Duration::ZERO);
        assert!(!failed.success);
        assert_eq!(failed.count, 0);
    }
}
