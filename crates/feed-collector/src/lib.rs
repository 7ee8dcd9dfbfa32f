//! 마켓 피드 수집기.
//!
//! 데이터셋별 업데이트 작업과 주기별 스케줄러를 제공합니다.
//!
//! ## 실행 흐름
//! - 5분: 리스팅 / 도미넌스 / 환율 / 연준 금리 (동시 실행) → 공급량 추적
//! - 10분: 공포/탐욕 지수
//! - 10분: 뉴스
//! - 30분: 트렌딩

pub mod context;
pub mod error;
pub mod modules;
pub mod scheduler;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::CollectorContext;
pub use error::{CollectorError, Result};
pub use stats::UpdateSummary;
