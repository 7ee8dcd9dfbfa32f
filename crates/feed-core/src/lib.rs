//! # Feed Core
//!
//! 마켓 피드 수집기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집기 전반에서 사용되는 기본 타입을 제공합니다:
//! - 코인 리스팅 레코드
//! - 공급량 스냅샷 및 기간별 변화량
//! - 연준 금리 / 환율 / 시장 지표 데이터
//! - 데이터셋 문서 식별자
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
