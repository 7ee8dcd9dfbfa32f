//! 외부 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 릴레이(프록시) 상태 추적 및 순환 선택
//! - 타임아웃/레이트리밋/릴레이 장애를 처리하는 HTTP 요청 계층
//! - 업스트림 Provider (코인 리스팅, FRED, 연준 RSS/캘린더, 환율, 공포지수, 뉴스)
//! - 데이터셋 문서 및 공급량 스냅샷 저장소 (PostgreSQL / 메모리)
//! - 스냅샷 기반 기간별 공급량 변화량 계산

pub mod error;
pub mod fetch;
pub mod provider;
pub mod relay;
pub mod resolver;
pub mod storage;
pub mod supply;

pub use error::{DataError, Result};
pub use fetch::{FetchError, FetchResponse, RequestOptions, ResilientFetcher};
pub use relay::{HttpRelayProbe, RelayEndpoint, RelayHealthTracker, RelayProbe, RelayStatus};
pub use resolver::resolve_first;
pub use storage::{
    DocumentStore, MemoryDocumentStore, MemorySnapshotStore, PgDocumentStore, PgSnapshotStore,
    SnapshotStore,
};
pub use supply::compute_supply_deltas;
