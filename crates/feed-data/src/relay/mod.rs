//! 릴레이(프록시) 엔드포인트 풀과 상태 추적.
//!
//! 업스트림의 소스별 요청 한도를 피하기 위해 요청을 릴레이 엔드포인트로 우회시킵니다.
//! 상태는 프로세스 메모리에만 존재하며 재시작 시 초기화됩니다.

pub mod endpoint;
pub mod tracker;

pub use endpoint::RelayEndpoint;
pub use tracker::{HttpRelayProbe, RelayHealthSnapshot, RelayHealthTracker, RelayProbe, RelayStatus};
