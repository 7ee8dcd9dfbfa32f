//! 테스트용 컨텍스트 구성.

use std::sync::Arc;
use std::time::Duration;

use feed_core::FeedConfig;
use feed_data::{
    DocumentStore, MemoryDocumentStore, MemorySnapshotStore, RelayEndpoint, RelayHealthTracker,
    RelayProbe, ResilientFetcher, SnapshotStore,
};

use crate::context::CollectorContext;

/// 항상 실패하는 probe.
pub struct NoProbe;

#[async_trait::async_trait]
impl RelayProbe for NoProbe {
    async fn probe(&self, _relay: &RelayEndpoint) -> bool {
        false
    }
}

/// 메모리 저장소 기반 컨텍스트. 릴레이 풀이 비어 있어 모든 요청이 직접 나갑니다.
pub fn memory_context(
    config: FeedConfig,
) -> (CollectorContext, Arc<MemoryDocumentStore>, Arc<MemorySnapshotStore>) {
    let tracker = Arc::new(RelayHealthTracker::new(Vec::new(), Box::new(NoProbe), 0, 0));
    let fetcher = Arc::new(ResilientFetcher::new(
        reqwest::Client::new(),
        tracker,
        Duration::ZERO,
    ));
    let documents = Arc::new(MemoryDocumentStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let ctx = CollectorContext::with_fetcher(
        config,
        fetcher,
        documents.clone() as Arc<dyn DocumentStore>,
        snapshots.clone() as Arc<dyn SnapshotStore>,
    );
    (ctx, documents, snapshots)
}
