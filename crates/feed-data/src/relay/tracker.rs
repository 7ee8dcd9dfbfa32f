//! 릴레이 상태 추적기.
//!
//! # 상태
//!
//! ```text
//! Untested ──[probe 성공 / 요청 성공]──> Working
//!    │                                    │  ↑
//!    └──[probe 실패]──> Failed <──[릴레이 장애 / 429]──┘  │
//!                         └──────[probe 성공]────────────┘
//! ```
//!
//! `working`과 `failed`는 항상 서로소입니다. 동시에 실행되는 요청들이 상태를 갱신하므로
//! 갱신은 권고(advisory) 성격이며, 경합으로 갱신이 유실되면 다음 선택에서 다시 probe합니다.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::endpoint::RelayEndpoint;

/// 릴레이 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Untested,
    Working,
    Failed,
}

/// 릴레이 생존 확인.
#[async_trait]
pub trait RelayProbe: Send + Sync {
    /// 릴레이가 업스트림 ping 경로를 정상 중계하면 true.
    async fn probe(&self, relay: &RelayEndpoint) -> bool;
}

/// 업스트림 ping 경로를 릴레이로 요청하는 HTTP probe.
pub struct HttpRelayProbe {
    client: reqwest::Client,
    ping_url: String,
    timeout: Duration,
}

impl HttpRelayProbe {
    pub fn new(client: reqwest::Client, ping_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            ping_url: ping_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RelayProbe for HttpRelayProbe {
    async fn probe(&self, relay: &RelayEndpoint) -> bool {
        let url = relay.wrap(&self.ping_url);
        match tokio::time::timeout(self.timeout, self.client.get(&url).send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                debug!(relay = %relay, error = %e, "릴레이 probe 요청 실패");
                false
            }
            Err(_) => {
                debug!(relay = %relay, timeout_ms = self.timeout.as_millis() as u64, "릴레이 probe 타임아웃");
                false
            }
        }
    }
}

#[derive(Debug, Default)]
struct RelaySets {
    working: HashSet<RelayEndpoint>,
    failed: HashSet<RelayEndpoint>,
}

/// 릴레이 상태 요약 (로깅용).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayHealthSnapshot {
    pub working: Vec<String>,
    pub failed: Vec<String>,
    pub untested: usize,
    pub probes: u64,
}

/// 릴레이 풀 상태 추적기.
pub struct RelayHealthTracker {
    pool: Vec<RelayEndpoint>,
    sets: RwLock<RelaySets>,
    prober: Box<dyn RelayProbe>,
    /// 선택된 릴레이가 실패 상태이고 대체 working 릴레이가 없을 때 probe할 최대 수
    max_probes: usize,
    /// 미검증 릴레이 probe 실패 후 탐색할 대체 릴레이 수
    max_alternates: usize,
    total_probes: AtomicU64,
}

impl RelayHealthTracker {
    pub fn new(
        pool: Vec<RelayEndpoint>,
        prober: Box<dyn RelayProbe>,
        max_probes: usize,
        max_alternates: usize,
    ) -> Self {
        info!(pool_size = pool.len(), "릴레이 풀 초기화");
        Self {
            pool,
            sets: RwLock::new(RelaySets::default()),
            prober,
            max_probes,
            max_alternates,
            total_probes: AtomicU64::new(0),
        }
    }

    /// 설정값으로 생성.
    pub fn from_config(config: &feed_core::RelayConfig, prober: Box<dyn RelayProbe>) -> Self {
        let pool = config.pool().into_iter().map(RelayEndpoint::new).collect();
        Self::new(pool, prober, config.max_probes, config.max_alternates)
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    pub fn status(&self, relay: &RelayEndpoint) -> RelayStatus {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        if sets.working.contains(relay) {
            RelayStatus::Working
        } else if sets.failed.contains(relay) {
            RelayStatus::Failed
        } else {
            RelayStatus::Untested
        }
    }

    /// 릴레이를 working으로 승격합니다.
    pub fn mark_working(&self, relay: &RelayEndpoint) {
        let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        sets.failed.remove(relay);
        if sets.working.insert(relay.clone()) {
            debug!(relay = %relay, "릴레이 working 승격");
        }
    }

    /// 릴레이를 failed로 강등합니다.
    pub fn mark_failed(&self, relay: &RelayEndpoint) {
        let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        sets.working.remove(relay);
        if sets.failed.insert(relay.clone()) {
            warn!(relay = %relay, "릴레이 failed 강등");
        }
    }

    pub fn snapshot(&self) -> RelayHealthSnapshot {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        let untested = self
            .pool
            .iter()
            .filter(|r| !sets.working.contains(*r) && !sets.failed.contains(*r))
            .count();
        let mut working: Vec<String> = sets.working.iter().map(|r| r.to_string()).collect();
        let mut failed: Vec<String> = sets.failed.iter().map(|r| r.to_string()).collect();
        working.sort();
        failed.sort();
        RelayHealthSnapshot {
            untested,
            working,
            failed,
            probes: self.total_probes.load(Ordering::Relaxed),
        }
    }

    /// 배치 인덱스에 해당하는 릴레이를 선택합니다.
    ///
    /// 사용할 수 있는 릴레이가 없으면 `None`을 반환하며, 호출자는 직접 요청합니다.
    pub async fn select(&self, batch_index: usize, batch_count: usize) -> Option<RelayEndpoint> {
        if self.pool.is_empty() {
            return None;
        }

        let index = batch_index % self.pool.len();
        let candidate = self.pool[index].clone();

        let selected = match self.status(&candidate) {
            RelayStatus::Working => Some(candidate),
            RelayStatus::Failed => {
                let alternatives = self.working_relays();
                if !alternatives.is_empty() {
                    Some(alternatives[batch_index % alternatives.len()].clone())
                } else {
                    let unconfirmed = self.unconfirmed_relays(index, None);
                    self.probe_first_alive(unconfirmed, self.max_probes).await
                }
            }
            RelayStatus::Untested => {
                if self.probe_and_record(&candidate).await {
                    Some(candidate)
                } else {
                    let alternatives = self.working_relays();
                    if !alternatives.is_empty() {
                        Some(alternatives[batch_index % alternatives.len()].clone())
                    } else {
                        let untested: Vec<RelayEndpoint> = self
                            .unconfirmed_relays(index, Some(&candidate))
                            .into_iter()
                            .filter(|r| self.status(r) == RelayStatus::Untested)
                            .collect();
                        self.probe_first_alive(untested, self.max_alternates).await
                    }
                }
            }
        };

        match &selected {
            Some(relay) => debug!(batch_index, batch_count, relay = %relay, "릴레이 선택"),
            None => warn!(batch_index, batch_count, "사용 가능한 릴레이 없음, 직접 요청"),
        }
        selected
    }

    /// working 집합 (풀 순서 유지).
    fn working_relays(&self) -> Vec<RelayEndpoint> {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        self.pool
            .iter()
            .filter(|r| sets.working.contains(*r) && !sets.failed.contains(*r))
            .cloned()
            .collect()
    }

    /// `start` 다음부터 순환하며 미검증 → 실패 순으로 정렬된 확인 대상 목록.
    fn unconfirmed_relays(
        &self,
        start: usize,
        exclude: Option<&RelayEndpoint>,
    ) -> Vec<RelayEndpoint> {
        let len = self.pool.len();
        let rotated = (1..=len).map(|offset| &self.pool[(start + offset) % len]);

        let (mut untested, mut failed): (Vec<_>, Vec<_>) = rotated
            .filter(|r| Some(*r) != exclude)
            .filter(|r| self.status(r) != RelayStatus::Working)
            .cloned()
            .partition(|r| self.status(r) == RelayStatus::Untested);

        untested.append(&mut failed);
        untested
    }

    async fn probe_first_alive(
        &self,
        candidates: Vec<RelayEndpoint>,
        limit: usize,
    ) -> Option<RelayEndpoint> {
        for relay in candidates.into_iter().take(limit) {
            if self.probe_and_record(&relay).await {
                return Some(relay);
            }
        }
        None
    }

    async fn probe_and_record(&self, relay: &RelayEndpoint) -> bool {
        self.total_probes.fetch_add(1, Ordering::Relaxed);
        let alive = self.prober.probe(relay).await;
        if alive {
            self.mark_working(relay);
        } else {
            self.mark_failed(relay);
        }
        alive
    }
}
