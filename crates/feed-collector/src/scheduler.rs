//! 주기별 스케줄러.
//!
//! 주기마다 독립된 스케줄러가 하나씩 있으며, 매 실행 후 다음 벽시계 배수 시각
//! (예: 5분 주기면 :00, :05, :10 ...)까지 대기합니다.
//! 이전 실행이 끝나지 않았으면 이번 실행은 건너뜁니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use feed_core::Dataset;

use crate::context::CollectorContext;
use crate::modules;
use crate::{Result, UpdateSummary};

/// `now` 이후 첫 `minutes`분 배수 시각까지 남은 시간.
pub fn delay_until_next_slot(now: DateTime<Utc>, minutes: u32) -> Duration {
    let period = i64::from(minutes.max(1)) * 60_000;
    let ms = now.timestamp_millis();
    let next = (ms.div_euclid(period) + 1) * period;
    Duration::from_millis((next - ms) as u64)
}

/// 동시에 하나의 실행만 허용하는 플래그.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

/// 실행 중 표시. drop되면 해제됩니다.
pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SingleFlight {
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                flag: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// 스케줄러가 실행하는 작업.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Vec<UpdateSummary>;
}

/// 실행 결과를 요약으로 변환합니다. 실패는 로그만 남깁니다.
pub fn settle(dataset: Dataset, result: Result<UpdateSummary>, started: Instant) -> UpdateSummary {
    match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(dataset = %dataset, error = %e, "업데이트 실패");
            UpdateSummary::failed(dataset, started.elapsed())
        }
    }
}

async fn timed<F>(dataset: Dataset, job: F) -> UpdateSummary
where
    F: Future<Output = Result<UpdateSummary>>,
{
    let started = Instant::now();
    settle(dataset, job.await, started)
}

/// 5분 주기 작업: 리스팅, 도미넌스, 환율, 연준 금리를 동시에 실행한 뒤 공급량 추적.
///
/// 공급량 추적은 리스팅 결과와 무관하게 실행됩니다 (실패 시 직전 리스팅 사용).
pub async fn run_core_tick(ctx: &CollectorContext) -> Vec<UpdateSummary> {
    let (listing, dominance, currency, fed_rate) = tokio::join!(
        timed(Dataset::CryptoList, modules::sync_listing(ctx)),
        timed(Dataset::MarketDominance, modules::sync_dominance(ctx)),
        timed(Dataset::CurrencyRates, modules::sync_currency(ctx)),
        timed(Dataset::FedRate, modules::sync_fed_rate(ctx)),
    );
    let supply = timed(Dataset::SupplyTracking, modules::track_supply(ctx)).await;

    vec![listing, dominance, currency, fed_rate, supply]
}

/// 주기별 작업 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Core,
    Sentiment,
    News,
    Trending,
}

/// 컨텍스트를 공유하는 수집 작업.
pub struct CollectorJob {
    kind: JobKind,
    ctx: Arc<CollectorContext>,
}

impl CollectorJob {
    pub fn new(kind: JobKind, ctx: Arc<CollectorContext>) -> Self {
        Self { kind, ctx }
    }
}

#[async_trait]
impl ScheduledJob for CollectorJob {
    fn name(&self) -> &'static str {
        match self.kind {
            JobKind::Core => "core",
            JobKind::Sentiment => "sentiment",
            JobKind::News => "news",
            JobKind::Trending => "trending",
        }
    }

    async fn run(&self) -> Vec<UpdateSummary> {
        let ctx = self.ctx.as_ref();
        match self.kind {
            JobKind::Core => run_core_tick(ctx).await,
            JobKind::Sentiment => {
                vec![timed(Dataset::FearGreed, modules::sync_fear_greed(ctx)).await]
            }
            JobKind::News => vec![timed(Dataset::CryptoNews, modules::sync_news(ctx)).await],
            JobKind::Trending => {
                vec![timed(Dataset::TrendingCoins, modules::sync_trending(ctx)).await]
            }
        }
    }
}

/// 한 번의 실행 결과.
#[derive(Debug)]
pub enum TickOutcome {
    Completed(Vec<UpdateSummary>),
    /// 이전 실행이 진행 중이어서 건너뜀
    Skipped,
}

/// 주기 하나를 담당하는 스케줄러.
pub struct CadenceScheduler {
    minutes: u32,
    flight: SingleFlight,
    job: Arc<dyn ScheduledJob>,
}

impl CadenceScheduler {
    pub fn new(minutes: u32, job: Arc<dyn ScheduledJob>) -> Self {
        Self {
            minutes,
            flight: SingleFlight::default(),
            job,
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// 작업을 한 번 실행합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    pub async fn fire(&self) -> TickOutcome {
        let Some(_guard) = self.flight.try_acquire() else {
            warn!(job = self.name(), "이전 실행이 진행 중, 이번 주기 건너뜀");
            return TickOutcome::Skipped;
        };

        let span = feed_core::job_span!(self.name(), format!("{}m", self.minutes));
        let summaries = self.job.run().instrument(span).await;
        for summary in &summaries {
            summary.log_summary();
        }
        TickOutcome::Completed(summaries)
    }

    fn fire_detached(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.fire().await;
        });
    }

    /// 취소될 때까지 벽시계 배수 시각마다 작업을 실행합니다.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken, run_on_start: bool) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(job = self.name(), minutes = self.minutes, run_on_start, "스케줄러 시작");
            if run_on_start {
                self.fire_detached();
            }

            loop {
                let delay = delay_until_next_slot(Utc::now(), self.minutes);
                debug!(job = self.name(), delay_secs = delay.as_secs(), "다음 실행 예약");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(job = self.name(), "스케줄러 종료");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => self.fire_detached(),
                }
            }
        })
    }
}

/// 설정에서 활성화된 스케줄러 목록.
pub fn build_schedulers(ctx: Arc<CollectorContext>) -> Vec<Arc<CadenceScheduler>> {
    let cfg = ctx.config.scheduler.clone();
    let plan = [
        (cfg.enable_core, JobKind::Core, cfg.core_minutes),
        (cfg.enable_sentiment, JobKind::Sentiment, cfg.sentiment_minutes),
        (cfg.enable_news, JobKind::News, cfg.news_minutes),
        (cfg.enable_trending, JobKind::Trending, cfg.trending_minutes),
    ];

    plan.into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, kind, minutes)| {
            let job: Arc<dyn ScheduledJob> = Arc::new(CollectorJob::new(kind, ctx.clone()));
            Arc::new(CadenceScheduler::new(minutes, job))
        })
        .collect()
}

/// 모든 스케줄러를 실행하고 취소될 때까지 대기합니다.
pub async fn run_daemon(ctx: Arc<CollectorContext>, cancel: CancellationToken) {
    let run_on_start = ctx.config.scheduler.run_on_start;
    let schedulers = build_schedulers(ctx);
    if schedulers.is_empty() {
        warn!("활성화된 스케줄러 없음");
        return;
    }

    let handles: Vec<JoinHandle<()>> = schedulers
        .into_iter()
        .map(|s| s.spawn(cancel.clone(), run_on_start))
        .collect();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "스케줄러 태스크 비정상 종료");
        }
    }
}
