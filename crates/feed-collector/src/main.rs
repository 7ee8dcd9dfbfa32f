//! Market feed collector CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use feed_collector::{modules, scheduler, CollectorContext};
use feed_core::{init_logging, FeedConfig, LogConfig, DEFAULT_CONFIG_PATH};
use feed_data::storage::Database;
use feed_data::{
    DocumentStore, MemoryDocumentStore, MemorySnapshotStore, PgDocumentStore, PgSnapshotStore,
    SnapshotStore,
};

#[derive(Parser)]
#[command(name = "feed-collector")]
#[command(about = "Market Feed Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 설정 파일 경로
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// DB 대신 메모리 저장소 사용 (결과는 저장되지 않음)
    #[arg(long)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 코인 리스팅 수집 (상위 500, 스테이블코인 제외)
    UpdateList,

    /// 공급량 스냅샷 기록 및 변화량 계산
    UpdateSupply,

    /// 연준 목표금리 동기화
    UpdateFedRate,

    /// USD 기준 환율 동기화
    UpdateCurrency,

    /// 시가총액 점유율 동기화
    UpdateDominance,

    /// 공포/탐욕 지수 동기화
    UpdateSentiment,

    /// 뉴스 헤드라인 동기화
    UpdateNews,

    /// 트렌딩 코인 동기화
    UpdateTrending,

    /// 5분 주기 작업 1회 실행 (리스팅/도미넌스/환율/금리 → 공급량)
    RunCore,

    /// 데몬 모드: 주기별 스케줄러 실행
    Daemon,
}

type Stores = (Arc<dyn DocumentStore>, Arc<dyn SnapshotStore>);

async fn open_stores(config: &FeedConfig, memory: bool) -> anyhow::Result<(Stores, Option<Database>)> {
    if memory {
        tracing::warn!("메모리 저장소 사용: 결과가 영속화되지 않습니다");
        let stores: Stores = (
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemorySnapshotStore::new()),
        );
        return Ok((stores, None));
    }

    let url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL 또는 database.url 설정이 필요합니다"))?;

    let db = Database::connect(url, config.database.max_connections).await?;
    db.ensure_schema().await?;
    tracing::info!("데이터베이스 연결 성공");

    let stores: Stores = (
        Arc::new(PgDocumentStore::new(db.pool().clone())),
        Arc::new(PgSnapshotStore::new(db.pool().clone())),
    );
    Ok((stores, Some(db)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = &cli.log_level;
    init_logging(LogConfig::from_env(&format!(
        "feed_collector={level},feed_data={level},feed_core={level}"
    )))
    .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Market Feed Collector 시작");

    let config = FeedConfig::load(&cli.config)?;
    tracing::debug!(
        config = %cli.config.display(),
        relays = config.relay.pool().len(),
        "설정 로드 완료"
    );

    let ((documents, snapshots), database) = open_stores(&config, cli.memory).await?;
    let ctx = Arc::new(CollectorContext::new(config, documents, snapshots)?);

    match cli.command {
        Commands::UpdateList => modules::sync_listing(&ctx).await?.log_summary(),
        Commands::UpdateSupply => modules::track_supply(&ctx).await?.log_summary(),
        Commands::UpdateFedRate => modules::sync_fed_rate(&ctx).await?.log_summary(),
        Commands::UpdateCurrency => modules::sync_currency(&ctx).await?.log_summary(),
        Commands::UpdateDominance => modules::sync_dominance(&ctx).await?.log_summary(),
        Commands::UpdateSentiment => modules::sync_fear_greed(&ctx).await?.log_summary(),
        Commands::UpdateNews => modules::sync_news(&ctx).await?.log_summary(),
        Commands::UpdateTrending => modules::sync_trending(&ctx).await?.log_summary(),
        Commands::RunCore => {
            tracing::info!("=== 5분 주기 작업 시작 ===");
            let summaries = scheduler::run_core_tick(&ctx).await;
            for summary in &summaries {
                summary.log_summary();
            }

            let failed = summaries.iter().filter(|s| !s.success).count();
            tracing::info!(total = summaries.len(), failed, "=== 5분 주기 작업 완료 ===");
            if failed > 0 {
                anyhow::bail!("{}개 업데이트 실패", failed);
            }
        }
        Commands::Daemon => {
            tracing::info!("=== 데몬 모드 시작 ===");

            let cancel = CancellationToken::new();
            let daemon = tokio::spawn(scheduler::run_daemon(ctx.clone(), cancel.clone()));

            tokio::signal::ctrl_c().await?;
            tracing::info!("종료 신호 수신, 데몬 종료 중...");
            cancel.cancel();
            daemon.await?;

            let relays = ctx.fetcher.tracker().snapshot();
            tracing::info!(
                working = relays.working.len(),
                failed = ?relays.failed,
                untested = relays.untested,
                probes = relays.probes,
                "릴레이 상태"
            );
        }
    }

    if let Some(db) = database {
        db.pool().close().await;
    }
    tracing::info!("Market Feed Collector 종료");

    Ok(())
}
