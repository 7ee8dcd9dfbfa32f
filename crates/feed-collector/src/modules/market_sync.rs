//! 시장 부가 지표 동기화: 도미넌스, 공포/탐욕 지수, 뉴스, 트렌딩.
//!
//! 조회에 실패하거나 결과가 비어 있으면 기존 문서를 그대로 둡니다.

use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

use feed_core::Dataset;
use feed_data::storage::save_typed;
use feed_data::DataError;

use crate::context::CollectorContext;
use crate::{Result, UpdateSummary};

async fn persist<T: Serialize + Sync>(
    ctx: &CollectorContext,
    dataset: Dataset,
    value: &T,
    count: usize,
    start: Instant,
) -> Result<UpdateSummary> {
    save_typed(ctx.documents.as_ref(), dataset, value, Utc::now()).await?;
    Ok(UpdateSummary::succeeded(dataset, count, start.elapsed()))
}

/// 시가총액 점유율
pub async fn sync_dominance(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();
    let dominance = ctx.gecko.fetch_dominance().await?;
    let count = dominance.percentages.len();
    persist(ctx, Dataset::MarketDominance, &dominance, count, start).await
}

/// 공포/탐욕 지수
pub async fn sync_fear_greed(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();
    let index = ctx.sentiment.fetch_fear_greed().await?;
    tracing::info!(value = index.value, classification = %index.classification, "공포/탐욕 지수");
    persist(ctx, Dataset::FearGreed, &index, 1, start).await
}

/// 뉴스 헤드라인
pub async fn sync_news(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();
    let items = ctx
        .sentiment
        .fetch_news(ctx.config.sources.news_limit)
        .await?;
    if items.is_empty() {
        return Err(DataError::NoData("뉴스 피드에 항목 없음".to_string()).into());
    }
    persist(ctx, Dataset::CryptoNews, &items, items.len(), start).await
}

/// 트렌딩 코인
pub async fn sync_trending(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();
    let coins = ctx.gecko.fetch_trending().await?;
    if coins.is_empty() {
        return Err(DataError::NoData("트렌딩 목록 비어 있음".to_string()).into());
    }
    persist(ctx, Dataset::TrendingCoins, &coins, coins.len(), start).await
}
