//! 코인 리스팅 수집 파이프라인.
//!
//! ```text
//! FETCH_CORE_PAGES → DEDUP → FILTER_STABLECOINS → [BACKFILL_PAGES] → CAP
//!     → BACKFILL_SUPPLY → NORMALIZE_AND_RANK → 저장
//! ```
//!
//! 기본 페이지가 하나도 수집되지 않으면 사이클 전체가 실패하며 기존 리스팅은 그대로 둡니다.
//! 그 외의 부분 실패(페이지, 상세 조회)는 건너뛰고 진행합니다.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

use feed_core::{Dataset, ListingRecord};
use feed_data::provider::MarketCoin;
use feed_data::storage::{load_typed, save_typed};

use super::stablecoin::is_stablecoin;
use crate::context::CollectorContext;
use crate::error::CollectorError;
use crate::{Result, UpdateSummary};

/// 총 공급량 / 최대 공급량.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SupplyFields {
    pub total: Option<f64>,
    pub max: Option<f64>,
}

/// 페이지 수집 결과.
#[derive(Debug, Default)]
struct PageBatch {
    coins: Vec<MarketCoin>,
    failed_pages: usize,
}

/// 리스팅 동기화
pub async fn sync_listing(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();
    let cfg = &ctx.config.listing;

    info!(
        core_pages = cfg.core_pages,
        per_page = cfg.per_page,
        target = cfg.target_count,
        "리스팅 수집 시작"
    );

    let core = fetch_core_pages(ctx).await?;
    let mut skipped = core.failed_pages;

    let mut coins = filter_stablecoins(dedup_by_id(core.coins));
    info!(count = coins.len(), "기본 페이지 정리 완료");

    if coins.len() < cfg.target_count {
        skipped += backfill_pages(ctx, &mut coins).await;
    }
    coins.truncate(cfg.target_count);

    let prior = load_prior_supplies(ctx).await;
    let details = backfill_supply(ctx, &coins).await;
    let records = normalize_and_rank(coins, &details, &prior);

    save_typed(
        ctx.documents.as_ref(),
        Dataset::CryptoList,
        &records,
        Utc::now(),
    )
    .await?;

    Ok(
        UpdateSummary::succeeded(Dataset::CryptoList, records.len(), start.elapsed())
            .with_skipped(skipped),
    )
}

/// 기본 페이지를 순차 수집합니다. 한 페이지도 성공하지 못한 경우에만 전체를 재시도합니다.
async fn fetch_core_pages(ctx: &CollectorContext) -> Result<PageBatch> {
    let cfg = &ctx.config.listing;
    let pages = cfg.core_pages;

    for attempt in 0..=cfg.retry_attempts {
        if attempt > 0 {
            let delay = cfg.retry_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "모든 페이지 실패, 전체 재시도");
            tokio::time::sleep(delay).await;
        }

        let mut batch = PageBatch::default();
        let mut succeeded = 0usize;

        for page in 1..=pages {
            if page > 1 {
                tokio::time::sleep(cfg.inter_page_delay()).await;
            }

            match ctx
                .gecko
                .fetch_markets_page(page, (page - 1) as usize, pages as usize)
                .await
            {
                Ok(coins) => {
                    succeeded += 1;
                    batch.coins.extend(coins);
                }
                Err(e) => {
                    batch.failed_pages += 1;
                    warn!(page, error = %e, "리스팅 페이지 실패, 건너뜀");
                }
            }
        }

        if succeeded > 0 {
            return Ok(batch);
        }
    }

    Err(CollectorError::Acquisition(format!(
        "리스팅 기본 페이지 {}개 모두 실패 ({}회 시도)",
        pages,
        cfg.retry_attempts + 1
    )))
}

/// 목표 수에 못 미치면 다음 페이지를 하나씩 추가로 수집합니다.
///
/// 반환값은 실패한 페이지 수입니다.
async fn backfill_pages(ctx: &CollectorContext, coins: &mut Vec<MarketCoin>) -> usize {
    let cfg = &ctx.config.listing;
    let mut seen: HashSet<String> = coins.iter().map(|c| c.id.clone()).collect();
    let mut failed = 0;

    for (step, page) in (cfg.core_pages + 1..=cfg.max_pages).enumerate() {
        if coins.len() >= cfg.target_count {
            break;
        }

        tokio::time::sleep(cfg.backfill_page_delay(step as u32 + 1)).await;

        match ctx
            .gecko
            .fetch_markets_page(page, (page - 1) as usize, cfg.max_pages as usize)
            .await
        {
            Ok(batch) => {
                let before = coins.len();
                for coin in batch {
                    if !is_stable(&coin) && seen.insert(coin.id.clone()) {
                        coins.push(coin);
                    }
                }
                info!(page, added = coins.len() - before, total = coins.len(), "보충 페이지 수집");
            }
            Err(e) => {
                failed += 1;
                warn!(page, error = %e, "보충 페이지 실패, 건너뜀");
            }
        }
    }

    failed
}

/// 상위 코인 중 총/최대 공급량이 비어 있는 항목을 상세 조회로 채웁니다.
///
/// 시간 예산을 넘기면 그때까지의 결과만 사용합니다.
async fn backfill_supply(
    ctx: &CollectorContext,
    coins: &[MarketCoin],
) -> HashMap<String, SupplyFields> {
    let cfg = &ctx.config.backfill;
    let candidates: Vec<&MarketCoin> = coins
        .iter()
        .take(cfg.top_n)
        .filter(|c| c.total_supply.is_none() || c.max_supply.is_none())
        .collect();

    let mut found = HashMap::new();
    if candidates.is_empty() {
        return found;
    }

    info!(candidates = candidates.len(), budget_secs = cfg.budget_secs, "공급량 보충 시작");

    let outcome =
        tokio::time::timeout(cfg.budget(), fetch_details(ctx, &candidates, &mut found)).await;
    if outcome.is_err() {
        warn!(
            resolved = found.len(),
            candidates = candidates.len(),
            "공급량 보충 시간 예산 초과, 부분 결과 사용"
        );
    } else {
        info!(resolved = found.len(), candidates = candidates.len(), "공급량 보충 완료");
    }

    found
}

/// (시작 인덱스, 배치) 목록. 배치 크기 0은 1로 취급합니다.
fn detail_batches<T>(items: &[T], batch_size: usize) -> impl Iterator<Item = (usize, &[T])> {
    let size = batch_size.max(1);
    items
        .chunks(size)
        .enumerate()
        .map(move |(n, chunk)| (n * size, chunk))
}

async fn fetch_details(
    ctx: &CollectorContext,
    candidates: &[&MarketCoin],
    found: &mut HashMap<String, SupplyFields>,
) {
    let cfg = &ctx.config.backfill;
    let count = candidates.len();

    for (batch_no, (offset, batch)) in detail_batches(candidates, cfg.batch_size).enumerate() {
        if batch_no > 0 {
            tokio::time::sleep(cfg.batch_delay()).await;
        }

        for (i, coin) in batch.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(cfg.item_delay()).await;
            }

            let index = offset + i;
            for attempt in 0..=cfg.max_retries {
                // 시도마다 다른 릴레이
                match ctx
                    .gecko
                    .fetch_coin_detail(&coin.id, index + attempt as usize, count)
                    .await
                {
                    Ok(detail) => {
                        found.insert(
                            coin.id.clone(),
                            SupplyFields {
                                total: detail.total_supply(),
                                max: detail.max_supply(),
                            },
                        );
                        break;
                    }
                    Err(e) if attempt < cfg.max_retries => {
                        debug!(id = %coin.id, attempt, error = %e, "상세 조회 재시도");
                    }
                    Err(e) => {
                        warn!(id = %coin.id, error = %e, "상세 조회 실패, 건너뜀");
                    }
                }
            }
        }
    }
}

/// 이전 사이클에 저장된 리스팅의 공급량.
async fn load_prior_supplies(ctx: &CollectorContext) -> HashMap<String, SupplyFields> {
    match load_typed::<Vec<ListingRecord>>(ctx.documents.as_ref(), Dataset::CryptoList).await {
        Ok(Some(records)) => records
            .into_iter()
            .map(|r| {
                (
                    r.id,
                    SupplyFields {
                        total: r.total_supply,
                        max: r.max_supply,
                    },
                )
            })
            .collect(),
        Ok(None) => HashMap::new(),
        Err(e) => {
            warn!(error = %e, "이전 리스팅 로드 실패, 공급량 대체값 없음");
            HashMap::new()
        }
    }
}

fn is_stable(coin: &MarketCoin) -> bool {
    is_stablecoin(&coin.id, &coin.symbol, &coin.name, coin.current_price)
}

/// ID 기준 중복 제거 (처음 나온 항목 유지).
pub fn dedup_by_id(coins: Vec<MarketCoin>) -> Vec<MarketCoin> {
    let mut seen = HashSet::new();
    coins
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// 스테이블코인 제거.
pub fn filter_stablecoins(coins: Vec<MarketCoin>) -> Vec<MarketCoin> {
    coins.into_iter().filter(|c| !is_stable(c)).collect()
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// 최종 레코드로 변환하고 순위를 1부터 다시 매깁니다.
///
/// 총/최대 공급량: 업스트림 값 → 상세 조회 → 이전 리스팅 → 알 수 없음.
pub fn normalize_and_rank(
    coins: Vec<MarketCoin>,
    details: &HashMap<String, SupplyFields>,
    prior: &HashMap<String, SupplyFields>,
) -> Vec<ListingRecord> {
    coins
        .into_iter()
        .enumerate()
        .map(|(i, coin)| {
            let detail = details.get(&coin.id).copied().unwrap_or_default();
            let previous = prior.get(&coin.id).copied().unwrap_or_default();
            let sparkline_7d = coin.sparkline();

            ListingRecord {
                total_supply: coin.total_supply.or(detail.total).or(previous.total),
                max_supply: coin.max_supply.or(detail.max).or(previous.max),
                name: coin.name,
                symbol: coin.symbol.to_uppercase(),
                image: coin.image.unwrap_or_default(),
                current_price: finite_or_zero(coin.current_price),
                price_change_percentage_24h: finite_or_zero(coin.price_change_percentage_24h),
                market_cap: finite_or_zero(coin.market_cap),
                total_volume: finite_or_zero(coin.total_volume),
                rank: (i + 1) as u32,
                circulating_supply: finite_or_zero(coin.circulating_supply),
                sparkline_7d,
                id: coin.id,
            }
        })
        .collect()
}
