//! 공급량 스냅샷 기록 및 기간별 변화량 계산.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use feed_core::{Dataset, ListingRecord, SupplySnapshot, SupplyTrackingData, SupplyTrackingEntry};
use feed_data::compute_supply_deltas;
use feed_data::storage::{load_typed, save_typed};

use crate::context::CollectorContext;
use crate::error::CollectorError;
use crate::{Result, UpdateSummary};

/// 현재 시각 기준 공급량 추적
pub async fn track_supply(ctx: &CollectorContext) -> Result<UpdateSummary> {
    track_supply_at(ctx, Utc::now()).await
}

/// `now` 시점의 스냅샷을 기록하고 변화량 문서를 갱신합니다.
pub async fn track_supply_at(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<UpdateSummary> {
    let start = Instant::now();
    let cfg = &ctx.config.supply;

    let listing: Vec<ListingRecord> =
        load_typed(ctx.documents.as_ref(), Dataset::CryptoList)
            .await?
            .ok_or_else(|| {
                CollectorError::Acquisition("저장된 리스팅이 없어 스냅샷을 만들 수 없음".to_string())
            })?;

    let supplies: BTreeMap<String, f64> = listing
        .iter()
        .map(|r| (r.id.clone(), r.circulating_supply))
        .collect();

    let snapshot = SupplySnapshot::capture(now, cfg.bucket_minutes, supplies);
    let inserted = ctx.snapshots.upsert(&snapshot).await?;
    if inserted {
        info!(bucket = %snapshot.bucket_key, coins = snapshot.supplies.len(), "스냅샷 기록");
    } else {
        debug!(bucket = %snapshot.bucket_key, "버킷에 스냅샷이 이미 있음");
    }

    let cutoff = now - ChronoDuration::days(cfg.retention_days);
    match ctx.snapshots.purge_older_than(cutoff).await {
        Ok(0) => {}
        Ok(purged) => info!(purged, cutoff = %cutoff, "오래된 스냅샷 삭제"),
        Err(e) => warn!(error = %e, "스냅샷 정리 실패"),
    }

    let history = ctx.snapshots.latest(cfg.history_limit).await?;
    let deltas = compute_supply_deltas(&history);
    let tracking = build_tracking(&listing, deltas, &history);

    save_typed(
        ctx.documents.as_ref(),
        Dataset::SupplyTracking,
        &tracking,
        Utc::now(),
    )
    .await?;

    Ok(UpdateSummary::succeeded(
        Dataset::SupplyTracking,
        tracking.coins.len(),
        start.elapsed(),
    ))
}

fn build_tracking(
    listing: &[ListingRecord],
    mut deltas: BTreeMap<String, feed_core::SupplyDelta>,
    history: &[SupplySnapshot],
) -> SupplyTrackingData {
    let coins = listing
        .iter()
        .filter_map(|record| {
            deltas.remove(&record.id).map(|delta| {
                (
                    record.id.clone(),
                    SupplyTrackingEntry {
                        name: record.name.clone(),
                        symbol: record.symbol.clone(),
                        circulating_supply: record.circulating_supply,
                        delta,
                    },
                )
            })
        })
        .collect();

    SupplyTrackingData {
        coins,
        snapshot_count: history.len(),
        latest_snapshot: history.last().map(|s| s.timestamp),
    }
}
