//! USD 기준 환율 동기화.
//!
//! 실시간 조회 → 프로세스 캐시 → 저장된 문서 순으로 값을 찾습니다.
//! 문서는 실시간 조회에 성공했을 때만 갱신합니다.

use chrono::Utc;
use futures::FutureExt;
use std::time::Instant;
use tracing::info;

use feed_core::{CurrencyRates, Dataset, RateSource};
use feed_data::resolver::resolve_first;
use feed_data::storage::{load_typed, save_typed};
use feed_data::DataError;

use crate::context::CollectorContext;
use crate::error::CollectorError;
use crate::{Result, UpdateSummary};

pub async fn sync_currency(ctx: &CollectorContext) -> Result<UpdateSummary> {
    let start = Instant::now();

    let resolved = resolve_first(
        "currency_rates",
        vec![
            (
                RateSource::Live,
                async {
                    let rates = ctx.fx.fetch_latest().await?;
                    ctx.cache_currency(rates.clone()).await;
                    Ok::<_, DataError>(Some(rates))
                }
                .boxed(),
            ),
            (
                RateSource::Cache,
                async { Ok::<_, DataError>(ctx.cached_currency().await) }.boxed(),
            ),
            (
                RateSource::Persisted,
                async {
                    load_typed::<CurrencyRates>(ctx.documents.as_ref(), Dataset::CurrencyRates)
                        .await
                }
                .boxed(),
            ),
        ],
    )
    .await
    .ok_or_else(|| CollectorError::Acquisition("환율: 사용 가능한 값 없음".to_string()))?;

    let mut rates = resolved.value;
    rates.source = resolved.source;

    if resolved.source == RateSource::Live {
        save_typed(
            ctx.documents.as_ref(),
            Dataset::CurrencyRates,
            &rates,
            Utc::now(),
        )
        .await?;
    } else {
        info!(source = ?resolved.source, "실시간 환율 실패, 기존 값 유지");
    }

    let label = match resolved.source {
        RateSource::Live => "live",
        RateSource::Cache => "cache",
        RateSource::Persisted => "persisted",
    };

    Ok(
        UpdateSummary::succeeded(Dataset::CurrencyRates, rates.rates.len(), start.elapsed())
            .with_source(label),
    )
}
