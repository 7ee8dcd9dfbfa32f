//! 연준 목표금리 동기화.
//!
//! - 현재 금리: FRED 상단/하단 시리즈의 최신 관측치 (없으면 사이클 실패)
//! - 이전 금리: 관측치 → 저장된 값 → 현재 값(변동 없음으로 가정)
//! - 마지막 발표: 보도자료 RSS → 금리 변경일 → 저장된 값
//! - 다음 결정: FOMC 캘린더 → 저장된 값 (미래인 경우만)

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::FutureExt;
use rust_decimal::Decimal;
use std::time::Instant;
use tracing::{info, warn};

use feed_core::{Dataset, FedRateData, PreviousRateSource};
use feed_data::provider::federal_reserve::decision_time;
use feed_data::provider::{
    latest_statement, next_decision_after, RateObservation, SERIES_TARGET_LOWER,
    SERIES_TARGET_UPPER,
};
use feed_data::resolver::{resolve_first, Resolved};
use feed_data::DataError;
use feed_data::storage::{load_typed, save_typed};

use crate::context::CollectorContext;
use crate::error::CollectorError;
use crate::{Result, UpdateSummary};

/// 관측치 조회 기간 (일)
const LOOKBACK_DAYS: u64 = 400;

/// 상단/하단 금리 쌍.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePair {
    pub upper: Decimal,
    pub lower: Decimal,
}

pub async fn sync_fed_rate(ctx: &CollectorContext) -> Result<UpdateSummary> {
    sync_fed_rate_at(ctx, Utc::now()).await
}

pub async fn sync_fed_rate_at(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<UpdateSummary> {
    let start = Instant::now();
    let since = now
        .date_naive()
        .checked_sub_days(Days::new(LOOKBACK_DAYS))
        .unwrap_or(NaiveDate::MIN);

    let (upper_obs, lower_obs) = tokio::try_join!(
        ctx.fred.fetch_observations(SERIES_TARGET_UPPER, since),
        ctx.fred.fetch_observations(SERIES_TARGET_LOWER, since),
    )?;

    let (Some(latest_upper), Some(latest_lower)) = (upper_obs.last(), lower_obs.last()) else {
        return Err(CollectorError::Acquisition(
            "FRED 목표금리 관측치 없음".to_string(),
        ));
    };
    let current = RatePair {
        upper: latest_upper.value,
        lower: latest_lower.value,
    };

    let persisted: Option<FedRateData> =
        match load_typed(ctx.documents.as_ref(), Dataset::FedRate).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "저장된 금리 로드 실패");
                None
            }
        };

    let previous = resolve_previous(&upper_obs, &lower_obs, current, persisted.as_ref()).await;
    let change_date = rate_change_date(&upper_obs);

    let (last_announcement, next_decision) = tokio::join!(
        resolve_last_announcement(ctx, change_date, persisted.as_ref()),
        resolve_next_decision(ctx, now, persisted.as_ref()),
    );

    let data = FedRateData {
        upper: current.upper,
        lower: current.lower,
        previous_upper: previous.value.upper,
        previous_lower: previous.value.lower,
        previous_source: previous.source,
        observed_on: latest_upper.date,
        last_announcement,
        next_decision,
    };

    info!(
        upper = %data.upper,
        lower = %data.lower,
        previous_upper = %data.previous_upper,
        previous_source = ?data.previous_source,
        change_bps = %data.change_bps(),
        "연준 금리 확정"
    );

    save_typed(ctx.documents.as_ref(), Dataset::FedRate, &data, Utc::now()).await?;

    Ok(UpdateSummary::succeeded(Dataset::FedRate, 1, start.elapsed())
        .with_source(source_label(data.previous_source)))
}

fn source_label(source: PreviousRateSource) -> &'static str {
    match source {
        PreviousRateSource::Observed => "observed",
        PreviousRateSource::Persisted => "persisted",
        PreviousRateSource::AssumedUnchanged => "assumedUnchanged",
    }
}

/// 상단 금리가 현재와 다른 마지막 관측치와 그 날짜의 하단 금리.
pub fn observed_previous(
    upper_obs: &[RateObservation],
    lower_obs: &[RateObservation],
) -> Option<RatePair> {
    let current = upper_obs.last()?.value;
    let previous = upper_obs.iter().rev().find(|o| o.value != current)?;
    let lower = lower_obs
        .iter()
        .rev()
        .find(|o| o.date <= previous.date)?
        .value;

    Some(RatePair {
        upper: previous.value,
        lower,
    })
}

/// 현재 상단 금리가 시작된 날짜. 조회 기간 안에 변경이 없으면 None.
pub fn rate_change_date(upper_obs: &[RateObservation]) -> Option<NaiveDate> {
    let current = upper_obs.last()?.value;
    let last_different = upper_obs.iter().rposition(|o| o.value != current)?;
    upper_obs.get(last_different + 1).map(|o| o.date)
}

/// 저장된 문서에서 이전 금리를 추정합니다.
///
/// 저장 이후 금리가 바뀌었다면 저장된 현재 값이 곧 이전 값입니다.
pub fn persisted_previous(persisted: Option<&FedRateData>, current: RatePair) -> Option<RatePair> {
    let doc = persisted?;
    if doc.upper != current.upper || doc.lower != current.lower {
        return Some(RatePair {
            upper: doc.upper,
            lower: doc.lower,
        });
    }
    if doc.previous_source == PreviousRateSource::AssumedUnchanged {
        return None;
    }
    Some(RatePair {
        upper: doc.previous_upper,
        lower: doc.previous_lower,
    })
}

async fn resolve_previous(
    upper_obs: &[RateObservation],
    lower_obs: &[RateObservation],
    current: RatePair,
    persisted: Option<&FedRateData>,
) -> Resolved<RatePair, PreviousRateSource> {
    let observed = observed_previous(upper_obs, lower_obs);
    let stored = persisted_previous(persisted, current);

    resolve_first(
        "fed_previous_rate",
        vec![
            (PreviousRateSource::Observed, async move { Ok::<_, DataError>(observed) }.boxed()),
            (PreviousRateSource::Persisted, async move { Ok::<_, DataError>(stored) }.boxed()),
            (
                PreviousRateSource::AssumedUnchanged,
                async move { Ok::<_, DataError>(Some(current)) }.boxed(),
            ),
        ],
    )
    .await
    .unwrap_or(Resolved {
        value: current,
        source: PreviousRateSource::AssumedUnchanged,
    })
}

async fn resolve_last_announcement(
    ctx: &CollectorContext,
    change_date: Option<NaiveDate>,
    persisted: Option<&FedRateData>,
) -> Option<DateTime<Utc>> {
    let stored = persisted.and_then(|p| p.last_announcement);

    resolve_first(
        "fed_last_announcement",
        vec![
            (
                "press_feed",
                async move {
                    let items = ctx.fed.fetch_press_items().await?;
                    Ok::<_, DataError>(latest_statement(&items))
                }
                .boxed(),
            ),
            (
                "rate_change",
                async move { Ok::<_, DataError>(change_date.and_then(decision_time)) }.boxed(),
            ),
            ("persisted", async move { Ok::<_, DataError>(stored) }.boxed()),
        ],
    )
    .await
    .map(|resolved| resolved.value)
}

async fn resolve_next_decision(
    ctx: &CollectorContext,
    now: DateTime<Utc>,
    persisted: Option<&FedRateData>,
) -> Option<DateTime<Utc>> {
    let stored = persisted
        .and_then(|p| p.next_decision)
        .filter(|at| *at > now);

    resolve_first(
        "fed_next_decision",
        vec![
            (
                "calendar",
                async move {
                    let decisions = ctx.fed.fetch_meeting_decisions().await?;
                    Ok::<_, DataError>(next_decision_after(&decisions, now))
                }
                .boxed(),
            ),
            ("persisted", async move { Ok::<_, DataError>(stored) }.boxed()),
        ],
    )
    .await
    .map(|resolved| resolved.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_context;
    use chrono::TimeZone;
    use feed_core::FeedConfig;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn obs(date: &str, value: Decimal) -> RateObservation {
        RateObservation {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            value,
        }
    }

    #[test]
    fn test_observed_previous_finds_last_change() {
        let upper = vec![
            obs("2024-12-17", dec!(4.75)),
            obs("2024-12-18", dec!(4.75)),
            obs("2024-12-19", dec!(4.50)),
            obs("2024-12-20", dec!(4.50)),
        ];
        let lower = vec![
            obs("2024-12-17", dec!(4.50)),
            obs("2024-12-18", dec!(4.50)),
            obs("2024-12-19", dec!(4.25)),
            obs("2024-12-20", dec!(4.25)),
        ];
        assert_eq!(
            observed_previous(&upper, &lower),
            Some(RatePair {
                upper: dec!(4.75),
                lower: dec!(4.50)
            })
        );
        assert_eq!(rate_change_date(&upper), NaiveDate::from_ymd_opt(2024, 12, 19));
    }

    #[test]
    fn test_no_change_in_window() {
        let upper = vec![obs("2025-01-01", dec!(4.50)), obs("2025-01-02", dec!(4.50))];
        assert_eq!(observed_previous(&upper, &upper), None);
        assert_eq!(rate_change_date(&upper), None);
    }

    fn stored(upper: Decimal, prev: Decimal, source: PreviousRateSource) -> FedRateData {
        FedRateData {
            upper,
            lower: upper - dec!(0.25),
            previous_upper: prev,
            previous_lower: prev - dec!(0.25),
            previous_source: source,
            observed_on: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            last_announcement: None,
            next_decision: None,
        }
    }

    #[test]
    fn test_persisted_previous() {
        let current = RatePair {
            upper: dec!(4.50),
            lower: dec!(4.25),
        };

        // 같은 금리: 저장된 이전 값 사용
        let same = stored(dec!(4.50), dec!(4.75), PreviousRateSource::Observed);
        assert_eq!(persisted_previous(Some(&same), current).unwrap().upper, dec!(4.75));

        // 저장 이후 변경: 저장된 현재 값이 이전 값
        let changed = stored(dec!(4.75), dec!(5.00), PreviousRateSource::Observed);
        assert_eq!(persisted_previous(Some(&changed), current).unwrap().upper, dec!(4.75));

        // 가정값은 다시 쓰지 않음
        let assumed = stored(dec!(4.50), dec!(4.50), PreviousRateSource::AssumedUnchanged);
        assert_eq!(persisted_previous(Some(&assumed), current), None);
        assert_eq!(persisted_previous(None, current), None);
    }

    fn observations_body(values: &[(&str, &str)]) -> String {
        let items: Vec<String> = values
            .iter()
            .map(|(d, v)| format!(r#"{{"date":"{}","value":"{}"}}"#, d, v))
            .collect();
        format!(r#"{{"observations":[{}]}}"#, items.join(","))
    }

    const PRESS_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item>
    <title>Federal Reserve issues FOMC statement</title>
    <link>https://example.org/monetary20241218a.htm</link>
    <pubDate>Wed, 18 Dec 2024 19:00:00 GMT</pubDate>
  </item>
</channel></rss>"#;

    const CALENDAR: &str = r#"<html><body>
<div class="panel panel-default">
  <div class="panel-heading"><h4>2025 FOMC Meetings</h4></div>
  <div class="row fomc-meeting">
    <div class="fomc-meeting__month"><strong>January</strong></div>
    <div class="fomc-meeting__date">28-29</div>
  </div>
</div>
</body></html>"#;

    fn config(server: &mockito::Server) -> FeedConfig {
        let mut config = FeedConfig::default();
        config.sources.fred_base_url = server.url();
        config.sources.fred_api_key = Some("test-key".to_string());
        config.sources.fed_rss_url = format!("{}/press.xml", server.url());
        config.sources.fed_calendar_url = format!("{}/calendar.htm", server.url());
        config
    }

    #[tokio::test]
    async fn test_sync_with_all_sources() {
        let mut server = mockito::Server::new_async().await;
        let upper = server
            .mock("GET", "/series/observations")
            .match_query(Matcher::UrlEncoded("series_id".into(), "DFEDTARU".into()))
            .with_body(observations_body(&[
                ("2024-12-18", "4.75"),
                ("2024-12-19", "4.50"),
                ("2024-12-20", "."),
            ]))
            .create_async()
            .await;
        let lower = server
            .mock("GET", "/series/observations")
            .match_query(Matcher::UrlEncoded("series_id".into(), "DFEDTARL".into()))
            .with_body(observations_body(&[("2024-12-18", "4.50"), ("2024-12-19", "4.25")]))
            .create_async()
            .await;
        server
            .mock("GET", "/press.xml")
            .with_body(PRESS_FEED)
            .create_async()
            .await;
        server
            .mock("GET", "/calendar.htm")
            .with_body(CALENDAR)
            .create_async()
            .await;

        let (ctx, documents, _) = memory_context(config(&server));
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let summary = sync_fed_rate_at(&ctx, now).await.unwrap();
        assert_eq!(summary.source.as_deref(), Some("observed"));

        upper.assert_async().await;
        lower.assert_async().await;

        let data: FedRateData = load_typed(documents.as_ref(), Dataset::FedRate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.upper, dec!(4.50));
        assert_eq!(data.lower, dec!(4.25));
        assert_eq!(data.previous_upper, dec!(4.75));
        assert_eq!(data.previous_source, PreviousRateSource::Observed);
        assert_eq!(data.observed_on, NaiveDate::from_ymd_opt(2024, 12, 19).unwrap());
        assert_eq!(
            data.last_announcement,
            Some(Utc.with_ymd_and_hms(2024, 12, 18, 19, 0, 0).unwrap())
        );
        assert_eq!(
            data.next_decision,
            Some(Utc.with_ymd_and_hms(2025, 1, 29, 19, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_web_sources_down_uses_fallbacks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/series/observations")
            .match_query(Matcher::UrlEncoded("series_id".into(), "DFEDTARU".into()))
            .with_body(observations_body(&[("2025-01-08", "4.50"), ("2025-01-09", "4.50")]))
            .create_async()
            .await;
        server
            .mock("GET", "/series/observations")
            .match_query(Matcher::UrlEncoded("series_id".into(), "DFEDTARL".into()))
            .with_body(observations_body(&[("2025-01-08", "4.25"), ("2025-01-09", "4.25")]))
            .create_async()
            .await;
        server
            .mock("GET", "/press.xml")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/calendar.htm")
            .with_status(404)
            .create_async()
            .await;

        let (ctx, documents, _) = memory_context(config(&server));
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let announced = Utc.with_ymd_and_hms(2024, 12, 18, 19, 0, 0).unwrap();
        let upcoming = Utc.with_ymd_and_hms(2025, 1, 29, 19, 0, 0).unwrap();

        let mut previous = stored(dec!(4.50), dec!(4.75), PreviousRateSource::Observed);
        previous.last_announcement = Some(announced);
        previous.next_decision = Some(upcoming);
        save_typed(documents.as_ref(), Dataset::FedRate, &previous, now)
            .await
            .unwrap();

        sync_fed_rate_at(&ctx, now).await.unwrap();

        let data: FedRateData = load_typed(documents.as_ref(), Dataset::FedRate)
            .await
            .unwrap()
            .unwrap();
        // 조회 기간 안에 변경이 없어 관측치 기반 이전 값은 정의되지 않음
        assert_eq!(data.previous_source, PreviousRateSource::Persisted);
        assert_eq!(data.previous_upper, dec!(4.75));
        assert_eq!(data.last_announcement, Some(announced));
        assert_eq!(data.next_decision, Some(upcoming));
    }

    #[tokio::test]
    async fn test_assumed_unchanged_without_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/series/observations")
            .match_query(Matcher::Any)
            .with_body(observations_body(&[("2025-01-09", "4.50")]))
            .create_async()
            .await;

        let (ctx, documents, _) = memory_context(config(&server));
        sync_fed_rate_at(&ctx, Utc::now()).await.unwrap();

        let data: FedRateData = load_typed(documents.as_ref(), Dataset::FedRate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.previous_source, PreviousRateSource::AssumedUnchanged);
        assert_eq!(data.previous_upper, data.upper);
        assert!(!data.is_confirmed_unchanged());
    }

    #[tokio::test]
    async fn test_no_observations_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/series/observations")
            .match_query(Matcher::Any)
            .with_body(r#"{"observations":[]}"#)
            .create_async()
            .await;

        let (ctx, documents, _) = memory_context(config(&server));
        assert!(sync_fed_rate(&ctx).await.is_err());
        assert!(documents.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_fatal() {
        let server = mockito::Server::new_async().await;
        let mut cfg = config(&server);
        cfg.sources.fred_api_key = None;

        let (ctx, documents, _) = memory_context(cfg);
        assert!(sync_fed_rate(&ctx).await.is_err());
        assert!(documents.is_empty().await);
    }
}
