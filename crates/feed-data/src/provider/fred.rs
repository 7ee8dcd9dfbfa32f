//! FRED (St. Louis Fed) 관측치 클라이언트.
//!
//! 연준 목표금리 상단(`DFEDTARU`)과 하단(`DFEDTARL`) 일별 시계열을 조회합니다.
//! 결측값은 `"."`로 내려오며 건너뜁니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::fetch::{RequestOptions, ResilientFetcher};

/// 목표금리 상단 시리즈.
pub const SERIES_TARGET_UPPER: &str = "DFEDTARU";
/// 목표금리 하단 시리즈.
pub const SERIES_TARGET_LOWER: &str = "DFEDTARL";

/// 일별 관측치.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

/// 응답 본문에서 관측치를 추출합니다 (날짜 오름차순).
pub fn parse_observations(body: &str) -> Result<Vec<RateObservation>> {
    let response: ObservationsResponse = serde_json::from_str(body)?;

    let mut observations: Vec<RateObservation> = response
        .observations
        .into_iter()
        .filter_map(|raw| {
            let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").ok()?;
            let value = Decimal::from_str(raw.value.trim()).ok()?;
            Some(RateObservation { date, value })
        })
        .collect();

    observations.sort_by_key(|o| o.date);
    Ok(observations)
}

/// FRED API 클라이언트.
pub struct FredClient {
    fetcher: Arc<ResilientFetcher>,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl FredClient {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn observations_url(&self, series_id: &str, start: NaiveDate) -> String {
        format!(
            "{}/series/observations?series_id={}&api_key={}&file_type=json&observation_start={}",
            self.base_url,
            series_id,
            self.api_key.as_deref().unwrap_or_default(),
            start.format("%Y-%m-%d")
        )
    }

    /// `start` 이후의 관측치를 조회합니다.
    pub async fn fetch_observations(
        &self,
        series_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<RateObservation>> {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(DataError::NoData(format!("{}: FRED API 키 미설정", series_id)));
        }

        let response = self
            .fetcher
            .request_rotating(
                &self.observations_url(series_id, start),
                &RequestOptions::with_timeout(self.timeout),
            )
            .await?;

        let observations = parse_observations(response.text())?;
        debug!(series_id, count = observations.len(), "FRED 관측치 수신");
        Ok(observations)
    }
}
