//! USD 기준 환율 (`open.er-api.com` 형식).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use feed_core::{CurrencyRates, RateSource};

use crate::error::{DataError, Result};
use crate::fetch::{RequestOptions, ResilientFetcher};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    base_code: Option<String>,
    time_last_update_unix: Option<i64>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// 응답 본문을 환율 데이터로 변환합니다.
pub fn parse_latest(body: &str) -> Result<CurrencyRates> {
    let response: LatestResponse = serde_json::from_str(body)?;

    if let Some(result) = &response.result {
        if result != "success" {
            return Err(DataError::NoData(format!("환율 API result={}", result)));
        }
    }

    let rates: BTreeMap<String, Decimal> = response
        .rates
        .into_iter()
        .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
        .filter_map(|(code, rate)| {
            Decimal::from_str(&rate.to_string())
                .ok()
                .map(|r| (code.to_uppercase(), r))
        })
        .collect();

    if rates.is_empty() {
        return Err(DataError::NoData("환율 목록이 비어 있음".to_string()));
    }

    Ok(CurrencyRates {
        base: response.base_code.unwrap_or_else(|| "USD".to_string()),
        rates,
        provider_updated_at: response
            .time_last_update_unix
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        source: RateSource::Live,
    })
}

/// 환율 API 클라이언트.
pub struct FxClient {
    fetcher: Arc<ResilientFetcher>,
    url: String,
    timeout: Duration,
}

impl FxClient {
    pub fn new(fetcher: Arc<ResilientFetcher>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            url: url.into(),
            timeout,
        }
    }

    pub async fn fetch_latest(&self) -> Result<CurrencyRates> {
        let response = self
            .fetcher
            .request_rotating(&self.url, &RequestOptions::with_timeout(self.timeout))
            .await?;
        parse_latest(response.text())
    }
}
