//! 연준 금리 및 환율 데이터.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 이전 금리 값의 출처.
///
/// 이전 관측치를 찾지 못해 현재 값을 재사용한 경우(`AssumedUnchanged`)와
/// 실제로 금리가 동결된 경우를 구분하기 위해 남깁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreviousRateSource {
    /// 관측 시계열에서 직전의 다른 값을 찾음
    Observed,
    /// 이전 사이클에 저장된 값을 재사용
    Persisted,
    /// 이전 값을 알 수 없어 현재 값을 그대로 사용
    AssumedUnchanged,
}

/// 연준 기준금리 목표 범위.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FedRateData {
    /// 발표된 상단 (%)
    pub upper: Decimal,
    /// 발표된 하단 (%)
    pub lower: Decimal,
    pub previous_upper: Decimal,
    pub previous_lower: Decimal,
    pub previous_source: PreviousRateSource,
    /// 최신 관측일
    pub observed_on: NaiveDate,
    /// 마지막 발표 시각
    pub last_announcement: Option<DateTime<Utc>>,
    /// 다음 결정 시각
    pub next_decision: Option<DateTime<Utc>>,
}

impl FedRateData {
    /// 상단 기준 변화폭 (bp).
    pub fn change_bps(&self) -> Decimal {
        (self.upper - self.previous_upper) * Decimal::from(100)
    }

    /// 관측 가능한 근거로 동결이 확인된 경우에만 true.
    pub fn is_confirmed_unchanged(&self) -> bool {
        self.previous_source != PreviousRateSource::AssumedUnchanged
            && self.upper == self.previous_upper
            && self.lower == self.previous_lower
    }
}

/// 환율 데이터 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateSource {
    Live,
    Cache,
    Persisted,
}

/// 기준 통화 대비 환율.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRates {
    pub base: String,
    /// 통화 코드(대문자) → 1 base 당 환율
    pub rates: BTreeMap<String, Decimal>,
    pub provider_updated_at: Option<DateTime<Utc>>,
    pub source: RateSource,
}

impl CurrencyRates {
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        if code.eq_ignore_ascii_case(&self.base) {
            return Some(Decimal::ONE);
        }
        self.rates.get(&code.to_uppercase()).copied()
    }

    /// base 통화 금액을 다른 통화로 환산.
    pub fn convert(&self, amount: Decimal, to: &str) -> Option<Decimal> {
        self.rate(to).map(|r| amount * r)
    }
}
