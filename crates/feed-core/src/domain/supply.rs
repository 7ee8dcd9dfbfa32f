//! 공급량 스냅샷 및 기간별 변화량.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 타임스탬프를 `bucket_minutes` 폭의 버킷 시작 시각으로 내림합니다.
pub fn bucket_start(ts: DateTime<Utc>, bucket_minutes: u32) -> DateTime<Utc> {
    let width = i64::from(bucket_minutes.max(1)) * 60_000;
    let ms = ts.timestamp_millis();
    DateTime::from_timestamp_millis(ms - ms.rem_euclid(width)).unwrap_or(ts)
}

/// 버킷 식별 키 (`YYYY-MM-DDTHH:MM`, UTC).
pub fn bucket_key(bucket: DateTime<Utc>) -> String {
    bucket.format("%Y-%m-%dT%H:%M").to_string()
}

/// 특정 시점의 코인별 유통 공급량.
///
/// 버킷 키가 식별자이며, 한 번 기록된 버킷은 다시 쓰지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplySnapshot {
    pub bucket_key: String,
    /// 실제 캡처 시각
    pub timestamp: DateTime<Utc>,
    /// 코인 ID → 유통 공급량
    pub supplies: BTreeMap<String, f64>,
}

impl SupplySnapshot {
    pub fn capture(
        now: DateTime<Utc>,
        bucket_minutes: u32,
        supplies: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            bucket_key: bucket_key(bucket_start(now, bucket_minutes)),
            timestamp: now,
            supplies,
        }
    }

    /// 에포크 밀리초 타임스탬프.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// 변화량 계산 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaWindow {
    Day,
    Week,
    Month,
}

impl DeltaWindow {
    pub const ALL: [DeltaWindow; 3] = [DeltaWindow::Day, DeltaWindow::Week, DeltaWindow::Month];

    /// 기간 길이 (밀리초).
    pub fn millis(&self) -> i64 {
        match self {
            Self::Day => 86_400_000,
            Self::Week => 604_800_000,
            Self::Month => 2_592_000_000,
        }
    }
}

impl std::fmt::Display for DeltaWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "24h"),
            Self::Week => write!(f, "7d"),
            Self::Month => write!(f, "30d"),
        }
    }
}

/// 한 기간의 변화량. 퍼센트와 절대값은 항상 함께 존재합니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDelta {
    /// 변화율 (%, 소수점 2자리)
    pub change: f64,
    pub absolute_change: f64,
}

impl WindowDelta {
    pub const ZERO: WindowDelta = WindowDelta {
        change: 0.0,
        absolute_change: 0.0,
    };
}

/// 코인별 공급량 변화량. `None`은 "아직 계산되지 않음"입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyDelta {
    #[serde(rename = "change24h")]
    pub change_24h: Option<WindowDelta>,
    #[serde(rename = "change7d")]
    pub change_7d: Option<WindowDelta>,
    #[serde(rename = "change1m")]
    pub change_1m: Option<WindowDelta>,
}

impl SupplyDelta {
    /// 모든 기간이 명시적으로 0인 상태.
    pub fn zeroed() -> Self {
        Self {
            change_24h: Some(WindowDelta::ZERO),
            change_7d: Some(WindowDelta::ZERO),
            change_1m: Some(WindowDelta::ZERO),
        }
    }

    pub fn get(&self, window: DeltaWindow) -> Option<WindowDelta> {
        match window {
            DeltaWindow::Day => self.change_24h,
            DeltaWindow::Week => self.change_7d,
            DeltaWindow::Month => self.change_1m,
        }
    }

    pub fn set(&mut self, window: DeltaWindow, value: Option<WindowDelta>) {
        match window {
            DeltaWindow::Day => self.change_24h = value,
            DeltaWindow::Week => self.change_7d = value,
            DeltaWindow::Month => self.change_1m = value,
        }
    }
}

/// `supply_tracking` 데이터셋의 코인 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyTrackingEntry {
    pub name: String,
    pub symbol: String,
    pub circulating_supply: f64,
    #[serde(flatten)]
    pub delta: SupplyDelta,
}

/// `supply_tracking` 데이터셋.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyTrackingData {
    pub coins: BTreeMap<String, SupplyTrackingEntry>,
    pub snapshot_count: usize,
    pub latest_snapshot: Option<DateTime<Utc>>,
}
