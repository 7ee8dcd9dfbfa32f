//! 시장 부가 지표: 도미넌스, 공포/탐욕 지수, 뉴스, 트렌딩.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 시가총액 점유율.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DominanceData {
    /// 심볼(소문자) → 점유율(%)
    pub percentages: BTreeMap<String, f64>,
    pub total_market_cap_usd: f64,
    pub market_cap_change_24h: f64,
}

impl DominanceData {
    pub fn share_of(&self, symbol: &str) -> Option<f64> {
        self.percentages.get(&symbol.to_lowercase()).copied()
    }
}

/// 공포/탐욕 지수.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FearGreedData {
    /// 0~100
    pub value: u8,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

/// 뉴스 헤드라인.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

/// 트렌딩 코인.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub thumb: Option<String>,
    /// 업스트림 순서 (0부터)
    pub score: u32,
}
