//! 영속화되는 데이터셋 문서.
//!
//! 논리 데이터셋마다 `{data, lastUpdate}` 형태의 문서 하나를 유지합니다.
//! 문서 이름이 곧 식별자이므로 같은 업데이트를 다시 실행해도 안전합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 논리 데이터셋.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    CryptoList,
    SupplyTracking,
    FedRate,
    CurrencyRates,
    MarketDominance,
    FearGreed,
    CryptoNews,
    TrendingCoins,
}

impl Dataset {
    /// 저장소 문서 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CryptoList => "crypto_list",
            Self::SupplyTracking => "supply_tracking",
            Self::FedRate => "fed_rate",
            Self::CurrencyRates => "currency_rates",
            Self::MarketDominance => "market_dominance",
            Self::FearGreed => "fear_greed",
            Self::CryptoNews => "crypto_news",
            Self::TrendingCoins => "trending_coins",
        }
    }

    pub fn all() -> [Dataset; 8] {
        [
            Self::CryptoList,
            Self::SupplyTracking,
            Self::FedRate,
            Self::CurrencyRates,
            Self::MarketDominance,
            Self::FearGreed,
            Self::CryptoNews,
            Self::TrendingCoins,
        ]
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 저장된 데이터셋 문서.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDocument {
    pub name: String,
    pub data: serde_json::Value,
    pub last_update: DateTime<Utc>,
}

impl DatasetDocument {
    /// `data`를 타입으로 역직렬화합니다.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
