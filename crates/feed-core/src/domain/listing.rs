//! 코인 리스팅 레코드.

use serde::{Deserialize, Serialize};

/// 정규화된 코인 리스팅 항목.
///
/// 숫자 필드는 값이 없으면 0으로 채워지지만, `total_supply`와 `max_supply`는
/// 알 수 없음(`None`)과 0을 구분해야 하므로 `Option`으로 유지합니다.
/// `rank`는 필터링 후 최종 순서 기준 1..N으로 다시 매겨집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    /// 업스트림 코인 ID (고유 키)
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub image: String,
    pub current_price: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    #[serde(default)]
    pub total_volume: f64,
    /// 최종 순위 (1부터 연속)
    pub rank: u32,
    pub circulating_supply: f64,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    /// 7일 가격 시계열
    #[serde(default)]
    pub sparkline_7d: Vec<f64>,
}

impl ListingRecord {
    /// 총 공급량 또는 최대 공급량이 비어 있는지 여부.
    pub fn missing_supply(&self) -> bool {
        self.total_supply.is_none() || self.max_supply.is_none()
    }
}
