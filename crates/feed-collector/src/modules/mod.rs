//! 데이터셋별 업데이트 작업.
//!
//! 각 작업은 `CollectorContext`를 받아 한 번 실행되고 `UpdateSummary`를 반환합니다.
//! 실패하면 해당 데이터셋의 기존 문서는 바뀌지 않습니다.

pub mod currency_sync;
pub mod fed_rate_sync;
pub mod listing_sync;
pub mod market_sync;
pub mod stablecoin;
pub mod supply_tracking;

pub use currency_sync::sync_currency;
pub use fed_rate_sync::sync_fed_rate;
pub use listing_sync::sync_listing;
pub use market_sync::{sync_dominance, sync_fear_greed, sync_news, sync_trending};
pub use stablecoin::is_stablecoin;
pub use supply_tracking::track_supply;
