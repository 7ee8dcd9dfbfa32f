//! 도메인 모델.

pub mod dataset;
pub mod listing;
pub mod market;
pub mod rates;
pub mod supply;

pub use dataset::{Dataset, DatasetDocument};
pub use listing::ListingRecord;
pub use market::{DominanceData, FearGreedData, NewsItem, TrendingCoin};
pub use rates::{CurrencyRates, FedRateData, PreviousRateSource, RateSource};
pub use supply::{
    bucket_key, bucket_start, DeltaWindow, SupplyDelta, SupplySnapshot, SupplyTrackingData,
    SupplyTrackingEntry, WindowDelta,
};
