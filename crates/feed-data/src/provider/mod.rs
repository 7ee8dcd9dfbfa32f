//! 데이터 Provider 모듈.
//!
//! 모든 Provider는 [`ResilientFetcher`](crate::fetch::ResilientFetcher)를 통해 요청합니다.
//!
//! ## CoinGecko 호환 API
//! - `CoinGeckoClient`: 리스팅 페이지, 코인 상세, 도미넌스, 트렌딩
//!
//! ## 연준 금리
//! - `FredClient`: 목표금리 상/하단 일별 관측치
//! - `FederalReserveClient`: 보도자료 RSS, FOMC 캘린더
//!
//! ## 기타
//! - `FxClient`: USD 기준 환율
//! - `SentimentClient`: 공포/탐욕 지수, 뉴스 RSS

pub mod coingecko;
pub mod federal_reserve;
pub mod fred;
pub mod fx;
pub mod rss;
pub mod sentiment;

pub use coingecko::{CoinDetail, CoinGeckoClient, MarketCoin};
pub use federal_reserve::{latest_statement, next_decision_after, FederalReserveClient};
pub use fred::{FredClient, RateObservation, SERIES_TARGET_LOWER, SERIES_TARGET_UPPER};
pub use fx::FxClient;
pub use rss::FeedItem;
pub use sentiment::SentimentClient;
