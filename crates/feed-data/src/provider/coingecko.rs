//! CoinGecko 호환 시세 API 클라이언트.
//!
//! ## 엔드포인트
//! - `/coins/markets`: 시가총액 순 리스팅 페이지 (7일 스파크라인 포함)
//! - `/coins/{id}`: 코인 상세 (공급량 보충용)
//! - `/ping`: 릴레이 생존 확인 경로
//! - `/global`: 시가총액 점유율
//! - `/search/trending`: 트렌딩 코인

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use feed_core::{DominanceData, FetchConfig, SourceConfig, TrendingCoin};

use crate::error::{DataError, Result};
use crate::fetch::{FetchError, RequestOptions, ResilientFetcher};

/// 리스팅 페이지의 코인 항목. 업스트림은 임의의 필드를 null로 보낼 수 있습니다.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<Option<f64>>,
}

impl MarketCoin {
    /// 7일 가격 시계열 (null 값 제외).
    pub fn sparkline(&self) -> Vec<f64> {
        self.sparkline_in_7d
            .as_ref()
            .map(|s| s.price.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

/// 코인 상세 중 공급량 필드.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    #[serde(default)]
    pub market_data: Option<DetailMarketData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailMarketData {
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
}

impl CoinDetail {
    pub fn total_supply(&self) -> Option<f64> {
        self.market_data.as_ref().and_then(|m| m.total_supply)
    }

    pub fn max_supply(&self) -> Option<f64> {
        self.market_data.as_ref().and_then(|m| m.max_supply)
    }
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    market_cap_rank: Option<u32>,
    thumb: Option<String>,
    score: Option<u32>,
}

/// CoinGecko 클라이언트.
pub struct CoinGeckoClient {
    fetcher: Arc<ResilientFetcher>,
    base_url: String,
    api_key: Option<String>,
    per_page: u32,
    page_timeout: Duration,
    detail_timeout: Duration,
    default_timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(fetcher: Arc<ResilientFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            per_page: 100,
            page_timeout: Duration::from_secs(60),
            detail_timeout: Duration::from_secs(20),
            default_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(
        fetcher: Arc<ResilientFetcher>,
        sources: &SourceConfig,
        fetch: &FetchConfig,
        per_page: u32,
    ) -> Self {
        let mut client = Self::new(fetcher, sources.coingecko_base_url.as_str());
        client.api_key = sources.coingecko_api_key.clone();
        client.per_page = per_page;
        client.page_timeout = fetch.page_timeout();
        client.detail_timeout = fetch.detail_timeout();
        client.default_timeout = fetch.default_timeout();
        client
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn fetcher(&self) -> &Arc<ResilientFetcher> {
        &self.fetcher
    }

    fn options(&self, timeout: Duration) -> RequestOptions {
        let options = RequestOptions::with_timeout(timeout);
        match &self.api_key {
            Some(key) => options.header("x-cg-demo-api-key", key.as_str()),
            None => options,
        }
    }

    /// 리스팅 페이지 URL (1부터).
    pub fn markets_url(&self, page: u32) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=true&price_change_percentage=24h",
            self.base_url, self.per_page, page
        )
    }

    pub fn detail_url(&self, id: &str) -> String {
        format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            self.base_url, id
        )
    }

    /// 릴레이 생존 확인에 쓰는 경로.
    pub fn ping_url(&self) -> String {
        format!("{}/ping", self.base_url)
    }

    /// 리스팅 페이지 한 장을 가져옵니다. 릴레이는 `select(batch_index, batch_count)`로 고릅니다.
    pub async fn fetch_markets_page(
        &self,
        page: u32,
        batch_index: usize,
        batch_count: usize,
    ) -> std::result::Result<Vec<MarketCoin>, FetchError> {
        let url = self.markets_url(page);
        let coins: Vec<MarketCoin> = self
            .fetcher
            .get_json(&url, &self.options(self.page_timeout), batch_index, batch_count)
            .await?;
        debug!(page, count = coins.len(), "리스팅 페이지 수신");
        Ok(coins)
    }

    /// 코인 상세를 가져옵니다.
    pub async fn fetch_coin_detail(
        &self,
        id: &str,
        batch_index: usize,
        batch_count: usize,
    ) -> std::result::Result<CoinDetail, FetchError> {
        self.fetcher
            .get_json(
                &self.detail_url(id),
                &self.options(self.detail_timeout),
                batch_index,
                batch_count,
            )
            .await
    }

    /// 시가총액 점유율.
    pub async fn fetch_dominance(&self) -> Result<DominanceData> {
        let response = self
            .fetcher
            .request_rotating(
                &format!("{}/global", self.base_url),
                &self.options(self.default_timeout),
            )
            .await?;
        let global: GlobalResponse = response.json()?;

        if global.data.market_cap_percentage.is_empty() {
            return Err(DataError::NoData("global market_cap_percentage".to_string()));
        }

        Ok(DominanceData {
            percentages: global
                .data
                .market_cap_percentage
                .into_iter()
                .map(|(symbol, pct)| (symbol.to_lowercase(), pct))
                .collect(),
            total_market_cap_usd: global.data.total_market_cap.get("usd").copied().unwrap_or(0.0),
            market_cap_change_24h: global.data.market_cap_change_percentage_24h_usd.unwrap_or(0.0),
        })
    }

    /// 트렌딩 코인 목록 (업스트림 순서 유지).
    pub async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>> {
        let response = self
            .fetcher
            .request_rotating(
                &format!("{}/search/trending", self.base_url),
                &self.options(self.default_timeout),
            )
            .await?;
        let trending: TrendingResponse = response.json()?;

        Ok(trending
            .coins
            .into_iter()
            .enumerate()
            .map(|(i, entry)| TrendingCoin {
                id: entry.item.id,
                name: entry.item.name,
                symbol: entry.item.symbol.to_uppercase(),
                market_cap_rank: entry.item.market_cap_rank,
                thumb: entry.item.thumb,
                score: entry.item.score.unwrap_or(i as u32),
            })
            .collect())
    }
}
