//! 업데이트 작업 공용 의존성.

use std::sync::Arc;
use tokio::sync::RwLock;

use feed_core::{CurrencyRates, FeedConfig};
use feed_data::provider::{
    CoinGeckoClient, FederalReserveClient, FredClient, FxClient, SentimentClient,
};
use feed_data::{
    DocumentStore, HttpRelayProbe, RelayHealthTracker, ResilientFetcher, SnapshotStore,
};

use crate::Result;

/// 모든 업데이트 작업이 공유하는 클라이언트와 저장소.
///
/// 릴레이 상태는 `fetcher` 안의 추적기 하나를 모든 작업이 공유합니다.
pub struct CollectorContext {
    pub config: FeedConfig,
    pub fetcher: Arc<ResilientFetcher>,
    pub gecko: CoinGeckoClient,
    pub fred: FredClient,
    pub fed: FederalReserveClient,
    pub fx: FxClient,
    pub sentiment: SentimentClient,
    pub documents: Arc<dyn DocumentStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    /// 마지막으로 성공한 환율 (프로세스 메모리)
    currency_cache: RwLock<Option<CurrencyRates>>,
}

impl CollectorContext {
    /// 설정으로 HTTP 클라이언트와 릴레이 추적기를 구성합니다.
    pub fn new(
        config: FeedConfig,
        documents: Arc<dyn DocumentStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        let client = ResilientFetcher::build_client(&config.fetch)?;
        let ping_url = format!(
            "{}/ping",
            config.sources.coingecko_base_url.trim_end_matches('/')
        );
        let probe = HttpRelayProbe::new(client.clone(), ping_url, config.relay.probe_timeout());
        let tracker = Arc::new(RelayHealthTracker::from_config(&config.relay, Box::new(probe)));
        let fetcher = Arc::new(ResilientFetcher::new(
            client,
            tracker,
            config.fetch.rate_limit_cooldown(),
        ));

        Ok(Self::with_fetcher(config, fetcher, documents, snapshots))
    }

    /// 미리 구성된 fetcher를 사용합니다.
    pub fn with_fetcher(
        config: FeedConfig,
        fetcher: Arc<ResilientFetcher>,
        documents: Arc<dyn DocumentStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let sources = &config.sources;
        let timeout = config.fetch.default_timeout();

        let gecko = CoinGeckoClient::from_config(
            fetcher.clone(),
            sources,
            &config.fetch,
            config.listing.per_page,
        );
        let fred = FredClient::new(
            fetcher.clone(),
            sources.fred_base_url.as_str(),
            sources.fred_api_key.clone(),
            timeout,
        );
        let fed = FederalReserveClient::new(
            fetcher.clone(),
            sources.fed_rss_url.as_str(),
            sources.fed_calendar_url.as_str(),
            timeout,
        );
        let fx = FxClient::new(fetcher.clone(), sources.fx_url.as_str(), timeout);
        let sentiment = SentimentClient::new(
            fetcher.clone(),
            sources.fear_greed_url.as_str(),
            sources.news_rss_url.as_str(),
            timeout,
        );

        Self {
            config,
            fetcher,
            gecko,
            fred,
            fed,
            fx,
            sentiment,
            documents,
            snapshots,
            currency_cache: RwLock::new(None),
        }
    }

    pub async fn cached_currency(&self) -> Option<CurrencyRates> {
        self.currency_cache.read().await.clone()
    }

    pub async fn cache_currency(&self, rates: CurrencyRates) {
        *self.currency_cache.write().await = Some(rates);
    }
}
