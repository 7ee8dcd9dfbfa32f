//! 설정 관리.
//!
//! 기본값 → 설정 파일(`config/feed.toml`, 선택) → 환경 변수(`FEED__SECTION__KEY`) 순으로
//! 덮어씁니다. `DATABASE_URL`, `FRED_API_KEY`, `COINGECKO_API_KEY`는 섹션 값이 비어 있을 때만
//! 사용됩니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{FeedError, FeedResult};

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

/// 명시적인 릴레이 설정이 없을 때 사용하는 기본 릴레이 풀.
///
/// `{url}` 자리에 퍼센트 인코딩된 대상 URL이 들어갑니다.
pub const BUILTIN_RELAYS: &[&str] = &[
    "https://corsproxy.io/?url={url}",
    "https://api.allorigins.win/raw?url={url}",
    "https://api.codetabs.com/v1/proxy?quest={url}",
    "https://thingproxy.freeboard.io/fetch/{url}",
];

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
    pub fetch: FetchConfig,
    pub listing: ListingConfig,
    pub backfill: SupplyBackfillConfig,
    pub supply: SupplyTrackingConfig,
    pub sources: SourceConfig,
    pub scheduler: SchedulerConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL (없으면 `DATABASE_URL`)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// 릴레이 풀 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 릴레이 URL 템플릿 목록 (비어 있으면 [`BUILTIN_RELAYS`])
    pub endpoints: Vec<String>,
    /// 생존 확인(probe) 타임아웃 (초)
    pub probe_timeout_secs: u64,
    /// 선택된 릴레이가 실패 상태일 때 탐색할 최대 probe 수
    pub max_probes: usize,
    /// 미검증 릴레이 probe 실패 후 대체 탐색 수
    pub max_alternates: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            probe_timeout_secs: 8,
            max_probes: 3,
            max_alternates: 2,
        }
    }
}

impl RelayConfig {
    /// 실제로 사용할 릴레이 풀. 명시적 설정이 우선합니다.
    pub fn pool(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .endpoints
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if configured.is_empty() {
            BUILTIN_RELAYS.iter().map(|s| s.to_string()).collect()
        } else {
            configured
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// HTTP 요청 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// 일반 요청 타임아웃 (초)
    pub default_timeout_secs: u64,
    /// 리스팅 페이지 요청 타임아웃 (초)
    pub page_timeout_secs: u64,
    /// 코인 상세 요청 타임아웃 (초)
    pub detail_timeout_secs: u64,
    /// 429 수신 후 재시도 전 대기 (초)
    pub rate_limit_cooldown_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            default_timeout_secs: 30,
            page_timeout_secs: 60,
            detail_timeout_secs: 20,
            rate_limit_cooldown_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

/// 코인 리스팅 수집 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingConfig {
    /// 페이지당 코인 수
    pub per_page: u32,
    /// 항상 수집하는 기본 페이지 수
    pub core_pages: u32,
    /// 보충 수집 포함 최대 페이지 수
    pub max_pages: u32,
    /// 최종 리스팅 크기
    pub target_count: usize,
    /// 기본 페이지 간 딜레이 (밀리초)
    pub inter_page_delay_ms: u64,
    /// 보충 페이지 딜레이 단위 (밀리초, 페이지마다 배수로 증가)
    pub backfill_page_delay_ms: u64,
    /// 전체 페이지 실패 시 추가 재시도 횟수
    pub retry_attempts: u32,
    /// 재시도 지수 백오프 기본값 (밀리초)
    pub retry_base_delay_ms: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            core_pages: 5,
            max_pages: 10,
            target_count: 500,
            inter_page_delay_ms: 2_000,
            backfill_page_delay_ms: 3_000,
            retry_attempts: 2,
            retry_base_delay_ms: 5_000,
        }
    }
}

impl ListingConfig {
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    /// `step`번째(1부터) 보충 페이지 전 대기 시간.
    pub fn backfill_page_delay(&self, step: u32) -> Duration {
        Duration::from_millis(self.backfill_page_delay_ms.saturating_mul(step.max(1) as u64))
    }

    /// `attempt`번째(1부터) 전체 재시도 전 대기 시간.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// 공급량 상세 조회(backfill) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupplyBackfillConfig {
    /// 보충 대상 상위 순위 수
    pub top_n: usize,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub item_delay_ms: u64,
    /// 항목당 추가 재시도 횟수
    pub max_retries: u32,
    /// 전체 단계 시간 예산 (초)
    pub budget_secs: u64,
}

impl Default for SupplyBackfillConfig {
    fn default() -> Self {
        Self {
            top_n: 200,
            batch_size: 10,
            batch_delay_ms: 5_000,
            item_delay_ms: 1_000,
            max_retries: 2,
            budget_secs: 120,
        }
    }
}

impl SupplyBackfillConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

/// 공급량 스냅샷 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupplyTrackingConfig {
    /// 스냅샷 버킷 크기 (분)
    pub bucket_minutes: u32,
    /// 보관 기간 (일)
    pub retention_days: i64,
    /// 변화량 계산 시 읽는 최대 스냅샷 수
    pub history_limit: i64,
}

impl Default for SupplyTrackingConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 5,
            retention_days: 30,
            history_limit: 1_000,
        }
    }
}

/// 외부 데이터 소스 URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub fred_base_url: String,
    pub fred_api_key: Option<String>,
    pub fed_rss_url: String,
    pub fed_calendar_url: String,
    pub fx_url: String,
    pub fear_greed_url: String,
    pub news_rss_url: String,
    /// 저장할 최대 뉴스 수
    pub news_limit: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            coingecko_api_key: None,
            fred_base_url: "https://api.stlouisfed.org/fred".to_string(),
            fred_api_key: None,
            fed_rss_url: "https://www.federalreserve.gov/feeds/press_monetary.xml".to_string(),
            fed_calendar_url: "https://www.federalreserve.gov/monetarypolicy/fomccalendars.htm"
                .to_string(),
            fx_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            fear_greed_url: "https://api.alternative.me/fng/?limit=1".to_string(),
            news_rss_url: "https://www.coindesk.com/arc/outboundfeeds/rss/".to_string(),
            news_limit: 30,
        }
    }
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 시작 직후 한 번씩 실행
    pub run_on_start: bool,
    pub core_minutes: u32,
    pub sentiment_minutes: u32,
    pub news_minutes: u32,
    pub trending_minutes: u32,
    pub enable_core: bool,
    pub enable_sentiment: bool,
    pub enable_news: bool,
    pub enable_trending: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_on_start: true,
            core_minutes: 5,
            sentiment_minutes: 10,
            news_minutes: 10,
            trending_minutes: 30,
            enable_core: true,
            enable_sentiment: true,
            enable_news: true,
            enable_trending: true,
        }
    }
}

impl FeedConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> FeedResult<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("FEED")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("relay.endpoints")
                    .try_parsing(true),
            );

        let mut config: FeedConfig = builder.build()?.try_deserialize()?;

        if config.database.url.is_none() {
            config.database.url = std::env::var("DATABASE_URL").ok();
        }
        if config.sources.fred_api_key.is_none() {
            config.sources.fred_api_key = std::env::var("FRED_API_KEY").ok();
        }
        if config.sources.coingecko_api_key.is_none() {
            config.sources.coingecko_api_key = std::env::var("COINGECKO_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> FeedResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> FeedResult<()> {
        if self.listing.per_page == 0 || self.listing.core_pages == 0 {
            return Err(FeedError::Config(
                "listing.per_page / listing.core_pages 는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.listing.max_pages < self.listing.core_pages {
            return Err(FeedError::Config(format!(
                "listing.max_pages({}) < listing.core_pages({})",
                self.listing.max_pages, self.listing.core_pages
            )));
        }
        if self.backfill.batch_size == 0 {
            return Err(FeedError::Config("backfill.batch_size 는 0보다 커야 합니다".to_string()));
        }
        if self.supply.bucket_minutes == 0 || self.supply.retention_days <= 0 {
            return Err(FeedError::Config(
                "supply.bucket_minutes / supply.retention_days 는 0보다 커야 합니다".to_string(),
            ));
        }
        let cadences = [
            self.scheduler.core_minutes,
            self.scheduler.sentiment_minutes,
            self.scheduler.news_minutes,
            self.scheduler.trending_minutes,
        ];
        if cadences.iter().any(|m| *m == 0) {
            return Err(FeedError::Config("스케줄러 주기는 0분일 수 없습니다".to_string()));
        }
        Ok(())
    }
}
