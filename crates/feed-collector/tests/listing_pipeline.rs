//! 리스팅 파이프라인 통합 테스트 (mockito 업스트림 + 릴레이).

use async_trait::async_trait;
use chrono::Utc;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use feed_collector::modules::sync_listing;
use feed_collector::CollectorContext;
use feed_core::{Dataset, FeedConfig, ListingRecord};
use feed_data::storage::{load_typed, save_typed};
use feed_data::{
    DocumentStore, MemoryDocumentStore, MemorySnapshotStore, RelayEndpoint, RelayHealthTracker,
    RelayProbe, RelayStatus, ResilientFetcher, SnapshotStore,
};

struct NoProbe;

#[async_trait]
impl RelayProbe for NoProbe {
    async fn probe(&self, _relay: &RelayEndpoint) -> bool {
        false
    }
}

fn fast_config(server: &Server) -> FeedConfig {
    let mut config = FeedConfig::default();
    config.sources.coingecko_base_url = format!("{}/api/v3", server.url());
    config.listing.per_page = 2;
    config.listing.core_pages = 5;
    config.listing.max_pages = 5;
    config.listing.target_count = 10;
    config.listing.inter_page_delay_ms = 0;
    config.listing.backfill_page_delay_ms = 0;
    config.listing.retry_attempts = 0;
    config.listing.retry_base_delay_ms = 0;
    config.backfill.batch_delay_ms = 0;
    config.backfill.item_delay_ms = 0;
    config
}

/// 모든 릴레이를 working 상태로 둔 컨텍스트.
fn context(
    config: FeedConfig,
    relays: &[RelayEndpoint],
) -> (CollectorContext, Arc<MemoryDocumentStore>, Arc<ResilientFetcher>) {
    let tracker = Arc::new(RelayHealthTracker::new(relays.to_vec(), Box::new(NoProbe), 3, 2));
    for relay in relays {
        tracker.mark_working(relay);
    }
    let fetcher = Arc::new(ResilientFetcher::new(
        reqwest::Client::new(),
        tracker,
        Duration::ZERO,
    ));
    let documents = Arc::new(MemoryDocumentStore::new());
    let ctx = CollectorContext::with_fetcher(
        config,
        fetcher.clone(),
        documents.clone() as Arc<dyn DocumentStore>,
        Arc::new(MemorySnapshotStore::new()) as Arc<dyn SnapshotStore>,
    );
    (ctx, documents, fetcher)
}

fn coin(id: &str, symbol: &str, price: f64, max_supply: Option<f64>) -> serde_json::Value {
    json!({
        "id": id,
        "symbol": symbol,
        "name": id,
        "image": format!("https://img.example/{}.png", id),
        "current_price": price,
        "market_cap": price * 1000.0,
        "total_volume": 10.0,
        "price_change_percentage_24h": 1.5,
        "circulating_supply": 1000.0,
        "total_supply": 2000.0,
        "max_supply": max_supply,
        "sparkline_in_7d": {"price": [1.0, null, 2.0]}
    })
}

async fn listing(store: &MemoryDocumentStore) -> Vec<ListingRecord> {
    load_typed(store, Dataset::CryptoList)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_rate_limited_page_is_skipped_after_one_retry() {
    let mut server = Server::new_async().await;
    let relay_a = RelayEndpoint::new(format!("{}/relay-a?url={{url}}", server.url()));
    let relay_b = RelayEndpoint::new(format!("{}/relay-b?url={{url}}", server.url()));
    let mut config = fast_config(&server);
    config.backfill.top_n = 0;
    let (ctx, documents, fetcher) = context(config, &[relay_a.clone(), relay_b.clone()]);

    let pages = [
        (1, vec![coin("bitcoin", "btc", 95_000.0, Some(21e6)), coin("tether", "usdt", 1.0, None)]),
        (3, vec![coin("ethereum", "eth", 3_300.0, None), coin("bitcoin", "btc", 95_000.0, Some(21e6))]),
        (4, vec![coin("solana", "sol", 190.0, None), coin("ripple", "xrp", 2.1, Some(1e11))]),
        (5, vec![coin("cardano", "ada", 0.9, Some(45e9)), coin("dogecoin", "doge", 0.3, None)]),
    ];

    let mut page_mocks = Vec::new();
    for (page, coins) in &pages {
        let mock = server
            .mock("GET", "/relay-a")
            .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.markets_url(*page)))
            .with_body(serde_json::Value::Array(coins.clone()).to_string())
            .expect(1)
            .create_async()
            .await;
        page_mocks.push(mock);
    }

    // 2페이지: 릴레이 b에서 429, 재시도한 릴레이 a에서도 429
    let page2_b = server
        .mock("GET", "/relay-b")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;
    let page2_a = server
        .mock("GET", "/relay-a")
        .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.markets_url(2)))
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    // 한도 초과 페이지는 직접 요청으로 재시도하지 않음
    let direct = server
        .mock("GET", "/api/v3/coins/markets")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let summary = sync_listing(&ctx).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.skipped, 1);

    page2_b.assert_async().await;
    page2_a.assert_async().await;
    direct.assert_async().await;
    for mock in &page_mocks {
        mock.assert_async().await;
    }

    let records = listing(&documents).await;
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["bitcoin", "ethereum", "solana", "ripple", "cardano", "dogecoin"]
    );
    let ranks: Vec<u32> = records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(records[0].symbol, "BTC");
    assert_eq!(records[0].sparkline_7d, vec![1.0, 2.0]);
    assert_eq!(summary.count, 6);

    // 한도 초과를 낸 릴레이 b만 강등
    let tracker = fetcher.tracker();
    assert_eq!(tracker.status(&relay_b), RelayStatus::Failed);
    assert_eq!(tracker.status(&relay_a), RelayStatus::Working);
}

#[tokio::test]
async fn test_supply_backfill_with_prior_fallback() {
    let mut server = Server::new_async().await;
    let relay = RelayEndpoint::new(format!("{}/relay-a?url={{url}}", server.url()));

    let mut config = fast_config(&server);
    config.listing.core_pages = 1;
    config.listing.max_pages = 1;
    config.backfill.top_n = 10;
    let (ctx, documents, _) = context(config, std::slice::from_ref(&relay));

    let mut eth = coin("ethereum", "eth", 3_300.0, None);
    eth["total_supply"] = serde_json::Value::Null;
    let mut sol = coin("solana", "sol", 190.0, None);
    sol["total_supply"] = serde_json::Value::Null;

    server
        .mock("GET", "/relay-a")
        .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.markets_url(1)))
        .with_body(json!([coin("bitcoin", "btc", 95_000.0, Some(21e6)), eth, sol]).to_string())
        .create_async()
        .await;

    // 비트코인은 공급량이 모두 있어 상세 조회 대상이 아님
    let btc_detail = server
        .mock("GET", "/relay-a")
        .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.detail_url("bitcoin")))
        .expect(0)
        .create_async()
        .await;
    server
        .mock("GET", "/relay-a")
        .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.detail_url("ethereum")))
        .with_body(r#"{"id":"ethereum","market_data":{"total_supply":120000000.0,"max_supply":null}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/relay-a")
        .match_query(Matcher::UrlEncoded("url".into(), ctx.gecko.detail_url("solana")))
        .with_body(r#"{"id":"solana","market_data":{"total_supply":600000000.0,"max_supply":null}}"#)
        .create_async()
        .await;

    // 이전 사이클에서 이더리움 최대 공급량을 알고 있었음
    let prior = vec![ListingRecord {
        id: "ethereum".to_string(),
        name: "Ethereum".to_string(),
        symbol: "ETH".to_string(),
        image: String::new(),
        current_price: 3_000.0,
        price_change_percentage_24h: 0.0,
        market_cap: 0.0,
        total_volume: 0.0,
        rank: 2,
        circulating_supply: 1000.0,
        total_supply: Some(1.0),
        max_supply: Some(999.0),
        sparkline_7d: Vec::new(),
    }];
    save_typed(documents.as_ref(), Dataset::CryptoList, &prior, Utc::now())
        .await
        .unwrap();

    sync_listing(&ctx).await.unwrap();
    btc_detail.assert_async().await;

    let records = listing(&documents).await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].max_supply, Some(21e6));

    // 상세 조회 값이 이전 값보다 우선
    assert_eq!(records[1].total_supply, Some(120_000_000.0));
    assert_eq!(records[1].max_supply, Some(999.0));

    assert_eq!(records[2].total_supply, Some(600_000_000.0));
    assert_eq!(records[2].max_supply, None);
}

#[tokio::test]
async fn test_all_pages_failing_keeps_previous_listing() {
    let mut server = Server::new_async().await;
    let mut config = fast_config(&server);
    config.listing.core_pages = 1;
    config.listing.max_pages = 1;
    config.listing.retry_attempts = 1;
    let (ctx, documents, _) = context(config, &[]);

    let markets = server
        .mock("GET", "/api/v3/coins/markets")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"error":"internal"}"#)
        .expect(2)
        .create_async()
        .await;

    let prior = vec![ListingRecord {
        id: "bitcoin".to_string(),
        name: "Bitcoin".to_string(),
        symbol: "BTC".to_string(),
        image: String::new(),
        current_price: 90_000.0,
        price_change_percentage_24h: 0.0,
        market_cap: 0.0,
        total_volume: 0.0,
        rank: 1,
        circulating_supply: 19_800_000.0,
        total_supply: None,
        max_supply: None,
        sparkline_7d: Vec::new(),
    }];
    save_typed(documents.as_ref(), Dataset::CryptoList, &prior, Utc::now())
        .await
        .unwrap();

    assert!(sync_listing(&ctx).await.is_err());
    markets.assert_async().await;
    assert_eq!(listing(&documents).await, prior);
}
