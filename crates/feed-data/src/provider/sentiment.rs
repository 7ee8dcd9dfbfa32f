//! 공포/탐욕 지수 및 뉴스 헤드라인.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use feed_core::{FearGreedData, NewsItem};

use super::rss::parse_feed;
use crate::error::{DataError, Result};
use crate::fetch::{RequestOptions, ResilientFetcher};

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    #[serde(default)]
    data: Vec<FearGreedEntry>,
}

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
    value_classification: String,
    timestamp: String,
}

/// `fng` 응답에서 최신 값을 추출합니다.
pub fn parse_fear_greed(body: &str) -> Result<FearGreedData> {
    let response: FearGreedResponse = serde_json::from_str(body)?;
    let latest = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| DataError::NoData("fear & greed".to_string()))?;

    let value: u8 = latest
        .value
        .trim()
        .parse()
        .map_err(|_| DataError::ParseError(format!("fear & greed value: {}", latest.value)))?;
    let timestamp = latest
        .timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .ok_or_else(|| DataError::ParseError(format!("fear & greed timestamp: {}", latest.timestamp)))?;

    Ok(FearGreedData {
        value: value.min(100),
        classification: latest.value_classification,
        timestamp,
    })
}

/// 피드 URL의 호스트를 출처 이름으로 사용합니다.
fn source_name(feed_url: &str) -> String {
    url::Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| feed_url.to_string())
}

/// RSS 본문을 뉴스 항목으로 변환합니다 (최신순, 최대 `limit`개).
pub fn parse_news(body: &str, feed_url: &str, limit: usize) -> Vec<NewsItem> {
    let source = source_name(feed_url);
    let mut items: Vec<NewsItem> = parse_feed(body)
        .into_iter()
        .map(|item| NewsItem {
            title: item.title,
            link: item.link,
            published_at: item.published_at,
            source: source.clone(),
        })
        .collect();

    // 발행 시각 없는 항목은 뒤로
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);
    items
}

/// 시장 심리 소스 클라이언트.
pub struct SentimentClient {
    fetcher: Arc<ResilientFetcher>,
    fear_greed_url: String,
    news_url: String,
    timeout: Duration,
}

impl SentimentClient {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        fear_greed_url: impl Into<String>,
        news_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            fear_greed_url: fear_greed_url.into(),
            news_url: news_url.into(),
            timeout,
        }
    }

    pub async fn fetch_fear_greed(&self) -> Result<FearGreedData> {
        let response = self
            .fetcher
            .request_rotating(&self.fear_greed_url, &RequestOptions::with_timeout(self.timeout))
            .await?;
        parse_fear_greed(response.text())
    }

    pub async fn fetch_news(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let response = self
            .fetcher
            .request_rotating(&self.news_url, &RequestOptions::with_timeout(self.timeout))
            .await?;
        Ok(parse_news(response.text(), &self.news_url, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_fear_greed() {
        let body = r#"{"name":"Fear and Greed Index","data":[
            {"value":"72","value_classification":"Greed","timestamp":"1735689600","time_until_update":"3600"}
        ]}"#;
        let fg = parse_fear_greed(body).unwrap();
        assert_eq!(fg.value, 72);
        assert_eq!(fg.classification, "Greed");
        assert_eq!(fg.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_fear_greed_empty() {
        assert!(matches!(parse_fear_greed(r#"{"data":[]}"#), Err(DataError::NoData(_))));
    }

    #[test]
    fn test_parse_news_orders_and_limits() {
        let body = r#"<rss><channel>
            <item><title>Old</title><pubDate>Mon, 30 Dec 2024 10:00:00 GMT</pubDate></item>
            <item><title>Undated</title></item>
            <item><title>New</title><link>https://news.example/new</link><pubDate>Tue, 31 Dec 2024 10:00:00 GMT</pubDate></item>
        </channel></rss>"#;
        let news = parse_news(body, "https://www.news.example/rss/", 2);
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].title, "New");
        assert_eq!(news[0].source, "news.example");
        assert_eq!(news[1].title, "Old");
    }
}
