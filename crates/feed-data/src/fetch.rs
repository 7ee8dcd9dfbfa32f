//! 릴레이 경유 HTTP 요청 계층.
//!
//! 모든 요청은 명시적인 deadline을 가지며, 만료되면 해당 요청만 취소됩니다.
//! 업스트림 한도 초과(429, HTML 본문의 5xx)는 [`FetchError::RateLimited`]로 구분되어
//! [`ResilientFetcher::request_with_rate_limit`]에서 cooldown 후 한 번만 재시도됩니다.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::relay::{RelayEndpoint, RelayHealthTracker};

/// HTTP 요청 오류.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("요청 타임아웃 ({0:?})")]
    Timeout(Duration),

    #[error("네트워크 오류: {0}")]
    Network(String),

    /// `disguised`는 HTML 본문의 5xx로 위장된 한도 초과
    #[error("Rate limit 초과 (disguised: {disguised})")]
    RateLimited { disguised: bool },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("응답 디코딩 실패: {0}")]
    Decode(String),

    #[error("잘못된 URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// 재시도 가능한 오류인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) | FetchError::RateLimited { .. } => {
                true
            }
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Decode(_) | FetchError::InvalidUrl(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    /// 릴레이 자체의 장애로 볼 수 있는 오류인지 확인합니다.
    pub fn is_relay_failure(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 403 || *status == 407,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// 요청별 옵션.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(ACCEPT, HeaderValue::from_static("application/json, text/html, */*"));
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => debug!(header = %name, "유효하지 않은 헤더 무시"),
            }
        }
        map
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }
}

/// 성공(2xx) 응답.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    /// 경유한 릴레이 (직접 요청이면 `None`)
    pub via_relay: Option<RelayEndpoint>,
}

impl FetchResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

/// 본문이 HTML 문서로 보이는지 확인합니다.
fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<head")
}

/// 릴레이 순환과 한도 초과 처리를 포함한 HTTP 클라이언트.
pub struct ResilientFetcher {
    client: Client,
    tracker: Arc<RelayHealthTracker>,
    cooldown: Duration,
    /// 단건 요청용 릴레이 순환 인덱스
    rotation: AtomicUsize,
}

impl ResilientFetcher {
    pub fn new(client: Client, tracker: Arc<RelayHealthTracker>, cooldown: Duration) -> Self {
        Self {
            client,
            tracker,
            cooldown,
            rotation: AtomicUsize::new(0),
        }
    }

    /// 설정값으로 HTTP 클라이언트를 생성합니다.
    pub fn build_client(config: &feed_core::FetchConfig) -> Result<Client, FetchError> {
        Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))
    }

    pub fn tracker(&self) -> &Arc<RelayHealthTracker> {
        &self.tracker
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 요청을 보냅니다.
    ///
    /// 릴레이가 주어지면 릴레이를 경유하고, 릴레이 장애 시 릴레이를 강등한 뒤
    /// 직접 요청으로 한 번 재시도합니다. 한도 초과 오류는 그대로 반환합니다.
    pub async fn request(
        &self,
        url: &str,
        options: &RequestOptions,
        relay: Option<&RelayEndpoint>,
    ) -> Result<FetchResponse, FetchError> {
        if let Some(relay) = relay {
            let relayed = relay.wrap(url);
            match self.send(&relayed, options).await {
                Ok(mut response) => {
                    self.tracker.mark_working(relay);
                    response.via_relay = Some(relay.clone());
                    return Ok(response);
                }
                Err(e) if e.is_relay_failure() => {
                    warn!(relay = %relay, url = %url, error = %e, "릴레이 실패, 직접 요청으로 재시도");
                    self.tracker.mark_failed(relay);
                }
                Err(e) => return Err(e),
            }
        }

        self.send(url, options).await
    }

    /// 한도 초과 시 cooldown 후 다른 릴레이로 정확히 한 번 재시도합니다.
    pub async fn request_with_rate_limit(
        &self,
        url: &str,
        options: &RequestOptions,
        batch_index: usize,
        batch_count: usize,
    ) -> Result<FetchResponse, FetchError> {
        let relay = self.tracker.select(batch_index, batch_count).await;

        match self.request(url, options, relay.as_ref()).await {
            Err(FetchError::RateLimited { disguised }) => {
                warn!(
                    url = %url,
                    relay = relay.as_ref().map(|r| r.as_str()).unwrap_or("direct"),
                    disguised,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Rate limit 감지, 대기 후 재시도"
                );
                tokio::time::sleep(self.cooldown).await;
                if let Some(relay) = &relay {
                    self.tracker.mark_failed(relay);
                }

                let retry_relay = self.tracker.select(batch_index + 1, batch_count).await;
                self.request(url, options, retry_relay.as_ref()).await
            }
            other => other,
        }
    }

    /// 배치에 속하지 않는 단건 요청. 호출마다 다음 릴레이를 사용합니다.
    pub async fn request_rotating(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<FetchResponse, FetchError> {
        let index = self.rotation.fetch_add(1, Ordering::Relaxed);
        let count = self.tracker.pool_size().max(1);
        self.request_with_rate_limit(url, options, index % count, count)
            .await
    }

    /// JSON 응답을 역직렬화합니다.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        batch_index: usize,
        batch_count: usize,
    ) -> Result<T, FetchError> {
        self.request_with_rate_limit(url, options, batch_index, batch_count)
            .await?
            .json()
    }

    async fn send(&self, url: &str, options: &RequestOptions) -> Result<FetchResponse, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let started = Instant::now();

        let call = async {
            let response = self
                .client
                .get(parsed)
                .headers(options.header_map())
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, FetchError>((status, body))
        };

        let (status, body) = tokio::time::timeout(options.timeout, call)
            .await
            .map_err(|_| FetchError::Timeout(options.timeout))??;

        debug!(
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "HTTP 응답"
        );

        if status.is_success() {
            return Ok(FetchResponse {
                status: status.as_u16(),
                body,
                via_relay: None,
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited { disguised: false });
        }
        if status.is_server_error() && looks_like_html(&body) {
            return Err(FetchError::RateLimited { disguised: true });
        }

        let message: String = body.chars().take(200).collect();
        Err(FetchError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayProbe, RelayStatus};
    use async_trait::async_trait;
    use mockito::Matcher;

    struct DeadProbe;

    #[async_trait]
    impl RelayProbe for DeadProbe {
        async fn probe(&self, _relay: &RelayEndpoint) -> bool {
            false
        }
    }

    fn fetcher(relays: Vec<RelayEndpoint>) -> ResilientFetcher {
        let tracker = Arc::new(RelayHealthTracker::new(relays, Box::new(DeadProbe), 3, 2));
        ResilientFetcher::new(Client::new(), tracker, Duration::ZERO)
    }

    fn opts() -> RequestOptions {
        RequestOptions::with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_html_detection() {
        assert!(looks_like_html("  <!DOCTYPE html><html>..."));
        assert!(looks_like_html("<html><head><title>502</title>"));
        assert!(!looks_like_html("{\"error\":\"bad gateway\"}"));
    }

    #[test]
    fn test_error_classification() {
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(FetchError::RateLimited { disguised: true }.is_retryable());
        assert!(!FetchError::Decode("x".into()).is_retryable());
        assert!(FetchError::Status { status: 502, message: String::new() }.is_relay_failure());
        assert!(!FetchError::Status { status: 404, message: String::new() }.is_relay_failure());
        assert!(!FetchError::RateLimited { disguised: false }.is_relay_failure());
    }

    #[tokio::test]
    async fn test_success_through_relay_promotes() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/api/ping", server.url());
        let relay = RelayEndpoint::new(format!("{}/relay-a?url={{url}}", server.url()));

        let mock = server
            .mock("GET", "/relay-a")
            .match_query(Matcher::UrlEncoded("url".into(), target.clone()))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let fetcher = fetcher(vec![relay.clone()]);
        let response = fetcher.request(&target, &opts(), Some(&relay)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.via_relay, Some(relay.clone()));
        assert_eq!(fetcher.tracker().status(&relay), RelayStatus::Working);
    }

    #[tokio::test]
    async fn test_relay_failure_demotes_and_retries_direct() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/api/ping", server.url());
        let relay = RelayEndpoint::new(format!("{}/relay-a?url={{url}}", server.url()));

        let relay_mock = server
            .mock("GET", "/relay-a")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body(r#"{"error":"upstream unreachable"}"#)
            .create_async()
            .await;
        let direct_mock = server
            .mock("GET", "/api/ping")
            .with_status(200)
            .with_body(r#"{"gecko_says":"(V3) To the Moon!"}"#)
            .create_async()
            .await;

        let fetcher = fetcher(vec![relay.clone()]);
        let response = fetcher.request(&target, &opts(), Some(&relay)).await.unwrap();

        relay_mock.assert_async().await;
        direct_mock.assert_async().await;
        assert!(response.via_relay.is_none());
        assert_eq!(fetcher.tracker().status(&relay), RelayStatus::Failed);
    }

    #[tokio::test]
    async fn test_disguised_rate_limit_is_detected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/coins")
            .with_status(503)
            .with_header("content-type", "text/html")
            .with_body("<!DOCTYPE html><html><body>Slow down</body></html>")
            .create_async()
            .await;

        let fetcher = fetcher(Vec::new());
        let err = fetcher
            .request(&format!("{}/api/coins", server.url()), &opts(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { disguised: true }));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_once_with_next_relay() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/api/coins", server.url());
        let relay_a = RelayEndpoint::new(format!("{}/relay-a?url={{url}}", server.url()));
        let relay_b = RelayEndpoint::new(format!("{}/relay-b?url={{url}}", server.url()));

        let a = server
            .mock("GET", "/relay-a")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let b = server
            .mock("GET", "/relay-b")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let fetcher = fetcher(vec![relay_a.clone(), relay_b.clone()]);
        fetcher.tracker().mark_working(&relay_a);
        fetcher.tracker().mark_working(&relay_b);

        let coins: Vec<serde_json::Value> = fetcher.get_json(&target, &opts(), 0, 2).await.unwrap();

        a.assert_async().await;
        b.assert_async().await;
        assert!(coins.is_empty());
        assert_eq!(fetcher.tracker().status(&relay_a), RelayStatus::Failed);
        assert_eq!(fetcher.tracker().status(&relay_b), RelayStatus::Working);
    }

    #[tokio::test]
    async fn test_second_rate_limit_is_returned() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/coins")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let fetcher = fetcher(Vec::new());
        let err = fetcher
            .request_with_rate_limit(&format!("{}/api/coins", server.url()), &opts(), 0, 1)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout() {
        // 연결은 수락되지만 응답하지 않는 소켓
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let fetcher = fetcher(Vec::new());
        let err = fetcher
            .request(
                &format!("http://{}/slow", addr),
                &RequestOptions::with_timeout(Duration::from_millis(100)),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
        assert!(err.is_retryable());
        drop(listener);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = fetcher(Vec::new());
        let err = fetcher.request("not a url", &opts(), None).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
