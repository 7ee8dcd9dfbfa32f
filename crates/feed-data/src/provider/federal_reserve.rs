//! 연준 보도자료 RSS 및 FOMC 일정 페이지.
//!
//! ## 데이터 소스
//! - 통화정책 보도자료 RSS: 마지막 FOMC 성명 발표 시각
//! - FOMC 캘린더 HTML: 회의 일정 (결정일 = 회의 마지막 날 14:00 America/New_York)
//!
//! 페이지 구조가 바뀌면 해당 항목을 건너뛰고 빈 결과를 반환합니다.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::rss::{parse_feed, FeedItem};
use crate::error::Result;
use crate::fetch::{RequestOptions, ResilientFetcher};

/// 정책 결정 발표 시각 (뉴욕 현지).
const DECISION_HOUR: u32 = 14;

fn year_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})\s+FOMC\s+Meetings").ok())
        .as_ref()
}

fn day_range_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})(?:\s*[-\u{2013}]\s*(\d{1,2}))?").ok())
        .as_ref()
}

fn month_number(text: &str) -> Option<u32> {
    // "Apr/May" 처럼 걸친 회의는 마지막 달 기준
    let name = text.rsplit('/').next()?.trim().to_ascii_lowercase();
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// 결정일의 14:00 (뉴욕)을 UTC로 변환합니다.
pub fn decision_time(date: NaiveDate) -> Option<DateTime<Utc>> {
    let local = date.and_hms_opt(DECISION_HOUR, 0, 0)?;
    New_York
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn text_of(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
}

/// FOMC 캘린더 페이지에서 결정 시각 목록을 추출합니다 (오름차순).
pub fn parse_fomc_calendar(html: &str) -> Vec<DateTime<Utc>> {
    let (Some(year_re), Some(day_re)) = (year_regex(), day_range_regex()) else {
        return Vec::new();
    };
    let (Ok(panel_sel), Ok(heading_sel), Ok(meeting_sel), Ok(month_sel), Ok(date_sel)) = (
        Selector::parse("div.panel"),
        Selector::parse(".panel-heading"),
        Selector::parse(".fomc-meeting"),
        Selector::parse(".fomc-meeting__month"),
        Selector::parse(".fomc-meeting__date"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut decisions = Vec::new();

    for panel in document.select(&panel_sel) {
        let Some(year) = text_of(&panel, &heading_sel)
            .and_then(|heading| year_re.captures(&heading).map(|c| c[1].to_string()))
            .and_then(|y| y.parse::<i32>().ok())
        else {
            continue;
        };

        for meeting in panel.select(&meeting_sel) {
            let month = text_of(&meeting, &month_sel).and_then(|m| month_number(&m));
            let day = text_of(&meeting, &date_sel).and_then(|d| {
                let caps = day_re.captures(&d)?;
                caps.get(2)
                    .or_else(|| caps.get(1))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
            });

            match (month, day) {
                (Some(month), Some(day)) => {
                    if let Some(at) =
                        NaiveDate::from_ymd_opt(year, month, day).and_then(decision_time)
                    {
                        decisions.push(at);
                    }
                }
                _ => debug!(year, "FOMC 회의 항목 형식 불일치, 건너뜀"),
            }
        }
    }

    decisions.sort();
    decisions.dedup();
    decisions
}

/// `now` 이후 첫 결정 시각.
pub fn next_decision_after(decisions: &[DateTime<Utc>], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    decisions.iter().copied().find(|at| *at > now)
}

/// 가장 최근 FOMC 성명 보도자료의 발표 시각.
pub fn latest_statement(items: &[FeedItem]) -> Option<DateTime<Utc>> {
    items
        .iter()
        .filter(|item| item.title.to_ascii_lowercase().contains("fomc statement"))
        .filter_map(|item| item.published_at)
        .max()
}

/// 연준 웹 소스 클라이언트.
pub struct FederalReserveClient {
    fetcher: Arc<ResilientFetcher>,
    rss_url: String,
    calendar_url: String,
    timeout: Duration,
}

impl FederalReserveClient {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        rss_url: impl Into<String>,
        calendar_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            rss_url: rss_url.into(),
            calendar_url: calendar_url.into(),
            timeout,
        }
    }

    /// 통화정책 보도자료 항목.
    pub async fn fetch_press_items(&self) -> Result<Vec<FeedItem>> {
        let response = self
            .fetcher
            .request_rotating(&self.rss_url, &RequestOptions::with_timeout(self.timeout))
            .await?;
        let items = parse_feed(response.text());
        if items.is_empty() {
            warn!(url = %self.rss_url, "연준 RSS에서 항목을 찾지 못함");
        }
        Ok(items)
    }

    /// FOMC 결정 시각 목록.
    pub async fn fetch_meeting_decisions(&self) -> Result<Vec<DateTime<Utc>>> {
        let response = self
            .fetcher
            .request_rotating(&self.calendar_url, &RequestOptions::with_timeout(self.timeout))
            .await?;
        let decisions = parse_fomc_calendar(response.text());
        if decisions.is_empty() {
            warn!(url = %self.calendar_url, "FOMC 캘린더에서 일정을 찾지 못함");
        }
        Ok(decisions)
    }
}
