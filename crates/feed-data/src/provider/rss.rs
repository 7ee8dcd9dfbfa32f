//! RSS 피드 파서.
//!
//! `scraper`(HTML 파서)로 RSS를 읽기 위해 HTML에서 특수 취급되는 태그(`link`, `title`)와
//! CDATA 구간을 먼저 평범한 요소/텍스트로 바꿉니다. 형식이 어긋난 항목은 건너뜁니다.

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// RSS 항목.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

fn cdata_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").ok())
        .as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(/?)(title|link|pubDate|dc:date)(\s[^>]*)?>").ok())
        .as_ref()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// CDATA를 텍스트로 풀고 RSS 태그를 `rss-*` 요소로 바꿉니다.
fn normalize(xml: &str) -> String {
    let (Some(cdata), Some(tags)) = (cdata_regex(), tag_regex()) else {
        return xml.to_string();
    };
    let unwrapped = cdata.replace_all(xml, |caps: &regex::Captures| escape_text(&caps[1]));
    tags.replace_all(&unwrapped, |caps: &regex::Captures| {
        let name = match caps[2].to_ascii_lowercase().as_str() {
            "title" => "rss-title",
            "link" => "rss-link",
            _ => "rss-date",
        };
        // 속성은 버림 (`<atom:link .../>` 등 접두사 태그는 매칭되지 않음)
        format!("<{}{}>", &caps[1], name)
    })
    .into_owned()
}

fn child_text(item: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// RFC 2822 또는 RFC 3339 날짜를 파싱합니다.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// RSS 문서에서 항목들을 추출합니다.
pub fn parse_feed(xml: &str) -> Vec<FeedItem> {
    let document = Html::parse_document(&normalize(xml));

    let (Ok(item_sel), Ok(title_sel), Ok(link_sel), Ok(date_sel)) = (
        Selector::parse("item"),
        Selector::parse("rss-title"),
        Selector::parse("rss-link"),
        Selector::parse("rss-date"),
    ) else {
        return Vec::new();
    };

    document
        .select(&item_sel)
        .filter_map(|item| {
            let title = child_text(&item, &title_sel)?;
            Some(FeedItem {
                title,
                link: child_text(&item, &link_sel),
                published_at: child_text(&item, &date_sel).and_then(|d| parse_feed_date(&d)),
            })
        })
        .collect()
}
