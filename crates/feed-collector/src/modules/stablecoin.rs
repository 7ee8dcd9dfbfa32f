//! 스테이블코인 판별.
//!
//! 다음 중 하나면 스테이블코인으로 봅니다:
//! 1. ID 또는 심볼이 고정 목록에 있음
//! 2. 심볼/이름에 키워드가 있고 가격이 [0.95, 1.05] 범위
//! 3. 심볼이 `^[a-z]*usd[a-z]*\d+$` 형태 (예: `usdt0`, `susd3`)
//!
//! 휴리스틱이며 결정적입니다. 같은 입력은 항상 같은 결과를 냅니다.

use regex::Regex;
use std::sync::OnceLock;

const DENY_IDS: &[&str] = &[
    "tether",
    "usd-coin",
    "dai",
    "binance-usd",
    "true-usd",
    "paxos-standard",
    "first-digital-usd",
    "ethena-usde",
    "usds",
    "frax",
    "paypal-usd",
    "gemini-dollar",
    "liquity-usd",
    "usdd",
    "crvusd",
    "gho",
    "nusd",
    "euro-coin",
    "stasis-eurs",
    "tether-eurt",
    "bridged-usdc-polygon-pos-bridge",
    "binance-bridged-usdt-bnb-smart-chain",
];

const DENY_SYMBOLS: &[&str] = &[
    "usdt", "usdc", "dai", "busd", "tusd", "usdp", "fdusd", "usde", "usds", "frax", "pyusd",
    "gusd", "lusd", "usdd", "crvusd", "gho", "susd", "eurc", "eurs", "eurt", "usdy", "usd0",
    "rlusd", "usdx", "musd", "dola",
];

const KEYWORDS: &[&str] = &["usd", "stable", "dollar", "eur", "peg"];

const PEG_RANGE: (f64, f64) = (0.95, 1.05);

fn numbered_usd_symbol() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]*usd[a-z]*\d+$").ok())
        .as_ref()
}

/// 스테이블코인 여부.
pub fn is_stablecoin(id: &str, symbol: &str, name: &str, price: Option<f64>) -> bool {
    let id = id.to_ascii_lowercase();
    let symbol = symbol.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();

    if DENY_IDS.contains(&id.as_str()) || DENY_SYMBOLS.contains(&symbol.as_str()) {
        return true;
    }

    let has_keyword = KEYWORDS
        .iter()
        .any(|k| symbol.contains(k) || name.contains(k));
    let near_peg = price.is_some_and(|p| p >= PEG_RANGE.0 && p <= PEG_RANGE.1);
    if has_keyword && near_peg {
        return true;
    }

    numbered_usd_symbol().is_some_and(|re| re.is_match(&symbol))
}
