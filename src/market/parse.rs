//! Classification of market questions and slugs.
//!
//! Catalog collaborators sometimes hand over only a question string
//! ("Will Bitcoin be above $103,000 at 3PM ET?") or a slug
//! (`btc-updown-15m-1739106000`). These helpers recover the asset, the
//! contract kind and the period from them.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};

use super::types::MarketKind;

static ASSET_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("BTC", r"(?i)\b(bitcoin|btc)\b"),
        ("ETH", r"(?i)\b(ethereum|eth)\b"),
        ("SOL", r"(?i)\b(solana|sol)\b"),
        ("XRP", r"(?i)\b(ripple|xrp)\b"),
    ]
    .into_iter()
    .map(|(asset, pattern)| (asset, Regex::new(pattern).expect("valid regex")))
    .collect()
});

static UPDOWN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)up or down|up/down|higher or lower").expect("valid regex")
});

static TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\s*(k)?\b").expect("valid regex")
});

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+)-updown-(\d+)m-(\d+)$").expect("valid regex")
});

/// Detect the underlying asset mentioned in a question.
///
/// Word boundaries keep "Netherlands" from matching ETH.
pub fn detect_asset(question: &str) -> Option<&'static str> {
    ASSET_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(question))
        .map(|(asset, _)| *asset)
}

/// Extract a dollar target such as `$103,000`, `$103000.50` or `$103k`.
pub fn extract_target_price(question: &str) -> Option<Decimal> {
    let captures = TARGET_PATTERN.captures(question)?;
    let whole = captures.get(1)?.as_str().replace(',', "");
    let fraction = captures.get(2).map_or("", |m| m.as_str());
    let mut price: Decimal = format!("{whole}{fraction}").parse().ok()?;
    if captures.get(3).is_some() {
        price *= Decimal::ONE_THOUSAND;
    }
    (price > Decimal::ZERO).then_some(price)
}

/// Classify a question into a contract kind.
///
/// Up/down phrasing wins over a dollar amount; up/down markets start without
/// a reference price.
pub fn classify_question(question: &str) -> Option<MarketKind> {
    if UPDOWN_PATTERN.is_match(question) {
        return Some(MarketKind::UpDown {
            reference_price: None,
        });
    }
    extract_target_price(question).map(|target_price| MarketKind::PriceTarget { target_price })
}

/// Parsed `{asset}-updown-{N}m-{start}` slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpDownSlug {
    /// Upper-cased asset symbol.
    pub asset: String,
    /// Period start.
    pub period_start: OffsetDateTime,
    /// Period end.
    pub period_end: OffsetDateTime,
}

/// Parse an up/down slug such as `btc-updown-15m-1739106000`.
pub fn parse_updown_slug(slug: &str) -> Option<UpDownSlug> {
    let captures = SLUG_PATTERN.captures(slug)?;
    let asset = captures.get(1)?.as_str().to_uppercase();
    let minutes: i64 = captures.get(2)?.as_str().parse().ok()?;
    let start: i64 = captures.get(3)?.as_str().parse().ok()?;
    if minutes <= 0 {
        return None;
    }

    let period_start = OffsetDateTime::from_unix_timestamp(start).ok()?;
    let period_end = period_start.checked_add(Duration::seconds(minutes.checked_mul(60)?))?;
    Some(UpDownSlug {
        asset,
        period_start,
        period_end,
    })
}
