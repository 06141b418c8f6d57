//! Price recognition
//!
//! Three notations appear on the forum:
//! - `AH:<n>`: auction high-bid shorthand
//! - `OK:<n>`: buy-now shorthand
//! - Euro prices: `450€`, `450 eur`, `€450`, or a `HIND` / `MÜÜK` prefix

use crate::extract::models::model_number_spans;
use crate::model::Currency;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Lowest Euro amount accepted as a price
pub const MIN_EURO_PRICE: f64 = 50.0;

/// Highest Euro amount accepted as a price
pub const MAX_EURO_PRICE: f64 = 5000.0;

static AH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAH\s*:\s*(\d+(?:[.,]\d{1,2})?)").unwrap());

static OK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOK\s*:\s*(\d+(?:[.,]\d{1,2})?)").unwrap());

/// An amount: `450`, `299,50`, or with thousands groups `1 200` / `1.200,50`
const AMOUNT: &str = r"(\d{1,3}(?:[ \x{A0}.]\d{3})+(?:,\d{1,2})?|\d+(?:[.,]\d{1,2})?)";

static EURO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 450€, 450 eur, 450 eurot; never across a line break
        format!(r"(?i)\b{}[ \t]*(?:€|eur(?:ot|o)?\b)", AMOUNT),
        // €450
        format!(r"€\s*{}", AMOUNT),
        // Hind: 450, MÜÜK 450
        format!(r"(?i)\b(?:hind|müük)\s*[:\-]?\s*{}", AMOUNT),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static DOT_THOUSANDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?$").unwrap());

/// A price found in post text
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtractedPrice {
    pub price: f64,
    pub currency: Currency,
    pub ah_price: Option<f64>,
    pub ok_price: Option<f64>,
}

/// Extracts the price quoted in a post
///
/// At most one price is returned. A Euro price within
/// [`MIN_EURO_PRICE`, `MAX_EURO_PRICE`] wins (the first one in text order);
/// AH/OK values found alongside it ride along as auxiliary fields. Without an
/// acceptable Euro price the AH value is used, then the OK value.
pub fn extract_all_prices(text: &str) -> Vec<ExtractedPrice> {
    let ah_price = first_amount(&AH_RE, text);
    let ok_price = first_amount(&OK_RE, text);

    if let Some(price) = first_euro_price(text) {
        return vec![ExtractedPrice {
            price,
            currency: Currency::Euro,
            ah_price,
            ok_price,
        }];
    }

    if let Some(price) = ah_price {
        return vec![ExtractedPrice {
            price,
            currency: Currency::AuctionHigh,
            ah_price,
            ok_price,
        }];
    }

    if let Some(price) = ok_price {
        return vec![ExtractedPrice {
            price,
            currency: Currency::BuyNow,
            ah_price,
            ok_price,
        }];
    }

    Vec::new()
}

/// Returns the first in-bounds Euro amount by position in the text
///
/// Numbers that belong to a GPU model ("3070" in "RTX 3070 €350") are never
/// prices.
fn first_euro_price(text: &str) -> Option<f64> {
    let model_numbers = model_number_spans(text);

    let mut candidates: Vec<(usize, f64)> = EURO_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let overlaps_model = model_numbers
                .iter()
                .any(|span| m.start() < span.end && span.start < m.end());
            if overlaps_model {
                return None;
            }
            parse_amount(m.as_str()).map(|value| (m.start(), value))
        })
        .collect();

    candidates.sort_by_key(|(pos, _)| *pos);

    candidates
        .into_iter()
        .map(|(_, value)| value)
        .find(|value| (MIN_EURO_PRICE..=MAX_EURO_PRICE).contains(value))
}

fn first_amount(re: &Regex, text: &str) -> Option<f64> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
        .find(|value| *value > 0.0)
}

/// Parses an amount, accepting a decimal comma and thousands groups
fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = if DOT_THOUSANDS_RE.is_match(&compact) {
        compact.replace('.', "")
    } else {
        compact
    };
    compact.replace(',', ".").parse::<f64>().ok()
}
