/// Listing and thread types shared by the scraper, pipeline and storage
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A thread row discovered on a listing page
///
/// Produced by the thread-row query and never persisted. The url is the
/// uniqueness key within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    pub title: String,
    pub url: String,
    pub author: String,
    pub location: Option<String>,
    pub category: String,
}

/// GPU vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Brand {
    #[serde(rename = "NVIDIA")]
    Nvidia,
    #[serde(rename = "AMD")]
    Amd,
    #[serde(rename = "Intel")]
    Intel,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Brand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nvidia => "NVIDIA",
            Self::Amd => "AMD",
            Self::Intel => "Intel",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Self {
        match s {
            "NVIDIA" => Self::Nvidia,
            "AMD" => Self::Amd,
            "Intel" => Self::Intel,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price notation a listing was quoted in
///
/// `AH` is the forum's auction high-bid shorthand and `OK` its buy-now
/// shorthand; both are kept distinct from plain Euro prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "€")]
    Euro,
    #[serde(rename = "AH")]
    AuctionHigh,
    #[serde(rename = "OK")]
    BuyNow,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euro => "€",
            Self::AuctionHigh => "AH",
            Self::BuyNow => "OK",
        }
    }

    /// Parses the stored or user-supplied form of a currency
    ///
    /// Accepts `€`, `EUR`, `AH` and `OK`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "€" | "EUR" | "EURO" => Some(Self::Euro),
            "AH" => Some(Self::AuctionHigh),
            "OK" => Some(Self::BuyNow),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing draft produced during a scrape run
///
/// `id` is a run-local draft id (`<url hash>_<counter>`); storage assigns the
/// canonical identity when the draft is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub model: String,
    pub brand: Brand,
    pub price: f64,
    pub currency: Currency,
    pub ah_price: Option<f64>,
    pub ok_price: Option<f64>,
    pub title: String,
    pub url: String,
    pub author: String,
    pub location: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A persisted listing row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: i64,
    pub draft_id: String,
    pub model: String,
    pub brand: Brand,
    pub price: f64,
    pub currency: Currency,
    pub ah_price: Option<f64>,
    pub ok_price: Option<f64>,
    pub title: String,
    pub url: String,
    pub author: String,
    pub location: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("€"), Some(Currency::Euro));
        assert_eq!(Currency::parse("eur"), Some(Currency::Euro));
        assert_eq!(Currency::parse(" ah "), Some(Currency::AuctionHigh));
        assert_eq!(Currency::parse("OK"), Some(Currency::BuyNow));
        assert_eq!(Currency::parse("USD"), None);
    }

    #[test]
    fn test_currency_serializes_as_symbol() {
        let json = serde_json::to_string(&Currency::Euro).unwrap();
        assert_eq!(json, "\"€\"");
        let json = serde_json::to_string(&Currency::BuyNow).unwrap();
        assert_eq!(json, "\"OK\"");
    }

    #[test]
    fn test_brand_db_string() {
        for brand in [Brand::Nvidia, Brand::Amd, Brand::Intel, Brand::Unknown] {
            assert_eq!(Brand::from_db_string(brand.as_str()), brand);
        }
        assert_eq!(Brand::from_db_string("Matrox"), Brand::Unknown);
    }
}
