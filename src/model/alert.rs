/// Price alert types
use crate::model::{Currency, ListingRecord};
use serde::Serialize;
use std::fmt;

/// Price condition of a standing alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Listing price at or under the target
    Below,
    /// Listing price at or over the target
    Above,
    /// Listing price within 5% of the target
    Exact,
}

impl AlertType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Below => "below",
            Self::Above => "above",
            Self::Exact => "exact",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "below" => Some(Self::Below),
            "above" => Some(Self::Above),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A standing user-defined watch criterion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAlert {
    pub id: i64,
    pub user_id: String,
    pub gpu_model: String,
    pub currency: Currency,
    pub alert_type: AlertType,
    pub target_price: f64,
}

/// An alert matched by a newly saved listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert: PriceAlert,
    pub listing: ListingRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_roundtrip() {
        for alert_type in [AlertType::Below, AlertType::Above, AlertType::Exact] {
            assert_eq!(
                AlertType::from_db_string(alert_type.to_db_string()),
                Some(alert_type)
            );
        }
        assert_eq!(AlertType::from_db_string("BELOW"), Some(AlertType::Below));
        assert_eq!(AlertType::from_db_string("around"), None);
    }
}
