//! Extraction engine
//!
//! Pure functions that turn forum post text into GPU models, prices and
//! seller locations. Nothing in this module performs I/O.

mod location;
mod models;
mod prices;

pub use location::extract_location;
pub use models::{
    detect_brand, extract_gpu_from_title, extract_gpu_models, normalize_model, ModelPattern,
    MODEL_PATTERNS,
};
pub use prices::{extract_all_prices, ExtractedPrice, MAX_EURO_PRICE, MIN_EURO_PRICE};

/// A model paired with the price it is assumed to be offered at
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPrice {
    pub model: String,
    pub price: ExtractedPrice,
}

/// Pairs models with prices
///
/// A single model takes the first price. With several models, pairing is
/// positional; models beyond the last price reuse that last price. This is a
/// best-effort heuristic for posts offering several cards.
pub fn pair_models_with_prices(models: &[String], prices: &[ExtractedPrice]) -> Vec<ModelPrice> {
    let Some(last) = prices.len().checked_sub(1) else {
        return Vec::new();
    };

    if models.len() == 1 {
        return vec![ModelPrice {
            model: models[0].clone(),
            price: prices[0],
        }];
    }

    models
        .iter()
        .enumerate()
        .map(|(i, model)| ModelPrice {
            model: model.clone(),
            price: prices[i.min(last)],
        })
        .collect()
}

/// Runs model and price extraction over a text and pairs the results
pub fn extract_pairs(text: &str) -> Vec<ModelPrice> {
    let models: Vec<String> = extract_gpu_models(text).into_iter().collect();
    let prices = extract_all_prices(text);
    pair_models_with_prices(&models, &prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Currency;

    fn euro(price: f64) -> ExtractedPrice {
        ExtractedPrice {
            price,
            currency: Currency::Euro,
            ah_price: None,
            ok_price: None,
        }
    }

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_model_two_prices_takes_first() {
        let pairs = pair_models_with_prices(&models(&["RTX 3070"]), &[euro(350.0), euro(400.0)]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].price.price, 350.0);
    }

    #[test]
    fn test_two_models_one_price_share_it() {
        let pairs = pair_models_with_prices(&models(&["RTX 3070", "RTX 3080"]), &[euro(350.0)]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.price.price == 350.0));
    }

    #[test]
    fn test_positional_pairing_reuses_last() {
        let pairs = pair_models_with_prices(
            &models(&["A", "B", "C"]),
            &[euro(100.0), euro(200.0)],
        );
        let prices: Vec<f64> = pairs.iter().map(|p| p.price.price).collect();
        assert_eq!(prices, vec![100.0, 200.0, 200.0]);
    }

    #[test]
    fn test_no_prices_no_pairs() {
        assert!(pair_models_with_prices(&models(&["RTX 3070"]), &[]).is_empty());
        assert!(pair_models_with_prices(&[], &[euro(100.0)]).is_empty());
    }

    #[test]
    fn test_extract_pairs_from_post() {
        let pairs = extract_pairs("Müüa RTX 3070 ja RTX 3080, hind 350€");
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.price.price == 350.0));
    }
}
