//! GPU model recognition
//!
//! Models are found with an ordered table of generation-bounded patterns, one
//! entry per vendor family. Bounding the model numbers (RTX 20-50 series, GTX
//! 10xx/16xx, ...) keeps phone numbers, years and post ids from being read as
//! graphics cards.

use crate::model::Brand;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

/// One entry of the model table
pub struct ModelPattern {
    /// Pattern with a `num` group and an optional `suffix` group
    pub regex: Regex,
    pub vendor: Brand,
    /// Canonical family prefix ("RTX", "GTX", "RX", "ARC")
    pub family: &'static str,
    /// Human-readable generation bound, for logging and tests
    pub generation: &'static str,
}

impl ModelPattern {
    fn new(
        pattern: &str,
        vendor: Brand,
        family: &'static str,
        generation: &'static str,
    ) -> Self {
        Self {
            regex: Regex::new(pattern).expect("model pattern must compile"),
            vendor,
            family,
            generation,
        }
    }

    /// Builds the canonical model string for a match of this pattern
    fn canonical(&self, caps: &Captures<'_>) -> String {
        let num = caps
            .name("num")
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_default();
        let mut model = format!("{} {}", self.family, num);

        if let Some(suffix) = caps.name("suffix") {
            let compact: String = suffix
                .as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase();
            let suffix = if compact == "TISUPER" {
                "TI SUPER".to_string()
            } else {
                compact
            };
            model.push(' ');
            model.push_str(&suffix);
        }

        model
    }
}

/// The ordered model table
pub static MODEL_PATTERNS: LazyLock<Vec<ModelPattern>> = LazyLock::new(|| {
    vec![
        ModelPattern::new(
            r"(?i)\bRTX\s*-?\s*(?P<num>[2-5]0[5-9]0)(?:\s*(?P<suffix>TI\s*SUPER|TI|SUPER))?\b",
            Brand::Nvidia,
            "RTX",
            "RTX 20xx-50xx",
        ),
        ModelPattern::new(
            r"(?i)\bGTX\s*-?\s*(?P<num>10[5-8]0|16[56]0)(?:\s*(?P<suffix>TI|SUPER))?\b",
            Brand::Nvidia,
            "GTX",
            "GTX 10xx/16xx",
        ),
        ModelPattern::new(
            r"(?i)\bRX\s*-?\s*(?P<num>[5679][0-9]{2}0)(?:\s*(?P<suffix>XTX|XT|GRE))?\b",
            Brand::Amd,
            "RX",
            "RX 5000-9000",
        ),
        ModelPattern::new(
            r"(?i)\bRX\s*-?\s*(?P<num>[45][5-9]0)\b",
            Brand::Amd,
            "RX",
            "RX 400/500",
        ),
        ModelPattern::new(
            r"(?i)\bARC\s*-?\s*(?P<num>[AB][3-7][0-9]0)\b",
            Brand::Intel,
            "ARC",
            "ARC A/B",
        ),
    ]
});

/// Finds every GPU model mentioned in the text
///
/// Returns normalized model strings. The set is sorted, but callers should
/// not read meaning into the order beyond model/price pairing.
pub fn extract_gpu_models(text: &str) -> BTreeSet<String> {
    let mut models = BTreeSet::new();

    for pattern in MODEL_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            models.insert(pattern.canonical(&caps));
        }
    }

    models
}

/// Byte ranges of the model numbers in the text ("3070" in "RTX 3070")
pub(crate) fn model_number_spans(text: &str) -> Vec<Range<usize>> {
    MODEL_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.regex.captures_iter(text))
        .filter_map(|caps| caps.name("num").map(|m| m.range()))
        .collect()
}

/// Single-match model lookup for thread titles
///
/// Used when body extraction finds nothing: returns the first table entry that
/// matches the title.
pub fn extract_gpu_from_title(title: &str) -> Option<String> {
    MODEL_PATTERNS.iter().find_map(|pattern| {
        pattern
            .regex
            .captures(title)
            .map(|caps| pattern.canonical(&caps))
    })
}

/// Normalizes a model string
///
/// Recognized models get canonical spacing ("RTX3080TI" becomes
/// "RTX 3080 TI"); anything else is uppercased with whitespace collapsed.
pub fn normalize_model(raw: &str) -> String {
    if let Some(model) = extract_gpu_from_title(raw) {
        return model;
    }

    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Classifies a model string by vendor
pub fn detect_brand(model: &str) -> Brand {
    let upper = model.to_uppercase();

    if upper.contains("RTX") || upper.contains("GTX") {
        Brand::Nvidia
    } else if upper.contains("RX") || upper.contains("RADEON") {
        Brand::Amd
    } else if upper.contains("ARC") {
        Brand::Intel
    } else {
        Brand::Unknown
    }
}
