//! Seller location lookup against a fixed gazetteer

/// Known towns, lowercase
///
/// Matching is a case-insensitive substring test, so inflected forms such as
/// "Tallinnas" or "Tartus" still hit.
const GAZETTEER: &[&str] = &[
    "tallinn",
    "tartu",
    "narva",
    "pärnu",
    "kohtla-järve",
    "viljandi",
    "rakvere",
    "maardu",
    "kuressaare",
    "sillamäe",
    "valga",
    "võru",
    "jõhvi",
    "haapsalu",
    "keila",
    "paide",
    "saue",
    "elva",
    "põlva",
    "jõgeva",
    "rapla",
    "kärdla",
];

/// Returns the first gazetteer town mentioned in the text, title-cased
pub fn extract_location(text: &str) -> Option<String> {
    let haystack = text.to_lowercase();

    GAZETTEER
        .iter()
        .find(|town| haystack.contains(*town))
        .map(|town| title_case(town))
}

/// Uppercases the first letter of each space- or hyphen-separated part
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;

    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c == ' ' || c == '-';
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_found() {
        assert_eq!(
            extract_location("Asukoht: TALLINN, saab ka postiga"),
            Some("Tallinn".to_string())
        );
        assert_eq!(extract_location("järele pärnus"), Some("Pärnu".to_string()));
    }

    #[test]
    fn test_hyphenated_town() {
        assert_eq!(
            extract_location("kohtla-järvel"),
            Some("Kohtla-Järve".to_string())
        );
    }

    #[test]
    fn test_no_location() {
        assert_eq!(extract_location("RTX 3070 450€"), None);
    }

    #[test]
    fn test_gazetteer_order_decides() {
        // tallinn precedes tartu in the gazetteer
        assert_eq!(
            extract_location("Tartu või Tallinn"),
            Some("Tallinn".to_string())
        );
    }
}
