//! CELEX identifier extraction and stable Official Journal URL
//! construction. Ported from
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `_extract_celex_id`/`_stable_oj_url`.

use once_cell::sync::Lazy;
use regex::Regex;

static CELEX_IN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:CELEX%3A|CELEX:)([A-Z0-9]+)").unwrap());
static CONSOLIDATED_CELEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^0(\d{4})([A-Z])(\d+)-\d{8}$").unwrap());
static BASE_CELEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^3(\d{4})([A-Z])(\d+)$").unwrap());

/// Extracts a CELEX id from a `CELEX:`/`CELEX%3A`-tagged URL, e.g. a
/// EUR-Lex `legal-content` link. Returns `None` when the URL carries no
/// such fragment.
pub fn extract_celex_id(url: &str) -> Option<String> {
    CELEX_IN_URL.captures(url).map(|caps| caps[1].to_uppercase())
}

fn kind_segment(kind: &str) -> &'static str {
    match kind.to_ascii_uppercase().as_str() {
        "R" => "reg",
        "L" => "dir",
        "D" => "dec",
        _ => "reg",
    }
}

/// Returns a stable Official Journal EN URL for the given CELEX id,
/// recognizing both consolidated (`0YYYY...-YYYYMMDD`) and base
/// (`3YYYY...`) forms. Falls back to the generic `legal-content` lookup
/// URL when the CELEX doesn't match either shape.
pub fn stable_oj_url(celex: &str) -> String {
    if let Some(caps) = CONSOLIDATED_CELEX.captures(celex) {
        let year = &caps[1];
        let kind = kind_segment(&caps[2]);
        let num: u64 = caps[3].parse().unwrap_or(0);
        return format!("https://eur-lex.europa.eu/eli/{kind}/{year}/{num}/oj/eng");
    }
    if let Some(caps) = BASE_CELEX.captures(celex) {
        let year = &caps[1];
        let kind = kind_segment(&caps[2]);
        let num: u64 = caps[3].parse().unwrap_or(0);
        return format!("https://eur-lex.europa.eu/eli/{kind}/{year}/{num}/oj/eng");
    }
    format!("https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=CELEX%3A{celex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_celex_from_uri_fragment() {
        assert_eq!(
            extract_celex_id("https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=CELEX%3A32024R1689"),
            Some("32024R1689".to_string())
        );
        assert_eq!(
            extract_celex_id("https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=CELEX:32024R1689"),
            Some("32024R1689".to_string())
        );
    }

    #[test]
    fn returns_none_without_celex_fragment() {
        assert_eq!(extract_celex_id("https://example.org/rss"), None);
    }

    #[test]
    fn stable_url_for_consolidated_celex() {
        assert_eq!(
            stable_oj_url("02024R1689-20240613"),
            "https://eur-lex.europa.eu/eli/reg/2024/1689/oj/eng"
        );
    }

    #[test]
    fn stable_url_for_base_celex() {
        assert_eq!(
            stable_oj_url("32024R1689"),
            "https://eur-lex.europa.eu/eli/reg/2024/1689/oj/eng"
        );
    }

    #[test]
    fn stable_url_falls_back_to_legal_content_lookup() {
        assert_eq!(
            stable_oj_url("UNKNOWN"),
            "https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=CELEX%3AUNKNOWN"
        );
    }
}
