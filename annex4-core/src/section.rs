//! Canonical section-code grammar: `Article N[letter][.n][.letter][.roman]...`
//! and `Annex ROMAN[.section][.n][.letter]...`.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)").unwrap());
static DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());
static TRAILING_ARTICLE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Article\d+)([A-Z])$").unwrap());

/// Normalize a section code: strip whitespace, turn `(x)` into `.x.`,
/// collapse repeated dots, trim leading/trailing dots, and lower-case a
/// trailing Article letter (`Article10A` -> `Article10a`).
///
/// Idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(code: &str) -> String {
    if code.is_empty() {
        return code.to_string();
    }
    let mut s = WHITESPACE.replace_all(code, "").to_string();
    s = PAREN.replace_all(&s, ".$1.").to_string();
    s = DOTS.replace_all(&s, ".").to_string();
    let s = s.trim_matches('.').to_string();

    // Lower-case a trailing Article letter, e.g. "Article10A" -> "Article10a",
    // but only the leading (undotted) head segment -- "Article10a.1.B" keeps
    // its dotted-segment casing rules separate (letters in dotted segments
    // are always lower already by construction of the parser).
    let head = s.split('.').next().unwrap_or(&s);
    if let Some(caps) = TRAILING_ARTICLE_LETTER.captures(head) {
        let fixed_head = format!("{}{}", &caps[1], caps[2].to_lowercase());
        let rest = &s[head.len()..];
        return format!("{fixed_head}{rest}");
    }
    s
}

/// Zero-pad numeric order indices to 3 digits ("1" -> "001"); lower-case
/// letter indices ("B" -> "b").
pub fn format_order_index(idx: &str) -> String {
    if idx.chars().all(|c| c.is_ascii_digit()) && !idx.is_empty() {
        let n: u32 = idx.parse().unwrap_or(0);
        format!("{n:03}")
    } else {
        idx.to_lowercase()
    }
}

/// The section code of the Rule's parent, if `code` is a dotted code
/// (e.g. `Article9.2.a` -> `Some("Article9.2")`, `Article9` -> `None`).
pub fn parent_code(code: &str) -> Option<&str> {
    code.rfind('.').map(|idx| &code[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_article_with_point() {
        assert_eq!(canonicalize(" Article 6 (1) "), "Article6.1");
    }

    #[test]
    fn canonicalize_annex_with_point_and_letter() {
        assert_eq!(canonicalize("AnnexIV(2)a"), "AnnexIV.2.a");
    }

    #[test]
    fn canonicalize_lowercases_trailing_article_letter() {
        assert_eq!(canonicalize("Article10A"), "Article10a");
        assert_eq!(canonicalize("Article10A(1)"), "Article10a.1");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for input in ["Article6.1", "AnnexIV.2.a", " Article 98 (2) ", ""] {
            let once = canonicalize(input);
            let twice = canonicalize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn order_index_formatting() {
        assert_eq!(format_order_index("1"), "001");
        assert_eq!(format_order_index("42"), "042");
        assert_eq!(format_order_index("A"), "a");
        assert_eq!(format_order_index("b"), "b");
    }

    #[test]
    fn parent_code_of_dotted_and_bare() {
        assert_eq!(parent_code("Article9.2.a"), Some("Article9.2"));
        assert_eq!(parent_code("Article9.2"), Some("Article9"));
        assert_eq!(parent_code("Article9"), None);
    }
}
