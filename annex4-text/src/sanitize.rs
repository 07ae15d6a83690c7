//! Whitespace/footnote/ELI-footer cleanup applied to every parsed rule body
//! before it is stored.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static ANNEXE_DUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bANNEXE\s+[IVXLC]+\b").unwrap());
static LANG_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,3}$").unwrap());
static BACKTICKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[`´]").unwrap());
static BARE_NUMERIC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(?\d+\)?$").unwrap());
static BARE_LETTER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\([a-zA-Z]\)$").unwrap());
static BARE_BRACKET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d+\]$").unwrap());
static RUNS_OF_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static RUNS_OF_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static ELI_FOOTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*ELI:\s*\S+.*$").unwrap());
static SOFT_HYPHEN_WRAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)[\u{2010}-\u{2014}-]\s*\n\s*(\w)").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^\n])\n(?!\n)([^\n][^\n]*)").unwrap());
static CONTINUATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\(?[a-z]\)|\([ivx]+\)|\d+\.)\s+").unwrap());
static HEADER_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:ANNEX|Article|Section|Chapter|Part)\b").unwrap());

/// NFKC-normalize, replace non-breaking spaces, and trim.
pub fn normalize_line(line: &str) -> String {
    line.nfkc().collect::<String>().replace('\u{a0}', " ").trim().to_string()
}

/// Join a soft-wrapped line onto the previous one unless the following
/// line starts a new enumerated item or structural header.
fn unwrap_soft_linebreaks(s: &str) -> String {
    let s = SOFT_HYPHEN_WRAP.replace_all(s, "$1$2").to_string();
    LINE_BREAK
        .replace_all(&s, |caps: &regex::Captures| {
            let before = &caps[1];
            let after = &caps[2];
            if CONTINUATION_MARKER.is_match(after) || HEADER_START.is_match(after) {
                format!("{before}\n{after}")
            } else {
                format!("{before} {after}")
            }
        })
        .to_string()
}

/// Strip stray footnote markers, bilingual column duplicates, ISO language
/// codes, and EUR-Lex ELI footers; collapse runs of whitespace.
pub fn sanitize_content(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let raw_lines: Vec<&str> = text.lines().collect();
    let mut lines: Vec<String> = Vec::with_capacity(raw_lines.len());
    let mut i = 0usize;
    while i < raw_lines.len() {
        let mut s = normalize_line(raw_lines[i]);
        s = ANNEXE_DUP.replace_all(&s, "").trim().to_string();

        if LANG_CODE.is_match(&s) {
            i += 1;
            continue;
        }
        s = BACKTICKS.replace_all(&s, "").trim().to_string();

        let mut next_non_empty = String::new();
        let mut j = i + 1;
        while j < raw_lines.len() {
            let nxt = normalize_line(raw_lines[j]);
            if !nxt.is_empty() {
                next_non_empty = nxt;
                break;
            }
            j += 1;
        }

        let is_bare_marker = BARE_NUMERIC_MARKER.is_match(&s)
            || BARE_LETTER_MARKER.is_match(&s)
            || BARE_BRACKET_MARKER.is_match(&s);
        if is_bare_marker && next_non_empty.is_empty() {
            i += 1;
            continue;
        }

        if s == ";" || s == "." {
            i += 1;
            continue;
        }

        lines.push(s);
        i += 1;
    }

    let mut cleaned = lines.join("\n");
    cleaned = RUNS_OF_SPACE.replace_all(&cleaned, " ").to_string();
    cleaned = RUNS_OF_BLANK_LINE.replace_all(&cleaned, "\n\n").to_string();
    cleaned = ELI_FOOTER.replace_all(&cleaned, "").to_string();
    cleaned = RUNS_OF_BLANK_LINE.replace_all(&cleaned, "\n\n").to_string();
    cleaned = unwrap_soft_linebreaks(&cleaned);
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_lone_language_code_columns() {
        let input = "Article 6\nEN\nSubject matter";
        assert_eq!(sanitize_content(input), "Article 6\nSubject matter");
    }

    #[test]
    fn drops_bare_markers_with_no_following_text() {
        let input = "first line\n(1)\n\n";
        assert_eq!(sanitize_content(input), "first line");
    }

    #[test]
    fn keeps_bare_marker_when_text_follows() {
        let input = "1.\nProviders shall comply.";
        assert_eq!(sanitize_content(input), "1.\nProviders shall comply.");
    }

    #[test]
    fn strips_eli_footer() {
        let input = "Content line.\nELI: http://data.europa.eu/eli/reg/2024/1689/oj";
        assert_eq!(sanitize_content(input), "Content line.");
    }

    #[test]
    fn strips_backticks_and_annexe_duplicate() {
        let input = "Subject matter`\nANNEXE IV Technical documentation";
        assert_eq!(sanitize_content(input), "Subject matter\nTechnical documentation");
    }

    #[test]
    fn unwraps_soft_linebreak_mid_sentence() {
        let input = "Providers of high-risk AI systems\nshall establish a quality management system.";
        assert_eq!(
            sanitize_content(input),
            "Providers of high-risk AI systems shall establish a quality management system."
        );
    }

    #[test]
    fn preserves_break_before_new_enumerated_item() {
        let input = "intro text\n1. first point";
        assert_eq!(sanitize_content(input), "intro text\n1. first point");
    }
}
