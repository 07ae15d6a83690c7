//! Splits a sanitized source document into Article/Annex rule records with
//! their point/subpoint hierarchy.
//!
//! Boundary discovery and title recovery are heuristic: EUR-Lex HTML/text
//! exports are inconsistent about headings, bilingual columns and stray
//! cross-references, so this module leans on a handful of regexes tuned
//! against real EU AI Act text rather than a formal grammar.

use crate::sanitize::{normalize_line, sanitize_content};
use annex4_core::section::{canonicalize, format_order_index};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub section_code: String,
    pub title: Option<String>,
    pub content: String,
    pub parent_section_code: Option<String>,
    pub order_index: Option<String>,
}

static STOP_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(and|or|for|where|when|which|that)\b").unwrap());
static TITLE_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(shall|must|may|should|contain|contains|include|includes|apply|applies|provide|provided|ensure|indicate|keep|draw up|affix|comply|take|inform|act|establish|implement)\b",
    )
    .unwrap()
});
static BAD_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(CHAPTER|SECTION|SUBSECTION|TITLE|ANNEX|PART)\b").unwrap());
static BACKTICKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[`´]").unwrap());
static END_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.:;]\s*$").unwrap());
static ALL_CAPS_ROMAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\s\-\u{2013}\u{2014}IVXLC]+$").unwrap());
static ENUM_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\(?[0-9ivx]+\)?\.?|\([a-zA-Z]\))\s+").unwrap());
static LEADING_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\u{2013}\u{2014}\-:;,.]\s*").unwrap());
static DOUBLE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static ARTICLE_BOUNDARY_BASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*Article\s+\d+[a-zA-Z]?").unwrap());
static ANNEX_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(\s*ANNEX\s+[IVXLC]+\b)").unwrap());
static STRUCT_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(CHAPTER|SECTION|SUBSECTION|TITLE|PART)\s+[IVXLC0-9A-Z]+\b").unwrap()
});
static DIGIT_DOT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());
static ARTICLE_NUM_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*Article\s+(\d+[a-zA-Z]?)").unwrap());

static ARTICLE_HEAD_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*Article\s+(\d+[a-zA-Z]?)(.*)").unwrap());
static ARTIKEL_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*Artikel\s+\d+[a-zA-Z]?\s*").unwrap());
static ANNEX_HEAD_MATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*ANNEX\s+([IVXLC]+)\b(?:\s+(.*))?$").unwrap());
static ANNEXE_DUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bANNEXE\s+[IVXLC]+\b").unwrap());
static STRUCTURAL_SUBHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Section|Part|Chapter|Titre|Sezione|Kapitel)\b").unwrap());
static DIGIT_OR_LETTER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+|\([a-zA-Z]\)\s+").unwrap());

static TOP_LEVEL_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*([1-9]\d{0,2})\.\s+").unwrap());
static SUB_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\(([a-zA-Z])\)\s+").unwrap());

fn is_title_like(s: &str) -> bool {
    !s.is_empty()
        && !(s.starts_with('(') || s.starts_with('['))
        && !STOP_START.is_match(s)
        && !s.chars().next().map(|c| c.is_lowercase()).unwrap_or(false)
        && !TITLE_VERB.is_match(s)
        && !BAD_HEAD.is_match(s)
}

fn is_hard_title_candidate(s: &str) -> bool {
    is_title_like(s) && !END_PUNCT.is_match(s) && !ALL_CAPS_ROMAN.is_match(s) && s.chars().count() <= 220
}

fn clean_title_piece(s: &str) -> String {
    BACKTICKS.replace_all(s, "").trim().to_string()
}

/// Truncate at the first lower->Upper->lower boundary, which marks where a
/// second language's text has been glued onto the English heading with no
/// separator (`"Committee procedureAusschussverfahren"` -> `"Committee
/// procedure"`).
fn clip_bilingual_trail(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= 3 {
        for i in 1..chars.len() - 1 {
            if chars[i - 1].is_lowercase() && chars[i].is_uppercase() && chars[i + 1].is_lowercase() {
                return chars[..i].iter().collect::<String>().trim().to_string();
            }
        }
    }
    s.trim().to_string()
}

fn norm_title_text(s: &str) -> String {
    let s = BACKTICKS.replace_all(s, "");
    let s = LEADING_PUNCT.replace(&s, "");
    let s = clip_bilingual_trail(&s);
    DOUBLE_SPACE.split(&s).next().unwrap_or("").trim().to_string()
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn article_header_is_valid(text: &str, start: usize, end: usize) -> bool {
    let line_end = match text[end..].find('\n') {
        Some(idx) => end + idx,
        None => text.len(),
    };
    let tail = text[end..line_end].trim();
    if !tail.is_empty() {
        let starts_lower = tail.chars().next().map(|c| c.is_lowercase()).unwrap_or(false);
        if starts_lower || TITLE_VERB.is_match(tail) {
            return false;
        }
    }

    let block_end = floor_char_boundary(text, end + 1200);
    let block = &text[end..block_end];
    let lines: Vec<String> = block
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.iter().take(5).any(|ln| is_title_like(&norm_title_text(ln))) {
        return true;
    }
    if lines.iter().take(10).any(|ln| DIGIT_DOT_START.is_match(ln)) {
        return true;
    }

    if let Some(caps) = ARTICLE_NUM_ONLY.captures(&text[start..end]) {
        let num = regex::escape(&caps[1]);
        if let Ok(artikel_re) = Regex::new(&format!(r"(?i)^\s*Artikel\s+{num}\s*$")) {
            if lines.iter().take(5).any(|ln| artikel_re.is_match(ln)) {
                return true;
            }
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Article,
    Annex,
    Divider,
}

struct Boundary {
    kind: BoundaryKind,
    start: usize,
}

fn discover_boundaries(text: &str) -> Vec<Boundary> {
    let mut boundaries = Vec::new();

    for m in ARTICLE_BOUNDARY_BASE.find_iter(text) {
        let trimmed_tail = text[m.end()..].trim_start();
        if trimmed_tail.starts_with('(') {
            continue;
        }
        if article_header_is_valid(text, m.start(), m.end()) {
            boundaries.push(Boundary { kind: BoundaryKind::Article, start: m.start() });
        }
    }

    for m in ANNEX_BOUNDARY.find_iter(text) {
        boundaries.push(Boundary { kind: BoundaryKind::Annex, start: m.start() });
    }

    for m in STRUCT_BOUNDARY.find_iter(text) {
        boundaries.push(Boundary { kind: BoundaryKind::Divider, start: m.start() });
    }

    boundaries.sort_by_key(|b| b.start);

    let mut cleaned: Vec<Boundary> = Vec::with_capacity(boundaries.len());
    for b in boundaries {
        if b.kind == BoundaryKind::Divider {
            if let Some(prev) = cleaned.last() {
                if prev.kind == BoundaryKind::Article {
                    let segment = &text[prev.start..b.start];
                    let after_header = match segment.find('\n') {
                        Some(idx) => &segment[idx + 1..],
                        None => "",
                    };
                    if after_header.trim().is_empty() {
                        continue;
                    }
                }
            }
        }
        cleaned.push(b);
    }
    cleaned
}

/// Splits `body` on a top-level `N. ` marker, then each resulting chunk on a
/// lettered `(a) ` marker, mirroring the Article/Annex point hierarchy.
fn split_into_points_and_subpoints(rules: &mut Vec<RuleRecord>, parent_code: &str, body: &str) {
    for (num, text_i) in split_markers(body, &TOP_LEVEL_NUM) {
        let lines_i: Vec<String> = text_i.trim().lines().map(normalize_line).collect();
        let content_i = sanitize_content(&lines_i.join("\n"));
        let code_i = canonicalize(&format!("{parent_code}.{num}"));
        rules.push(RuleRecord {
            section_code: code_i.clone(),
            title: None,
            content: content_i.clone(),
            parent_section_code: Some(canonicalize(parent_code)),
            order_index: Some(format_order_index(&num)),
        });

        for (letter, text_j) in split_markers(&content_i, &SUB_LETTER) {
            let letter = letter.to_lowercase();
            let lines_j: Vec<String> = text_j.trim().lines().map(normalize_line).collect();
            let content_j = sanitize_content(&lines_j.join("\n"));
            let sub_code = canonicalize(&format!("{code_i}.{letter}"));
            rules.push(RuleRecord {
                section_code: sub_code,
                title: None,
                content: content_j,
                parent_section_code: Some(code_i.clone()),
                order_index: Some(format_order_index(&letter)),
            });
        }
    }
}

fn split_markers(body: &str, marker_re: &Regex) -> Vec<(String, String)> {
    let matches: Vec<_> = marker_re.captures_iter(body).collect();
    let mut result = Vec::with_capacity(matches.len());
    for (idx, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).unwrap();
        let marker = caps.get(1).unwrap().as_str().to_string();
        let start = whole.end();
        let end = if idx + 1 < matches.len() {
            matches[idx + 1].get(0).unwrap().start()
        } else {
            body.len()
        };
        result.push((marker, body[start..end].to_string()));
    }
    result
}

fn collapse_blank_runs(s: &str) -> String {
    static RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
    RUNS.replace_all(s, "\n\n").to_string()
}

fn parse_article_block(rules: &mut Vec<RuleRecord>, block_text: &str) {
    let lines: Vec<&str> = block_text.lines().collect();
    if lines.is_empty() {
        return;
    }
    let caps = match ARTICLE_HEAD_MATCH.captures(lines[0]) {
        Some(c) => c,
        None => return,
    };
    let mut code = caps[1].trim().to_string();
    if code.chars().last().map(|c| c.is_alphabetic()).unwrap_or(false) {
        let last = code.pop().unwrap();
        code.push(last.to_ascii_lowercase());
    }
    let rest_raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let rest = ARTIKEL_STRIP.replace(rest_raw, "").trim().to_string();
    let t0 = norm_title_text(&rest);
    let mut title = if is_title_like(&t0) { t0 } else { String::new() };
    let mut title_line_idx = 0usize;

    if title.is_empty() {
        let mut marker_seen = false;
        for k in 1..lines.len().min(20) {
            let cand = normalize_line(lines[k]);
            if cand.is_empty() {
                continue;
            }
            if BAD_HEAD_OR_ARTICLE.is_match(&cand) {
                break;
            }
            if MARKER_START.is_match(&cand) {
                marker_seen = true;
                continue;
            }
            if marker_seen {
                break;
            }
            let cand_norm = norm_title_text(&cand);
            if is_title_like(&cand_norm) && !END_PUNCT.is_match(&cand_norm) && !ALL_CAPS_ROMAN.is_match(&cand_norm) {
                title = cand_norm;
                title_line_idx = k;
                break;
            }
        }
    }

    if title.is_empty() {
        for k in 1..lines.len().min(50) {
            let cand = normalize_line(lines[k]);
            if cand.is_empty() {
                continue;
            }
            if BAD_HEAD_OR_ARTICLE.is_match(&cand) {
                break;
            }
            if ENUM_PREFIX.is_match(&cand) {
                continue;
            }
            let cand_norm = norm_title_text(&cand);
            let head: String = cand_norm.chars().take(20).collect();
            if is_hard_title_candidate(&cand_norm) && !TITLE_VERB.is_match(&head) {
                title = cand_norm;
                title_line_idx = k;
                break;
            }
        }
    }

    let rule_title = if title.is_empty() { None } else { Some(title) };
    let raw = lines[title_line_idx + 1..].join("\n");
    let content = sanitize_content(&collapse_blank_runs(raw.trim()));
    let parent_code = canonicalize(&format!("Article{code}"));

    rules.push(RuleRecord {
        section_code: parent_code.clone(),
        title: rule_title,
        content: content.clone(),
        parent_section_code: None,
        order_index: None,
    });
    split_into_points_and_subpoints(rules, &parent_code, &content);
}

static BAD_HEAD_OR_ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(ANNEX|Article)\b").unwrap());
static MARKER_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\(?\d+\)?|\d+\.|\([a-zA-Z]\))").unwrap());

fn parse_annex_block(rules: &mut Vec<RuleRecord>, block_text: &str) {
    let lines: Vec<&str> = block_text.lines().collect();
    if lines.is_empty() {
        return;
    }
    let caps = match ANNEX_HEAD_MATCH.captures(lines[0]) {
        Some(c) => c,
        None => return,
    };
    let roman = caps[1].to_uppercase();
    let mut annex_title = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim().to_string();
    let mut consumed = 0usize;

    if !annex_title.is_empty() {
        let t = ANNEXE_DUP.replace_all(&annex_title, "").trim().to_string();
        let t = clean_title_piece(&t);
        let t = LEADING_PUNCT.replace(&t, "").to_string();
        annex_title = DOUBLE_SPACE.split(&t).next().unwrap_or("").trim().to_string();
    }
    if !annex_title.is_empty()
        && (!is_title_like(&annex_title) || TITLE_VERB.is_match(&annex_title) || END_PUNCT.is_match(&annex_title))
    {
        annex_title = String::new();
    }

    if annex_title.is_empty() {
        let mut k = 1usize;
        let mut first_title = String::new();
        while k < lines.len().min(40) {
            let t_norm = normalize_line(lines[k]);
            if t_norm.is_empty() {
                k += 1;
                continue;
            }
            if STRUCTURAL_SUBHEAD.is_match(&t_norm) {
                break;
            }
            if DIGIT_OR_LETTER_MARKER.is_match(&t_norm) {
                break;
            }
            if matches!(t_norm.chars().next(), Some(',' | '—' | '–' | '-' | ';' | '.')) {
                break;
            }
            let stripped = LEADING_PUNCT.replace(&t_norm, "").to_string();
            let t_norm = clean_title_piece(&stripped);
            if TITLE_VERB.is_match(&t_norm) || END_PUNCT.is_match(&t_norm) || ALL_CAPS_ROMAN.is_match(&t_norm) {
                break;
            }
            if !is_title_like(&t_norm) {
                break;
            }
            first_title = t_norm;
            k += 1;
            break;
        }
        annex_title = first_title;
        consumed = if !annex_title.is_empty() { k - 1 } else { 0 };
    }

    let raw_body = lines[1 + consumed..].join("\n");
    let body = sanitize_content(&collapse_blank_runs(raw_body.trim()));
    let parent_code = canonicalize(&format!("Annex{roman}"));

    rules.push(RuleRecord {
        section_code: parent_code.clone(),
        title: if annex_title.is_empty() { None } else { Some(annex_title) },
        content: body.clone(),
        parent_section_code: None,
        order_index: None,
    });
    split_into_points_and_subpoints(rules, &parent_code, &body);
}

/// Parses Articles and Annexes out of a raw regulatory document into rule
/// records with a dotted `section_code` hierarchy
/// (`ArticleN[.n][.letter][.roman]...` / `AnnexROMAN[.n][.letter]...`).
pub fn parse_rules(raw_text: &str) -> Vec<RuleRecord> {
    let text = raw_text.nfkc().collect::<String>().replace('\u{a0}', " ").trim().to_string();
    let boundaries = discover_boundaries(&text);
    let mut rules = Vec::new();

    for (i, b) in boundaries.iter().enumerate() {
        let end_pos = match b.kind {
            BoundaryKind::Annex => {
                let mut j = i + 1;
                while j < boundaries.len() && boundaries[j].kind == BoundaryKind::Divider {
                    j += 1;
                }
                boundaries.get(j).map(|nb| nb.start).unwrap_or(text.len())
            }
            _ => boundaries.get(i + 1).map(|nb| nb.start).unwrap_or(text.len()),
        };
        let block_text = text[b.start..end_pos].trim();

        match b.kind {
            BoundaryKind::Divider => continue,
            BoundaryKind::Article => parse_article_block(&mut rules, block_text),
            BoundaryKind::Annex => parse_annex_block(&mut rules, block_text),
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_article_with_title_and_numbered_points() {
        let text = "Article 9\nRisk management system\n\n1. A risk management system shall be established.\n(a) the identification of risks;\n(b) the adoption of mitigation measures;\n2. The risk management system shall be a continuous process.\n\nArticle 10\nData and data governance\n\n1. Training data sets shall be relevant.\n";
        let rules = parse_rules(text);
        let article9 = rules.iter().find(|r| r.section_code == "Article9").unwrap();
        assert_eq!(article9.title.as_deref(), Some("Risk management system"));
        let point1 = rules.iter().find(|r| r.section_code == "Article9.1").unwrap();
        assert_eq!(point1.parent_section_code.as_deref(), Some("Article9"));
        assert_eq!(point1.order_index.as_deref(), Some("001"));
        let sub_a = rules.iter().find(|r| r.section_code == "Article9.1.a").unwrap();
        assert_eq!(sub_a.parent_section_code.as_deref(), Some("Article9.1"));
        assert_eq!(sub_a.order_index.as_deref(), Some("a"));
        assert!(rules.iter().any(|r| r.section_code == "Article10"));
    }

    #[test]
    fn rejects_cross_reference_as_article_boundary() {
        let text = "Article 9\nRisk management system\n\n1. As referred to in Article 9(2), providers shall keep records.\n";
        let rules = parse_rules(text);
        let count = rules.iter().filter(|r| r.section_code == "Article9").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn parses_annex_with_roman_numeral_and_points() {
        let text = "ANNEX IV Technical documentation\n\n1. A general description of the AI system.\n(a) its intended purpose;\n2. A detailed description of the elements of the AI system.\n";
        let rules = parse_rules(text);
        let annex = rules.iter().find(|r| r.section_code == "AnnexIV").unwrap();
        assert_eq!(annex.title.as_deref(), Some("Technical documentation"));
        assert!(rules.iter().any(|r| r.section_code == "AnnexIV.1"));
        assert!(rules.iter().any(|r| r.section_code == "AnnexIV.1.a"));
        assert!(rules.iter().any(|r| r.section_code == "AnnexIV.2"));
    }

    #[test]
    fn chapter_divider_immediately_after_article_header_is_ignored() {
        let text = "Article 6\nCHAPTER III\nClassification rules for high-risk AI systems.\n";
        let rules = parse_rules(text);
        let article6 = rules.iter().find(|r| r.section_code == "Article6").unwrap();
        assert!(article6.content.contains("Classification rules"));
    }

    #[test]
    fn trailing_article_letter_is_lowercased_in_section_code() {
        let text = "Article 9A\nSome title here\n\n1. First point.\n";
        let rules = parse_rules(text);
        assert!(rules.iter().any(|r| r.section_code == "Article9a"));
    }

    #[test]
    fn title_recovery_skips_past_a_chapter_divider_and_stop_words() {
        let text = "Article 47\nCHAPTER V\nEU declaration of conformity\n\n1. The provider shall draw up a written EU declaration of conformity.\n";
        let rules = parse_rules(text);
        let article47 = rules.iter().find(|r| r.section_code == "Article47").unwrap();
        assert_eq!(article47.title.as_deref(), Some("EU declaration of conformity"));
    }
}
