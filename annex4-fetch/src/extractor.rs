//! Text-extraction collaborator seam. HTML-to-text and PDF-to-text
//! conversion are, per spec, external capabilities the monitor consumes
//! rather than something the core implements (see DESIGN.md's "text
//! extraction collaborators" note): given bytes and a content type,
//! return UTF-8 text preserving hard line breaks within paragraphs;
//! failures return an empty string so the caller falls back to the next
//! available item format.

use async_trait::async_trait;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], content_type: Option<&str>) -> String;
}

/// Stand-in extractor: always returns an empty string, as spec.md §9
/// prescribes for extraction failures. Useful as the default when no real
/// PDF/HTML extraction backend is wired in; the monitor's short-text
/// fallback logic (< 300 chars) then naturally degrades to the next
/// available manifestation item.
pub struct NullTextExtractor;

#[async_trait]
impl TextExtractor for NullTextExtractor {
    async fn extract(&self, _bytes: &[u8], _content_type: Option<&str>) -> String {
        String::new()
    }
}

/// Naive HTML tag stripper used as a lightweight stand-in when no real
/// HTML parser is wired in. Does not attempt to handle `<script>`/`<style>`
/// bodies specially, malformed markup, or entity decoding beyond the
/// handful of entities regulatory HTML commonly uses -- a faithful
/// implementation belongs to a dedicated HTML parser, out of scope here.
pub struct NaiveHtmlTextExtractor;

#[async_trait]
impl TextExtractor for NaiveHtmlTextExtractor {
    async fn extract(&self, bytes: &[u8], content_type: Option<&str>) -> String {
        let is_pdf = content_type.map(|ct| ct.contains("pdf")).unwrap_or(false);
        if is_pdf {
            // PDF text extraction is an external collaborator; see module doc.
            return String::new();
        }
        let raw = String::from_utf8_lossy(bytes);
        strip_tags(&raw)
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_extractor_always_returns_empty() {
        let out = NullTextExtractor.extract(b"<p>hello</p>", Some("text/html")).await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn naive_html_extractor_strips_tags() {
        let out = NaiveHtmlTextExtractor
            .extract(b"<p>Article 9</p><p>Risk management</p>", Some("text/html"))
            .await;
        assert_eq!(out, "Article 9Risk management");
    }

    #[tokio::test]
    async fn naive_extractor_returns_empty_for_pdf_content_type() {
        let out = NaiveHtmlTextExtractor.extract(b"%PDF-1.4 ...", Some("application/pdf")).await;
        assert_eq!(out, "");
    }
}
