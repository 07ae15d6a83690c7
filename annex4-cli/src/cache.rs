//! Optional on-disk cache for `update-single`'s fetched text, keyed by a
//! slugified URL. Grounded on
//! `original_source/annex4parser/regulation_monitor.py`'s
//! `RegulationMonitor._slugify`/`_cache_path`/`get_cached_text`/`save_cached_text`:
//! read/write failures are logged and treated as a cache miss, never
//! raised to the caller.

use std::path::{Path, PathBuf};
use tracing::debug;

fn slugify(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut last_was_sep = false;
    for ch in url.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    cache_dir.join(format!("{}.txt", slugify(url)))
}

pub fn get_cached_text(cache_dir: &Path, url: &str) -> Option<String> {
    let path = cache_path(cache_dir, url);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!(url, error = %e, "failed to read cached text");
            None
        }
    }
}

pub fn save_cached_text(cache_dir: &Path, url: &str, text: &str) {
    if let Err(e) = std::fs::create_dir_all(cache_dir) {
        debug!(url, error = %e, "failed to create cache dir");
        return;
    }
    let path = cache_path(cache_dir, url);
    if let Err(e) = std::fs::write(&path, text) {
        debug!(url, error = %e, "failed to save cached text");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_replaces_non_alphanumerics_with_single_underscores() {
        assert_eq!(slugify("https://eur-lex.europa.eu/x?y=1"), "https_eur_lex_europa_eu_x_y_1");
    }

    #[test]
    fn round_trips_through_a_temp_cache_dir() {
        let dir = std::env::temp_dir().join(format!("annex4-cli-test-cache-{}", std::process::id()));
        let url = "https://example.org/regulation";
        save_cached_text(&dir, url, "Article 1\nContent");
        assert_eq!(get_cached_text(&dir, url).as_deref(), Some("Article 1\nContent"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_cache_entry_is_a_clean_miss() {
        let dir = std::env::temp_dir().join("annex4-cli-test-cache-missing");
        assert_eq!(get_cached_text(&dir, "https://example.org/nothing-here"), None);
    }
}
