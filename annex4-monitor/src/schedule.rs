//! Frequency parsing and per-source cadence filtering. Ported from
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `_parse_frequency`/`filter_sources_by_frequency` and
//! `scheduler.py`'s cadence table.

use annex4_core::{Source, SourceType};
use chrono::{DateTime, Utc};

/// Default poll cadence per source type, used when a Source's own `freq`
/// extra is absent.
pub fn default_frequency_for(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::EliSparql => "6h",
        SourceType::Rss => "1h",
        SourceType::Html => "24h",
        SourceType::PressApi => "1h",
    }
}

/// Parses a frequency string into hours. `"instant"` is `0`; a bare
/// integer or an `Nh`/`Nd` suffix is hours/days; anything unparseable
/// defaults to `24` so a misconfigured source still gets polled daily
/// rather than never.
pub fn parse_frequency_hours(freq: &str) -> f64 {
    let freq = freq.trim();
    if freq.eq_ignore_ascii_case("instant") {
        return 0.0;
    }
    if let Some(hours) = freq.strip_suffix(['h', 'H']) {
        return hours.trim().parse().unwrap_or(24.0);
    }
    if let Some(days) = freq.strip_suffix(['d', 'D']) {
        return days.trim().parse::<f64>().map(|d| d * 24.0).unwrap_or(24.0);
    }
    freq.parse().unwrap_or(24.0)
}

/// True if `source` is due to run: either it has never been fetched, or
/// `now - last_fetched >= freq` hours have elapsed.
pub fn is_due(source: &Source, now: DateTime<Utc>) -> bool {
    let Some(last_fetched) = source.last_fetched else {
        return true;
    };
    let freq_hours = parse_frequency_hours(&source.freq);
    if freq_hours <= 0.0 {
        return true;
    }
    let elapsed_hours = (now - last_fetched).num_seconds() as f64 / 3600.0;
    elapsed_hours >= freq_hours
}

/// Filters `sources` down to those due to run at `now`.
pub fn filter_due(sources: Vec<Source>, now: DateTime<Utc>) -> Vec<Source> {
    sources.into_iter().filter(|s| is_due(s, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(freq: &str, last_fetched: Option<DateTime<Utc>>) -> Source {
        Source {
            id: "s1".to_string(),
            url: "https://example.org".to_string(),
            source_type: SourceType::Html,
            freq: freq.to_string(),
            active: true,
            last_fetched,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn instant_frequency_parses_to_zero_hours() {
        assert_eq!(parse_frequency_hours("instant"), 0.0);
    }

    #[test]
    fn hour_and_day_suffixes_parse() {
        assert_eq!(parse_frequency_hours("6h"), 6.0);
        assert_eq!(parse_frequency_hours("1d"), 24.0);
        assert_eq!(parse_frequency_hours("12"), 12.0);
    }

    #[test]
    fn unparseable_frequency_defaults_to_daily() {
        assert_eq!(parse_frequency_hours("garbage"), 24.0);
    }

    #[test]
    fn never_fetched_source_is_always_due() {
        assert!(is_due(&source("6h", None), Utc::now()));
    }

    #[test]
    fn source_fetched_recently_is_not_due() {
        let now = Utc::now();
        let src = source("6h", Some(now - chrono::Duration::hours(1)));
        assert!(!is_due(&src, now));
    }

    #[test]
    fn source_past_its_frequency_window_is_due() {
        let now = Utc::now();
        let src = source("6h", Some(now - chrono::Duration::hours(7)));
        assert!(is_due(&src, now));
    }

    #[test]
    fn default_frequencies_match_the_scheduler_cadence_table() {
        assert_eq!(default_frequency_for(SourceType::EliSparql), "6h");
        assert_eq!(default_frequency_for(SourceType::Rss), "1h");
        assert_eq!(default_frequency_for(SourceType::Html), "24h");
    }
}
