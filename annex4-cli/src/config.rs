//! Loads the Source configuration YAML for `update-all --config` and
//! syncs it into the store. Mirrors spec section 6's reload semantics:
//! unknown keys land in `Source.extra`; on reload `url` and `type` for
//! an existing `id` are preserved while `active`, `freq` and `extra`
//! are overwritten (enforced by `RegulationStore::upsert_source_config`,
//! not by this module).

use annex4_core::{AnnexError, AnnexResult, RegulationStore, Source, SourceType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawSource {
    id: String,
    url: String,
    #[serde(rename = "type")]
    source_type: String,
    freq: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    sources: Vec<RawSource>,
}

pub struct SourceConfig {
    sources: Vec<Source>,
}

impl SourceConfig {
    pub fn load(path: &Path) -> AnnexResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnnexError::ConfigurationError {
            parameter: "config".to_string(),
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let raw: RawConfig = serde_yaml::from_str(&text).map_err(|e| AnnexError::ConfigurationError {
            parameter: "config".to_string(),
            reason: format!("malformed source config: {e}"),
        })?;

        let sources = raw
            .sources
            .into_iter()
            .map(|r| {
                let source_type = source_type_from_config(&r.source_type)?;
                Ok(Source {
                    id: r.id,
                    url: r.url,
                    source_type,
                    freq: r.freq,
                    active: r.active,
                    last_fetched: None,
                    extra: r.extra,
                })
            })
            .collect::<AnnexResult<Vec<_>>>()?;

        Ok(Self { sources })
    }

    /// Applies every entry through `upsert_source_config`, which takes
    /// care of preserving `url`/`type` for ids that already exist.
    pub async fn sync_into<S: RegulationStore + ?Sized>(&self, store: &S) -> AnnexResult<()> {
        for source in &self.sources {
            store.upsert_source_config(source.clone()).await?;
        }
        Ok(())
    }
}

fn source_type_from_config(raw: &str) -> AnnexResult<SourceType> {
    match raw {
        "eli_sparql" => Ok(SourceType::EliSparql),
        "rss" => Ok(SourceType::Rss),
        "html" => Ok(SourceType::Html),
        "press_api" => Ok(SourceType::PressApi),
        other => Err(AnnexError::ConfigurationError {
            parameter: "type".to_string(),
            reason: format!("unknown source type '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_sources_and_captures_unknown_keys_into_extra() {
        let dir = std::env::temp_dir().join(format!("annex4-cli-test-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sources.yaml");
        std::fs::write(
            &path,
            r#"
sources:
  - id: ai-act
    url: https://eur-lex.europa.eu/eli/reg/2024/1689/oj
    type: eli_sparql
    freq: 6h
    active: true
    celex_id: "32024R1689"
    consolidated: true
  - id: commission-press
    url: https://ec.europa.eu/commission/presscorner/api/documents
    type: press_api
    freq: 1h
    active: false
"#,
        )
        .unwrap();

        let config = SourceConfig::load(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        let ai_act = config.sources.iter().find(|s| s.id == "ai-act").unwrap();
        assert_eq!(ai_act.source_type, SourceType::EliSparql);
        assert_eq!(ai_act.extra_str("celex_id"), Some("32024R1689"));
        assert!(ai_act.extra_bool("consolidated"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_an_unknown_source_type() {
        let dir = std::env::temp_dir().join(format!("annex4-cli-test-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sources.yaml");
        std::fs::write(&path, "sources:\n  - id: x\n    url: https://example.org\n    type: carrier_pigeon\n    freq: 1h\n").unwrap();

        let err = SourceConfig::load(&path).unwrap_err();
        assert!(matches!(err, AnnexError::ConfigurationError { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
