pub mod combined;
pub mod keyword;
pub mod semantic;

pub use combined::{combined_match, combined_match_default, KEYWORD_WEIGHT, SEMANTIC_WEIGHT};
pub use keyword::{load_keyword_map, match_rules, DEFAULT_KEYWORD_MAP, KEYWORD_CONFIDENCE, KEYWORDS_ENV_VAR};
pub use semantic::{semantic_match, DEFAULT_THRESHOLD};
