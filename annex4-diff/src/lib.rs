pub mod analyzer;
pub mod keywords;
pub mod linediff;
pub mod tfidf;

pub use analyzer::{analyze_changes, change_summary, ChangeType, LegalChange, Severity};
pub use tfidf::{corpus_cosine_similarities, semantic_similarity};
