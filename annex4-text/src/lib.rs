pub mod parser;
pub mod sanitize;

pub use parser::{parse_rules, RuleRecord};
pub use sanitize::sanitize_content;
