pub mod backoff;
pub mod extractor;
pub mod fetcher;
pub mod robots;
pub mod rss;
pub mod sparql;

pub use extractor::{NaiveHtmlTextExtractor, NullTextExtractor, TextExtractor};
pub use fetcher::Fetcher;
pub use robots::{RobotsPolicy, DEFAULT_USER_AGENT};
pub use rss::{RssEntry, RssReader};
pub use sparql::{ItemFormat, ManifestationItem, SparqlClient, SparqlMetadata};
