pub mod engine;

pub use engine::{ingest, IngestRequest};
