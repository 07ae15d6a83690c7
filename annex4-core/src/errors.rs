use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnexError {
    #[error("regulation not found: {celex_id} v{version}")]
    RegulationNotFound { celex_id: String, version: String },

    #[error("rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("sparql query against {endpoint} failed: {reason}")]
    SparqlError { endpoint: String, reason: String },

    #[error("store conflict on {entity}: {reason}")]
    StoreConflict { entity: String, reason: String },

    #[error("database operation failed: {operation}: {reason}")]
    DatabaseError { operation: String, reason: String },

    #[error("validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("configuration error: {parameter}: {reason}")]
    ConfigurationError { parameter: String, reason: String },

    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

pub type AnnexResult<T> = Result<T, AnnexError>;

impl From<serde_json::Error> for AnnexError {
    fn from(err: serde_json::Error) -> Self {
        AnnexError::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for AnnexError {
    fn from(err: serde_yaml::Error) -> Self {
        AnnexError::ConfigurationError {
            parameter: "yaml".to_string(),
            reason: err.to_string(),
        }
    }
}
