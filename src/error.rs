//! Error types for embed-store.

use thiserror::Error;

/// Marks failures where the remote side could not be reached at all.
///
/// A connection-level failure aborts the run: every later item would hit the
/// same unreachable endpoint or database.
pub trait ConnectionLevel {
    fn is_connection_level(&self) -> bool;
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    InputSelection(String),
}

/// Errors raised while collecting input texts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read standard input: {0}")]
    StdinError(#[source] std::io::Error),

    #[error("no input texts found")]
    NoTexts,
}

/// Why a single request to the OpenAI-compatible API failed.
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("failed to connect to {url}: {message}")]
    ConnectionError { url: String, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("server returned status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("malformed response: {0}")]
    InvalidResponse(String),
}

impl ConnectionLevel for ApiFailure {
    fn is_connection_level(&self) -> bool {
        match self {
            ApiFailure::ConnectionError { .. } => true,
            ApiFailure::RequestError(e) => e.is_connect(),
            ApiFailure::Timeout | ApiFailure::ServerError { .. } | ApiFailure::InvalidResponse(_) => {
                false
            }
        }
    }
}

/// An embeddings request failed for one chunk.
#[derive(Debug, Error)]
#[error("embedding request for chunk starting at item {start_index} failed: {cause}")]
pub struct EmbeddingError {
    pub start_index: usize,
    pub cause: ApiFailure,
}

impl ConnectionLevel for EmbeddingError {
    fn is_connection_level(&self) -> bool {
        self.cause.is_connection_level()
    }
}

/// A responses request failed for one item.
#[derive(Debug, Error)]
#[error("response request for item {index} failed: {cause}")]
pub struct ResponseError {
    pub index: usize,
    pub cause: ApiFailure,
}

impl ConnectionLevel for ResponseError {
    fn is_connection_level(&self) -> bool {
        self.cause.is_connection_level()
    }
}

/// Errors related to the document database.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to connect to MongoDB: {0}")]
    ConnectionError(String),

    #[error("insert into {collection} failed: {source}")]
    InsertError {
        collection: String,
        #[source]
        source: mongodb::error::Error,
    },
}

impl ConnectionLevel for PersistenceError {
    fn is_connection_level(&self) -> bool {
        match self {
            PersistenceError::ConnectionError(_) => true,
            PersistenceError::InsertError { source, .. } => is_unreachable(source),
        }
    }
}

fn is_unreachable(error: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;

    matches!(
        *error.kind,
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("{0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Response(#[from] ResponseError),

    #[error("database error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl AppError {
    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 1,
            AppError::Input(_) => 2,
            AppError::Embedding(_) | AppError::Response(_) => 3,
            AppError::Persistence(_) => 4,
        }
    }
}
