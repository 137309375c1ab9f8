mod config;
mod format;
mod record;

pub use config::{
    ApiConfig, Config, ConfigOverrides, ConfigSource, ConfigSources, DEFAULT_API_BASE,
    DEFAULT_BATCH_SIZE, DEFAULT_DB_NAME, DEFAULT_EMBEDDING_COLLECTION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_MONGO_URI, DEFAULT_RESPONSE_MODEL, DEFAULT_RESULT_COLLECTION, DEFAULT_TIMEOUT_SECS,
    DatabaseConfig, ModelConfig, ProcessingConfig, ResolvedConfig,
};
pub use format::OutputFormat;
pub use record::{
    DOCUMENT_SOURCE, EmbeddingRecord, EmbeddingResult, ResponseRecord, ResponseResult, TextItem,
    TokenUsage,
};
