//! Document store abstraction and the MongoDB backend.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::debug;

use crate::error::{AppError, ConfigError, PersistenceError};
use crate::models::{DatabaseConfig, EmbeddingRecord, ResponseRecord};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const APP_NAME: &str = "embed-store";

/// Abstract trait for the persistence writer.
///
/// One call writes one document; there is no transaction across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check the database is reachable.
    async fn ping(&self) -> Result<(), PersistenceError>;

    /// Insert one document into the embeddings collection.
    async fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<(), PersistenceError>;

    /// Insert one document into the result collection.
    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), PersistenceError>;

    /// `database.collection` names, for reporting.
    fn namespaces(&self) -> (String, String);
}

/// MongoDB backend. One client, opened once and reused for every write.
pub struct MongoStore {
    database: Database,
    embeddings: Collection<EmbeddingRecord>,
    results: Collection<ResponseRecord>,
}

/// Parse a connection string into driver options.
///
/// A malformed URI is a configuration error; anything else the driver hits
/// while parsing (such as an SRV lookup) means the server is unreachable.
pub async fn parse_client_options(uri: &str) -> Result<ClientOptions, AppError> {
    let mut options = ClientOptions::parse(uri).await.map_err(|e| {
        if matches!(*e.kind, ErrorKind::InvalidArgument { .. }) {
            AppError::from(ConfigError::Invalid {
                field: "mongo_uri",
                message: e.to_string(),
            })
        } else {
            AppError::from(PersistenceError::ConnectionError(e.to_string()))
        }
    })?;
    options.app_name = Some(APP_NAME.to_string());
    if options.server_selection_timeout.is_none() {
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    }
    Ok(options)
}

impl MongoStore {
    /// Build the client. The driver connects lazily; use [`DocumentStore::ping`]
    /// to fail fast on an unreachable server.
    pub fn new(options: ClientOptions, config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let client = Client::with_options(options)
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;
        let database = client.database(&config.name);

        Ok(Self {
            embeddings: database.collection(&config.embedding_collection),
            results: database.collection(&config.result_collection),
            database,
        })
    }

    fn namespace<T: Send + Sync>(&self, collection: &Collection<T>) -> String {
        format!("{}.{}", self.database.name(), collection.name())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), PersistenceError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))
    }

    async fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<(), PersistenceError> {
        self.embeddings
            .insert_one(record)
            .await
            .map_err(|source| PersistenceError::InsertError {
                collection: self.namespace(&self.embeddings),
                source,
            })?;
        debug!(id = %record.id, index = record.index, "stored embedding");
        Ok(())
    }

    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), PersistenceError> {
        self.results
            .insert_one(record)
            .await
            .map_err(|source| PersistenceError::InsertError {
                collection: self.namespace(&self.results),
                source,
            })?;
        debug!(id = %record.id, index = record.index, "stored response");
        Ok(())
    }

    fn namespaces(&self) -> (String, String) {
        (
            self.namespace(&self.embeddings),
            self.namespace(&self.results),
        )
    }
}

/// Create the store for this configuration and verify it is reachable.
pub async fn connect_store(
    options: ClientOptions,
    config: &DatabaseConfig,
) -> Result<Box<dyn DocumentStore>, PersistenceError> {
    let store = MongoStore::new(options, config)?;
    store.ping().await?;
    Ok(Box::new(store))
}
