mod embedding;
mod http;
mod input;
mod pipeline;
mod response;
mod store;

pub use embedding::EmbeddingClient;
pub use http::build_http_client;
pub use input::{InputSource, Lines, StopAt, read_lines};
pub use pipeline::{ItemOutcome, OutcomeStatus, Pipeline, PipelineOptions, RunSummary, Stage};
pub use response::ResponseClient;
pub use store::{DocumentStore, MongoStore, connect_store, parse_client_options};
