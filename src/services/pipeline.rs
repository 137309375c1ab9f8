//! Sequential processing of collected texts: embed per chunk, then store and
//! optionally respond per item.

use std::time::Instant;

use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{DocumentStore, EmbeddingClient, ResponseClient};
use crate::error::{AppError, ConnectionLevel};
use crate::models::{EmbeddingRecord, EmbeddingResult, ResponseRecord, TextItem, TokenUsage};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Collecting,
    Processing,
    Reporting,
    Done,
    Aborted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Configuring => "configuring",
            Stage::Collecting => "collecting",
            Stage::Processing => "processing",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Abort on the first failure of any kind, not only connection-level ones.
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Stored,
    Failed,
}

/// What happened to one input item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub index: usize,
    pub text: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    fn failed(item: &TextItem, error: String) -> Self {
        Self {
            index: item.index,
            text: item.text.clone(),
            status: OutcomeStatus::Failed,
            document_id: None,
            dimensions: None,
            response_id: None,
            usage: None,
            error: Some(error),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.status == OutcomeStatus::Stored
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub embedding_requests: usize,
    pub response_requests: usize,
    pub embedding_documents: usize,
    pub response_documents: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        if outcome.is_stored() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Wires the API clients to the document store.
///
/// API batching and storage granularity are independent: one embeddings
/// request per chunk, one document per item.
pub struct Pipeline<'a> {
    embeddings: &'a EmbeddingClient,
    responses: Option<&'a ResponseClient>,
    store: &'a dyn DocumentStore,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        embeddings: &'a EmbeddingClient,
        responses: Option<&'a ResponseClient>,
        store: &'a dyn DocumentStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            embeddings,
            responses,
            store,
            options,
        }
    }

    /// Process every item in order, calling `report` once per item.
    ///
    /// Per-item and per-chunk failures are reported and skipped. Connection-level
    /// failures, or any failure with `fail_fast`, end the run with an error;
    /// documents already written stay written.
    pub async fn run<F>(&self, items: &[TextItem], mut report: F) -> Result<RunSummary, AppError>
    where
        F: FnMut(&ItemOutcome),
    {
        let start = Instant::now();
        let mut summary = RunSummary {
            total: items.len(),
            ..Default::default()
        };

        for chunk in self.embeddings.chunks(items) {
            let start_index = chunk[0].index;
            let texts: Vec<String> = chunk.iter().map(|item| item.text.clone()).collect();

            summary.embedding_requests += 1;
            debug!(start_index, size = chunk.len(), "requesting embeddings");

            let vectors = match self.embeddings.embed_chunk(&texts, start_index).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    if self.options.fail_fast || e.is_connection_level() {
                        return Err(e.into());
                    }
                    warn!(start_index, error = %e, "embedding chunk failed");
                    let message = e.to_string();
                    for item in chunk {
                        let outcome = ItemOutcome::failed(item, message.clone());
                        summary.record(&outcome);
                        report(&outcome);
                    }
                    continue;
                }
            };

            for (item, vector) in chunk.iter().zip(vectors) {
                let outcome = self.process_item(item, vector, &mut summary).await?;
                summary.record(&outcome);
                report(&outcome);
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    async fn process_item(
        &self,
        item: &TextItem,
        vector: Vec<f32>,
        summary: &mut RunSummary,
    ) -> Result<ItemOutcome, AppError> {
        let id = ObjectId::new();
        let dimensions = vector.len();
        let result = EmbeddingResult {
            item: item.clone(),
            vector,
            model: self.embeddings.model().to_string(),
        };

        if let Err(e) = self
            .store
            .insert_embedding(&EmbeddingRecord::new(id, &result))
            .await
        {
            if self.options.fail_fast || e.is_connection_level() {
                return Err(e.into());
            }
            warn!(index = item.index, error = %e, "failed to store embedding");
            return Ok(ItemOutcome::failed(item, e.to_string()));
        }
        summary.embedding_documents += 1;

        let mut outcome = ItemOutcome {
            index: item.index,
            text: item.text.clone(),
            status: OutcomeStatus::Stored,
            document_id: Some(id.to_hex()),
            dimensions: Some(dimensions),
            response_id: None,
            usage: None,
            error: None,
        };

        let Some(responses) = self.responses else {
            return Ok(outcome);
        };

        summary.response_requests += 1;
        let response = match responses.respond(item).await {
            Ok(response) => response,
            Err(e) => {
                if self.options.fail_fast || e.is_connection_level() {
                    return Err(e.into());
                }
                warn!(index = item.index, error = %e, "response request failed");
                outcome.status = OutcomeStatus::Failed;
                outcome.error = Some(format!("embedding stored; {e}"));
                return Ok(outcome);
            }
        };

        if let Err(e) = self
            .store
            .insert_response(&ResponseRecord::new(id, &response))
            .await
        {
            if self.options.fail_fast || e.is_connection_level() {
                return Err(e.into());
            }
            warn!(index = item.index, error = %e, "failed to store response");
            outcome.status = OutcomeStatus::Failed;
            outcome.error = Some(format!("embedding stored; {e}"));
            return Ok(outcome);
        }
        summary.response_documents += 1;

        outcome.response_id = response.response_id;
        outcome.usage = response.usage;
        Ok(outcome)
    }
}
