use std::fmt::Write as FmtWrite;

use crate::models::OutputFormat;
use crate::services::{ItemOutcome, RunSummary};
use crate::utils::excerpt;

const PREVIEW_CHARS: usize = 60;

pub trait Formatter {
    fn format_outcome(&self, outcome: &ItemOutcome) -> String;
    fn format_summary(&self, summary: &RunSummary, target: &RunTarget) -> String;
    fn format_error(&self, error: &str) -> String;
}

/// Where a run wrote to, for the summary.
#[derive(Debug, Clone)]
pub struct RunTarget {
    pub embedding_namespace: String,
    pub result_namespace: Option<String>,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_outcome(&self, outcome: &ItemOutcome) -> String {
        let preview = excerpt(&outcome.text, PREVIEW_CHARS);
        if outcome.is_stored() {
            let mut line = format!("[OK]     #{} \"{}\"", outcome.index, preview);
            if let Some(dims) = outcome.dimensions {
                write!(line, " ({} dims)", dims).unwrap();
            }
            if let Some(ref usage) = outcome.usage {
                write!(line, " [{} tokens]", usage.total_tokens).unwrap();
            }
            line
        } else {
            format!(
                "[FAILED] #{} \"{}\": {}",
                outcome.index,
                preview,
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        }
    }

    fn format_summary(&self, summary: &RunSummary, target: &RunTarget) -> String {
        let mut output = String::new();
        writeln!(output).unwrap();
        writeln!(output, "Run Complete").unwrap();
        writeln!(output, "------------").unwrap();
        writeln!(output, "Items:           {}", summary.total).unwrap();
        writeln!(output, "Succeeded:       {}", summary.succeeded).unwrap();
        writeln!(output, "Failed:          {}", summary.failed).unwrap();
        writeln!(
            output,
            "Embeddings:      {} stored in {} ({} requests)",
            summary.embedding_documents, target.embedding_namespace, summary.embedding_requests
        )
        .unwrap();
        if let Some(ref results) = target.result_namespace {
            writeln!(
                output,
                "Responses:       {} stored in {} ({} requests)",
                summary.response_documents, results, summary.response_requests
            )
            .unwrap();
        }
        writeln!(output, "Duration:        {}ms", summary.duration_ms).unwrap();
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

/// Emits one JSON object per line: item outcomes, then the summary.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_outcome(&self, outcome: &ItemOutcome) -> String {
        // One line per item so the stream stays parseable as JSON lines.
        serde_json::json!({ "item": outcome }).to_string()
    }

    fn format_summary(&self, summary: &RunSummary, target: &RunTarget) -> String {
        serde_json::json!({
            "summary": summary,
            "embedding_collection": target.embedding_namespace,
            "result_collection": target.result_namespace,
        })
        .to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_outcome(&self, outcome: &ItemOutcome) -> String {
        let preview = excerpt(&outcome.text, PREVIEW_CHARS);
        if outcome.is_stored() {
            format!("- ✅ `#{}` {}", outcome.index, preview)
        } else {
            format!(
                "- ❌ `#{}` {}: {}",
                outcome.index,
                preview,
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        }
    }

    fn format_summary(&self, summary: &RunSummary, target: &RunTarget) -> String {
        let mut output = String::new();
        writeln!(output, "\n## Run Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Items | {} |", summary.total).unwrap();
        writeln!(output, "| Succeeded | {} |", summary.succeeded).unwrap();
        writeln!(output, "| Failed | {} |", summary.failed).unwrap();
        writeln!(
            output,
            "| Embeddings (`{}`) | {} |",
            target.embedding_namespace, summary.embedding_documents
        )
        .unwrap();
        if let Some(ref results) = target.result_namespace {
            writeln!(
                output,
                "| Responses (`{}`) | {} |",
                results, summary.response_documents
            )
            .unwrap();
        }
        writeln!(output, "| Duration | {}ms |", summary.duration_ms).unwrap();
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
