//! Default command: collect texts, embed them, store the results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::cli::output::{RunTarget, get_formatter};
use crate::error::{AppError, InputError};
use crate::models::{Config, ConfigOverrides, OutputFormat};
use crate::services::{
    EmbeddingClient, InputSource, Pipeline, PipelineOptions, ResponseClient, Stage,
    build_http_client, connect_store, parse_client_options,
};

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Text to process
    #[arg(long, short = 't')]
    pub text: Option<String>,

    /// Path to a newline-delimited file of texts
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Read text lines from standard input until a blank line
    #[arg(long, short = 'c')]
    pub console: bool,

    #[command(flatten)]
    pub settings: OverrideArgs,

    /// Only generate embeddings; skip the responses endpoint
    #[arg(long)]
    pub no_responses: bool,

    /// Abort on the first failed item instead of continuing
    #[arg(long)]
    pub fail_fast: bool,
}

impl RunArgs {
    pub fn overrides(&self, config_path: Option<PathBuf>) -> ConfigOverrides {
        self.settings.overrides(config_path)
    }
}

/// Per-run configuration flags; each one wins over env, file and default.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// OpenAI-compatible API base URL [env: OPENAI_API_BASE]
    #[arg(long)]
    pub api_base: Option<String>,

    /// API key sent as a bearer token [env: OPENAI_API_KEY]
    #[arg(long)]
    pub api_key: Option<String>,

    /// MongoDB connection string [env: MONGO_URI]
    #[arg(long)]
    pub mongo_uri: Option<String>,

    /// Database name [env: DB_NAME]
    #[arg(long)]
    pub db_name: Option<String>,

    /// Collection for embedding documents [env: EMBEDDING_COLLECTION]
    #[arg(long)]
    pub embedding_collection: Option<String>,

    /// Collection for response documents [env: RESULT_COLLECTION]
    #[arg(long)]
    pub result_collection: Option<String>,

    /// Embedding model [env: EMBEDDING_MODEL]
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Response model [env: RESPONSE_MODEL]
    #[arg(long)]
    pub response_model: Option<String>,

    /// Number of texts per embeddings request [env: BATCH_SIZE]
    #[arg(long)]
    pub batch_size: Option<String>,

    /// HTTP request timeout in seconds [env: REQUEST_TIMEOUT_SECS]
    #[arg(long)]
    pub timeout_secs: Option<String>,
}

impl OverrideArgs {
    pub fn overrides(&self, config_path: Option<PathBuf>) -> ConfigOverrides {
        ConfigOverrides {
            config_path,
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            mongo_uri: self.mongo_uri.clone(),
            db_name: self.db_name.clone(),
            embedding_collection: self.embedding_collection.clone(),
            result_collection: self.result_collection.clone(),
            embedding_model: self.embedding_model.clone(),
            response_model: self.response_model.clone(),
            batch_size: self.batch_size.clone(),
            timeout_secs: self.timeout_secs.clone(),
        }
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}

pub async fn handle_run(
    args: RunArgs,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let result = execute(args, config_path, format).await;
    if result.is_err() {
        enter(Stage::Aborted);
    }
    result
}

async fn execute(args: RunArgs, config_path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    enter(Stage::Configuring);
    let resolved = Config::resolve(&args.overrides(config_path)).map_err(AppError::from)?;
    let config = resolved.config;
    let source =
        InputSource::from_args(args.text, args.file, args.console).map_err(AppError::from)?;
    let http = build_http_client(&config.api).map_err(AppError::from)?;
    let mongo_options = parse_client_options(&config.database.uri).await?;

    enter(Stage::Collecting);
    let description = source.describe();
    let items = tokio::task::spawn_blocking(move || source.collect())
        .await
        .context("input reader stopped unexpectedly")?
        .map_err(AppError::from)?;
    if items.is_empty() {
        return Err(AppError::from(InputError::NoTexts).into());
    }
    info!(count = items.len(), source = %description, "collected input");

    let store = connect_store(mongo_options, &config.database)
        .await
        .map_err(AppError::from)?;
    let (embedding_namespace, result_namespace) = store.namespaces();

    let embeddings = EmbeddingClient::new(http.clone(), &config);
    let responses = (!args.no_responses).then(|| ResponseClient::new(http, &config));
    let pipeline = Pipeline::new(
        &embeddings,
        responses.as_ref(),
        store.as_ref(),
        PipelineOptions {
            fail_fast: args.fail_fast,
        },
    );

    enter(Stage::Processing);
    let pb = if format == OutputFormat::Text {
        ProgressBar::new(items.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let result = pipeline
        .run(&items, |outcome| {
            pb.suspend(|| println!("{}", formatter.format_outcome(outcome)));
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();
    let summary = result?;

    enter(Stage::Reporting);
    let target = RunTarget {
        embedding_namespace,
        result_namespace: responses.is_some().then_some(result_namespace),
    };
    println!(
        "{}",
        formatter.format_summary(&summary, &target).trim_end()
    );

    enter(Stage::Done);
    Ok(())
}
