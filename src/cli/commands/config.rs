use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use super::OverrideArgs;
use crate::error::AppError;
use crate::models::{Config, ConfigOverrides, ConfigSource, OutputFormat, ResolvedConfig};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(long, help = "Show source of each configuration value")]
        source: bool,

        #[command(flatten)]
        settings: OverrideArgs,
    },
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show { source, settings } => {
            handle_show(settings.overrides(config_path), source, format)
        }
        ConfigCommand::Path => handle_path(config_path),
    }
}

fn handle_show(overrides: ConfigOverrides, show_source: bool, format: OutputFormat) -> Result<()> {
    let resolved = Config::resolve(&overrides).map_err(AppError::from)?;

    if format == OutputFormat::Json {
        // api_key is never serialized; report only whether one is set.
        let mut output = serde_json::json!({
            "config": resolved.config,
            "api_key_set": resolved.config.api.api_key.is_some(),
            "file": resolved.file_path,
        });
        if show_source {
            output["sources"] = serde_json::to_value(&resolved.sources)?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!("{}", render_config(&resolved, show_source));
    Ok(())
}

fn render_config(resolved: &ResolvedConfig, show_source: bool) -> String {
    let config = &resolved.config;
    let sources = &resolved.sources;
    let src = |s: ConfigSource| {
        if show_source {
            format!("  # {s}")
        } else {
            String::new()
        }
    };

    let mut out = String::new();
    match resolved.file_path {
        Some(ref path) => writeln!(out, "# Config file: {}", path.display()).unwrap(),
        None => writeln!(out, "# Config file: none").unwrap(),
    }
    writeln!(out).unwrap();

    writeln!(out, "[api]").unwrap();
    writeln!(out, "base_url = \"{}\"{}", config.api.base_url, src(sources.api_base)).unwrap();
    if config.api.api_key.is_some() {
        writeln!(out, "api_key = \"********\"{}", src(sources.api_key)).unwrap();
    }
    writeln!(
        out,
        "timeout_secs = {}{}",
        config.api.timeout_secs,
        src(sources.timeout_secs)
    )
    .unwrap();
    writeln!(out).unwrap();

    writeln!(out, "[database]").unwrap();
    writeln!(out, "uri = \"{}\"{}", config.database.uri, src(sources.mongo_uri)).unwrap();
    writeln!(out, "name = \"{}\"{}", config.database.name, src(sources.db_name)).unwrap();
    writeln!(
        out,
        "embedding_collection = \"{}\"{}",
        config.database.embedding_collection,
        src(sources.embedding_collection)
    )
    .unwrap();
    writeln!(
        out,
        "result_collection = \"{}\"{}",
        config.database.result_collection,
        src(sources.result_collection)
    )
    .unwrap();
    writeln!(out).unwrap();

    writeln!(out, "[models]").unwrap();
    writeln!(
        out,
        "embedding = \"{}\"{}",
        config.models.embedding,
        src(sources.embedding_model)
    )
    .unwrap();
    writeln!(
        out,
        "response = \"{}\"{}",
        config.models.response,
        src(sources.response_model)
    )
    .unwrap();
    writeln!(out).unwrap();

    writeln!(out, "[processing]").unwrap();
    writeln!(
        out,
        "batch_size = {}{}",
        config.processing.batch_size,
        src(sources.batch_size)
    )
    .unwrap();
    out
}

fn handle_path(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .or_else(Config::default_path)
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if path.exists() {
        println!("Config file (active): {}", path.display());
    } else {
        println!("Config file (would be): {}", path.display());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        } else {
            println!(".env file (would be): {}", env_path.display());
        }
    }

    Ok(())
}
