//! CLI module for embed-store.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Generate embeddings and responses from an OpenAI-compatible API and store them in MongoDB.
#[derive(Debug, Parser)]
#[command(name = "embed-store")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[arg(long, global = true, help = "Output format: text, json, or markdown")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "config", global = true, help = "Path to a TOML config file")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: commands::RunArgs,
}

/// Available subcommands. Without one, texts are processed.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect the effective configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
