pub mod defaults;
pub mod extract;
pub mod resolve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ldes_core::{EngineConfig, Taxonomy};

#[derive(Parser)]
#[command(
    name = "ldes",
    about = "Extract energy-storage project records from documents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract project records from plain-text documents
    Extract(ExtractArgs),
    /// Resolve a company or technology mention against the taxonomy
    Resolve {
        /// Free-text mention
        mention: String,
        /// Entity class: company or technology
        #[arg(long, default_value = "company")]
        class: String,
        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default engine configuration as TOML
    Defaults,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Plain-text document(s) to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Market sector of the documents
    #[arg(long, default_value = "ldes")]
    pub sector: String,
    /// Additional extraction rules (JSON list)
    #[arg(long)]
    pub rules: Option<PathBuf>,
    /// Span-labeling model endpoint
    #[arg(long)]
    pub recognizer_url: Option<String>,
    /// Chat-completions API root used for disambiguation
    #[arg(long)]
    pub llm_url: Option<String>,
    /// Model name sent to the LLM endpoint
    #[arg(long, default_value = "gpt-4o-mini")]
    pub llm_model: String,
    /// Sampling temperature for disambiguation calls
    #[arg(long, default_value_t = 0.0)]
    pub llm_temperature: f32,
    /// Bearer token for the LLM endpoint
    #[arg(long, env = "LDES_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
    /// Print batch totals to stderr when done
    #[arg(long)]
    pub summary: bool,
}

/// Read and validate the engine configuration, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

pub fn load_taxonomy(config: &EngineConfig) -> Result<Arc<Taxonomy>> {
    let taxonomy = Taxonomy::load(
        config.taxonomy.companies.as_deref(),
        config.taxonomy.technologies.as_deref(),
    )
    .context("loading taxonomy")?;
    tracing::debug!(entries = taxonomy.len(), "Taxonomy loaded");
    Ok(Arc::new(taxonomy))
}
