//! Command-line interface for Klaviyo AI analysis
//!
//! # Usage
//!
//! ```bash
//! # Analyze the bundled sample data with the mock provider
//! klavicle analyze campaigns --sample
//!
//! # Analyze an exported file with OpenAI, last quarter only
//! export OPENAI_API_KEY=sk-...
//! klavicle analyze flows --input flows.json --provider openai --start 2024-01-01
//!
//! # Store a default model
//! klavicle config set ai.providers.openai.default_model gpt-4o-mini
//! ```

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use klavicle_analysis::{
    AnalysisConfig, AnalysisContext, AnalysisOrchestrator, AnalysisRequest, EntityType,
    JsonFileSource, StaticSource, collect_payload,
};
use klavicle_llm::ProviderKind;
use klavicle_utils::{ConfigManager, LogFormat, init_tracing_with};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "klavicle")]
#[command(about = "AI analysis of Klaviyo campaigns, flows and lists", long_about = None)]
struct Cli {
    /// Log output: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze entities, using cached results when available
    Analyze(AnalyzeArgs),
    /// Analyze entities, ignoring and replacing cached results
    Refresh(AnalyzeArgs),
    /// Delete cached results
    ClearCache {
        /// Only clear this entity type
        #[arg(value_parser = parse_entity_type)]
        entity_type: Option<EntityType>,

        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Read or change persisted settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// campaigns, flows, lists, tags, unified or any other name for a generic analysis
    #[arg(value_parser = parse_entity_type)]
    entity_type: EntityType,

    /// JSON file with records, or an object keyed by entity type
    #[arg(long, conflicts_with = "sample", required_unless_present = "sample")]
    input: Option<PathBuf>,

    /// Use the bundled sample data
    #[arg(long)]
    sample: bool,

    /// Extra instructions as key=value, repeatable
    #[arg(long = "context", value_parser = parse_key_value)]
    context: Vec<(String, String)>,

    /// Inclusive lower date bound
    #[arg(long)]
    start: Option<String>,

    /// Inclusive upper date bound
    #[arg(long)]
    end: Option<String>,

    /// Record field the date bounds apply to
    #[arg(long)]
    date_field: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Token budget above which records are batched
    #[arg(long)]
    max_tokens: Option<usize>,

    /// openai, anthropic or mock; defaults to the configured provider
    #[arg(long)]
    provider: Option<ProviderKind>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print a value by dotted key, or the whole file
    Get { key: Option<String> },
    /// Set a dotted key; the value is parsed as JSON when possible
    Set { key: String, value: String },
    /// Remove a dotted key
    Unset { key: String },
}

fn parse_entity_type(s: &str) -> Result<EntityType, String> {
    if s.trim().is_empty() {
        return Err("entity type cannot be empty".to_string());
    }
    Ok(EntityType::from_name(s))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn analysis_config(
    cache_dir: Option<PathBuf>,
    batch_size: Option<usize>,
    max_tokens: Option<usize>,
    date_field: Option<String>,
) -> anyhow::Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder();
    if let Some(dir) = cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(size) = batch_size {
        builder = builder.batch_size(size);
    }
    if let Some(tokens) = max_tokens {
        builder = builder.max_tokens(tokens);
    }
    if let Some(field) = date_field {
        builder = builder.date_field(field);
    }
    Ok(builder.build()?)
}

async fn run_analysis(args: AnalyzeArgs, refresh: bool) -> anyhow::Result<()> {
    let settings = ConfigManager::open_default()?;
    let config = analysis_config(args.cache_dir, args.batch_size, args.max_tokens, args.date_field)?;
    let orchestrator =
        AnalysisOrchestrator::from_credentials(&settings, args.provider, args.model, config)?;

    let payload = match &args.input {
        Some(path) => {
            let source = JsonFileSource::new(path);
            collect_payload(&source, args.entity_type).await
        }
        None => collect_payload(&StaticSource::sample(), args.entity_type).await,
    }
    .context("Failed to load entity data")?;

    let mut request = AnalysisRequest::new(args.entity_type, payload)
        .with_context(args.context.into_iter().collect::<AnalysisContext>())
        .force_refresh(refresh);
    if args.start.is_some() || args.end.is_some() {
        request = request.with_date_range(orchestrator.date_range(args.start, args.end));
    }

    info!(entity_type = %args.entity_type, refresh, "Starting analysis");
    let result = orchestrator.analyze(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_error() {
        bail!("analysis failed");
    }
    Ok(())
}

async fn clear_cache(entity_type: Option<EntityType>, cache_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = analysis_config(cache_dir, None, None, None)?;
    let cache = klavicle_analysis::ResultCache::new(config.cache_dir, config.cache_ttl);
    let removed = cache.clear(entity_type).await;
    println!("Removed {removed} cached result(s)");
    Ok(())
}

fn run_config(command: ConfigCommand) -> anyhow::Result<()> {
    let mut settings = ConfigManager::open_default()?;
    match command {
        ConfigCommand::Get { key: None } => {
            println!("{}", serde_json::to_string_pretty(settings.document())?);
        }
        ConfigCommand::Get { key: Some(key) } => match settings.get(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
            None => bail!("Key not found: {key}"),
        },
        ConfigCommand::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            settings.set(&key, value)?;
            println!("Updated {key} in {}", settings.path().display());
        }
        ConfigCommand::Unset { key } => {
            settings.unset(&key)?;
            println!("Removed {key} from {}", settings.path().display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with(LogFormat::from_name(&cli.log_format));

    match cli.command {
        Command::Analyze(args) => run_analysis(args, false).await,
        Command::Refresh(args) => run_analysis(args, true).await,
        Command::ClearCache {
            entity_type,
            cache_dir,
        } => clear_cache(entity_type, cache_dir).await,
        Command::Config(command) => run_config(command),
    }
}
