use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use codevec_core::{CodevecConfig, OutputFormat};
use codevec_index::embedding::{EmbeddingAggregator, EmbeddingClient, API_KEY_ENV};
use codevec_index::ingest::IngestionPipeline;
use codevec_index::search::SearchPipeline;
use codevec_index::store::open_store;
use codevec_walker::{parse_languages, Language};

const CONFIG_FILE: &str = ".codevec.toml";

#[derive(Parser)]
#[command(
    name = "codevec",
    version,
    about = "Semantic code search over function-level embeddings",
    long_about = "codevec indexes the functions and methods of a repository as embedding\n\
                   vectors and answers natural-language queries against them.\n\n\
                   Examples:\n  \
                     codevec init                          Write a default .codevec.toml\n  \
                     codevec index --path .                Index the current repository\n  \
                     codevec index --language rust         Index only Rust sources\n  \
                     codevec search 'retry with backoff'   Find the closest functions\n  \
                     codevec languages                     List supported languages"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .codevec.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, embed and store every function in a repository
    #[command(long_about = "Extract, embed and store every function in a repository.\n\n\
        Walks the repository (honoring .gitignore), parses each supported file with\n\
        tree-sitter and upserts one embedding per function or method. Files that fail\n\
        to read, parse or embed are skipped with a warning.\n\n\
        Examples:\n  codevec index\n  codevec index --path ../service --language go --language java")]
    Index {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Only index these languages (repeatable; default: config or all)
        #[arg(long = "language", short = 'l')]
        languages: Vec<String>,
    },
    /// Search the index with a natural-language query
    #[command(long_about = "Search the index with a natural-language query.\n\n\
        Embeds the query and returns the closest stored functions, nearest first.\n\n\
        Examples:\n  codevec search 'parse the config file'\n  codevec search 'http retry' --limit 10 --format json")]
    Search {
        /// Query text
        query: String,

        /// Repository path the index belongs to (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum results to return (default: config or 5)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create a default .codevec.toml in the current directory
    Init,
    /// List supported languages and their file extensions
    Languages,
}

const DEFAULT_CONFIG: &str = r#"# codevec configuration

[embedding]
# provider = "openai-compatible"   # "voyage" also sends input_type
# base_url = "https://api.openai.com/v1"
# model = "text-embedding-3-small"
# api_key = "..."            # or set CODEVEC_EMBEDDING_API_KEY
# max_input_chars = 8192
# timeout_secs = 60

[store]
# backend = "sqlite"         # or "chroma"
# path = ".codevec/index.db"
# url = "http://localhost:8000"
# tenant = "default_tenant"
# database = "default_database"
# collection = "my-project"  # default: repository directory name

[ingest]
# workers = 8
# languages = ["rust", "python"]

[search]
# limit = 5
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Index {
            ref path,
            ref languages,
        }) => {
            run_index(&config, path, languages, cli.format).await?;
        }
        Some(Command::Search {
            ref query,
            ref path,
            limit,
        }) => {
            let limit = limit.unwrap_or(config.search.limit);
            run_search(&config, path, query, limit, cli.format).await?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Languages) => {
            print_languages(cli.format)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<CodevecConfig> {
    let config = match explicit {
        Some(path) => CodevecConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                CodevecConfig::from_file(default_path)?
            } else {
                CodevecConfig::default()
            }
        }
    };
    tracing::debug!(backend = ?config.store.backend, model = %config.embedding.model, "configuration loaded");
    Ok(config)
}

/// Collection name from config, else the repository directory name.
fn collection_name(config: &CodevecConfig, root: &Path) -> String {
    if let Some(name) = &config.store.collection {
        return name.clone();
    }
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "codevec".to_string())
}

fn build_aggregator(config: &CodevecConfig) -> Result<EmbeddingAggregator> {
    if config.embedding.api_key.is_none() && std::env::var(API_KEY_ENV).is_err() {
        miette::bail!(miette::miette!(
            help = "Set {API_KEY_ENV} or add api_key in your {CONFIG_FILE} under [embedding]",
            "No API key configured for embedding provider '{}'",
            config.embedding.provider
        ));
    }
    let client = EmbeddingClient::with_config(&config.embedding)?;
    Ok(EmbeddingAggregator::new(
        Arc::new(client),
        config.embedding.max_input_chars,
    ))
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    if !std::io::stderr().is_terminal() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]").into_diagnostic()?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn run_index(
    config: &CodevecConfig,
    root: &Path,
    language_flags: &[String],
    format: OutputFormat,
) -> Result<()> {
    let names = if language_flags.is_empty() {
        config.ingest.languages.as_slice()
    } else {
        language_flags
    };
    let languages = parse_languages(names)?;

    let aggregator = build_aggregator(config)?;
    let store = open_store(&config.store, root)?;
    let collection = collection_name(config, root);

    let pipeline = IngestionPipeline::new(aggregator, store, collection.clone())
        .with_workers(config.ingest.workers)
        .with_languages(languages);

    let pb = spinner(format!("Indexing {} ...", root.display()))?;
    let result = pipeline.ingest_repo(root).await;
    pb.finish_and_clear();
    let stored = result?;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "collection": collection,
                "entries": stored,
            });
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!("Indexed {stored} functions into collection '{collection}'");
        }
    }
    Ok(())
}

async fn run_search(
    config: &CodevecConfig,
    root: &Path,
    query: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let aggregator = build_aggregator(config)?;
    let store = open_store(&config.store, root)?;
    let collection = collection_name(config, root);

    let search = SearchPipeline::new(aggregator, store, collection);
    let results = search.search(query, limit).await?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).into_diagnostic()?
            );
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results found.");
            }
            for (i, m) in results.iter().enumerate() {
                println!(
                    "{}. {} (distance: {:.4}, {} chars)",
                    i + 1,
                    m.id,
                    m.distance,
                    m.document_size,
                );
                let preview: String = m
                    .document
                    .lines()
                    .take(3)
                    .map(|l| format!("   {l}\n"))
                    .collect();
                print!("{preview}");
            }
        }
    }
    Ok(())
}

fn print_languages(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let list: Vec<_> = Language::ALL
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "name": l.name(),
                        "extensions": l.extensions(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list).into_diagnostic()?);
        }
        OutputFormat::Text => {
            for lang in Language::ALL {
                println!("{:<12} {}", lang.name(), lang.extensions().join(", "));
            }
        }
    }
    Ok(())
}
