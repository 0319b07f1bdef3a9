//! kgrag CLI - ask questions over a knowledge graph

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kgrag_core::config::Config;
use kgrag_core::domain::knowledge::GraphStore;
use kgrag_core::domain::retrieval::EmbeddingIndex;
use kgrag_core::engine::{QueryEngine, validate_query};
use kgrag_core::infrastructure::knowledge::SqliteGraphStore;
use kgrag_core::ingest::{GraphImporter, IndexBuilder, read_edges, read_nodes, read_summaries};
use kgrag_core::llm::LlmClient;
use kgrag_core::storage::Database;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing::{info, warn};


#[derive(Parser)]
#[command(name = "kgrag")]
#[command(author, version, about = "Hybrid graph + vector question answering", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the knowledge base
    Ask {
        /// The question
        query: String,
        /// Also print the assembled context
        #[arg(long)]
        show_context: bool,
    },

    /// Interactive question loop
    Repl,

    /// Print the context assembled for a question, without answering it
    Context {
        /// The question
        query: String,
    },

    /// Load extracted nodes and edges into the graph store
    Import {
        /// JSON array of nodes
        #[arg(long)]
        nodes: PathBuf,
        /// JSON array of edges
        #[arg(long)]
        edges: PathBuf,
    },

    /// Embedding index management
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed nodes and summaries into an index file
    Build {
        /// JSON array of nodes
        #[arg(long)]
        nodes: PathBuf,
        /// JSON object of file name to summary
        #[arg(long)]
        summaries: PathBuf,
        /// Optional JSON array of edges stored alongside the embeddings
        #[arg(long)]
        edges: Option<PathBuf>,
        /// Output path (defaults to storage.index_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show index statistics
    Stats {
        /// Index path (defaults to storage.index_path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration
    List,
    /// Reset to defaults
    Reset,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let directive = if cli.verbose { "kgrag=debug" } else { "kgrag=info" };
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{}", describe_error(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ask {
            query,
            show_context,
        } => cmd_ask(&query, show_context, cli.format, cli.quiet).await,
        Commands::Repl => cmd_repl(cli.quiet).await,
        Commands::Context { query } => cmd_context(&query, cli.format).await,
        Commands::Import { nodes, edges } => {
            cmd_import(&nodes, &edges, cli.format, cli.quiet).await
        }
        Commands::Index { action } => cmd_index(action, cli.format, cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
        Commands::Doctor => cmd_doctor(cli.quiet).await,
    }
}

/// Render an error with its code and suggestion when it came from the core library
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<kgrag_core::Error>() {
        Some(core) => {
            let mut out = format!("Error [{}]: {}", core.code(), core);
            if let Some(suggestion) = core.suggestion() {
                out.push_str(&format!("\n  Suggestion: {}", suggestion));
            }
            out
        }
        None => format!("Error: {:#}", err),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ask(
    query: &str,
    show_context: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let query = validate_query(query)?;
    let config = Config::load()?;
    let engine = QueryEngine::connect(&config).await?;
    let result = engine.answer_with_context(query).await;
    engine.close().await;
    let answer = result?;

    if format == OutputFormat::Json {
        return print_json(&answer);
    }

    if show_context && !quiet {
        println!("Context:");
        println!("{}", answer.context.render());
        println!();
        println!("Answer:");
    }
    println!("{}", answer.response);
    Ok(())
}

async fn cmd_repl(quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let engine = QueryEngine::connect(&config).await?;
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;

    if !quiet {
        println!("Ask a question, or type 'exit' to quit.");
    }

    loop {
        match editor.readline("kgrag> ") {
            Ok(line) => {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                if matches!(query, "exit" | "quit") {
                    break;
                }
                let _ = editor.add_history_entry(query);
                match engine.answer(query).await {
                    Ok(response) => println!("{}\n", response),
                    Err(e) => eprintln!("{}\n", describe_error(&anyhow::Error::from(e))),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                engine.close().await;
                return Err(e).context("Failed to read input");
            }
        }
    }

    engine.close().await;
    Ok(())
}

async fn cmd_context(query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let query = validate_query(query)?;
    let config = Config::load()?;
    let engine = QueryEngine::connect(&config).await?;
    let result = engine.assembler().assemble(query).await;
    engine.close().await;
    let context = result?;

    match format {
        OutputFormat::Json => print_json(&context)?,
        OutputFormat::Text if context.is_empty() => println!("(no context)"),
        OutputFormat::Text => println!("{}", context.render()),
    }
    Ok(())
}

async fn cmd_import(
    nodes: &Path,
    edges: &Path,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let entities = read_nodes(nodes)?;
    let relationships = read_edges(edges)?;

    let db = Database::open(&config.storage.database_path).await?;
    let store = Arc::new(SqliteGraphStore::new(db.pool().clone()));
    let result = GraphImporter::new(store.clone())
        .import(&entities, &relationships)
        .await;
    let stats = store.get_stats().await;
    db.close().await;
    let report = result?;

    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if !quiet {
        println!(
            "Entities: {} inserted, {} updated, {} unchanged",
            report.entities_inserted, report.entities_updated, report.entities_unchanged
        );
        println!(
            "Edges: {} inserted, {} unchanged, {} skipped",
            report.edges_inserted, report.edges_unchanged, report.edges_skipped
        );
        if let Ok(stats) = stats {
            println!(
                "Graph now holds {} entities and {} relationships",
                stats.total_entities, stats.total_relationships
            );
        }
    }
    Ok(())
}

async fn cmd_index(action: IndexAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    match action {
        IndexAction::Build {
            nodes,
            summaries,
            edges,
            output,
        } => {
            let entities = read_nodes(&nodes)?;
            let summaries = read_summaries(&summaries)?;
            let output = output.unwrap_or_else(|| config.storage.index_path.clone());

            let client = Arc::new(LlmClient::new(config.llm.clone())?);
            let builder = IndexBuilder::new(client.clone()).with_model(client.embedding_model());
            let (mut snapshot, report) = builder.build(&entities, &summaries).await?;
            if let Some(edges) = edges {
                snapshot.relationships = read_edges(&edges)?;
            }
            snapshot.save(&output)?;
            info!(path = %output.display(), "Index written");

            if format == OutputFormat::Json {
                return print_json(&report);
            }
            if !quiet {
                println!(
                    "Embedded {} nodes and {} summaries into {}",
                    report.nodes_embedded,
                    report.summaries_embedded,
                    output.display()
                );
                if !report.skipped.is_empty() {
                    println!("Skipped: {}", report.skipped.join(", "));
                }
            }
        }
        IndexAction::Stats { path } => {
            let path = path.unwrap_or_else(|| config.storage.index_path.clone());
            let stats = EmbeddingIndex::load(&path)?.stats();

            if format == OutputFormat::Json {
                return print_json(&stats);
            }
            println!("Index: {}", path.display());
            println!("  Nodes: {}", stats.node_count);
            println!("  Summaries: {}", stats.summary_count);
            match stats.dimension {
                Some(dimension) => println!("  Dimension: {}", dimension),
                None => println!("  Dimension: -"),
            }
            if let Some(model) = stats.embedding_model {
                println!("  Model: {}", model);
            }
            if let Some(built_at) = stats.built_at {
                println!("  Built: {}", built_at.to_rfc3339());
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("kgrag Health Check");
        println!("==================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            config
        }
        Err(e) => {
            if !quiet {
                println!("[!!] Configuration: Error - {:#}", e);
                println!();
                println!("Some checks failed. See above for details.");
            }
            return Ok(());
        }
    };

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    // Graph store
    match Database::open(&config.storage.database_path).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Graph store: Connected");
                        println!("     Path: {}", db.path().display());
                    }
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => {
                            all_ok = false;
                            if !quiet {
                                println!(
                                    "[!!] Graph store: Migrations pending (v{} -> v{})",
                                    status.current_version, status.target_version
                                );
                            }
                        }
                        Ok(status) => {
                            if !quiet {
                                println!("[OK] Graph store: Schema v{}", status.current_version);
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            if !quiet {
                                println!("[!!] Graph store: Migration check failed - {}", e);
                            }
                        }
                    }

                    let store = SqliteGraphStore::new(db.pool().clone());
                    match store.get_stats().await {
                        Ok(stats) if stats.total_entities == 0 => {
                            all_ok = false;
                            if !quiet {
                                println!("[!!] Graph store: Empty");
                                println!("     Run `kgrag import --nodes <file> --edges <file>`");
                            }
                        }
                        Ok(stats) => {
                            if !quiet {
                                println!(
                                    "     Entities: {}, Relationships: {}, Labels: {}",
                                    stats.total_entities,
                                    stats.total_relationships,
                                    stats.distinct_labels
                                );
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            if !quiet {
                                println!("[!!] Graph store: Stats failed - {}", e);
                            }
                        }
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Graph store: Health check failed - {}", e);
                    }
                }
            }
            db.close().await;
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Graph store: Failed to open - {:#}", e);
            }
        }
    }

    // Embedding index
    match EmbeddingIndex::load(&config.storage.index_path) {
        Ok(index) => {
            let stats = index.stats();
            if !quiet {
                println!(
                    "[OK] Index: {} nodes, {} summaries",
                    stats.node_count, stats.summary_count
                );
                println!("     Path: {}", config.storage.index_path.display());
            }
            if let Some(model) = &stats.embedding_model {
                if model != &config.llm.embedding_model {
                    warn!(index_model = %model, configured = %config.llm.embedding_model, "Embedding model mismatch");
                    if !quiet {
                        println!(
                            "[!!] Index: built with '{}' but llm.embedding_model is '{}'",
                            model, config.llm.embedding_model
                        );
                    }
                    all_ok = false;
                }
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Index: {}", e);
            }
        }
    }

    // Model server
    match LlmClient::new(config.llm.clone()) {
        Ok(client) => match client.list_models().await {
            Ok(models) => {
                if !quiet {
                    println!("[OK] Model server: {}", client.base_url());
                }
                for model in [client.generation_model(), client.embedding_model()] {
                    if has_model(&models, model) {
                        if !quiet {
                            println!("[OK] Model: {}", model);
                        }
                    } else {
                        all_ok = false;
                        if !quiet {
                            println!("[!!] Model: {} not installed", model);
                        }
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Model server: {} - {}", client.base_url(), e);
                }
            }
        },
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Model server: {}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

/// Installed model names carry a tag (`llama3.2:latest`); a bare name matches any tag
fn has_model(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|name| {
        name == wanted
            || (!wanted.contains(':')
                && name.split_once(':').map(|(base, _)| base) == Some(wanted))
    })
}
