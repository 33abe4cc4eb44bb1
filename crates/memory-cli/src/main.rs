//! `cortex-memory` CLI: thin command plumbing over the engine crates,
//! plus the hook-install utility (§4.11). Every subcommand constructs
//! its own store/embedder from the loaded config and exits; this is
//! deliberately not a long-running process (that's `memory-server`'s
//! job).

mod hook;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use memory_capture::{CaptureConfig, CapturePipeline, CaptureRequest};
use memory_context::{ContextAssembler, ContextRequest};
use memory_core::config::CortexMemoryConfig;
use memory_core::model::SearchFilters;
use memory_core::traits::{Embedder, MemoryStore};
use memory_lifecycle::{LifecycleConfig, LifecycleManager};
use memory_llm::{ChatClient, ChatClientConfig, HttpEmbedder, HttpEmbedderConfig, HttpMemoryExtractor, RuleBasedClassifier};
use memory_metrics::Metrics;
use memory_storage::QdrantStore;

#[derive(Parser)]
#[command(name = "cortex-memory")]
#[command(author, version, about = "Persistent memory engine for conversational agents", long_about = None)]
struct Cli {
    /// Path to the TOML config file; falls back to defaults if absent.
    #[arg(short, long, default_value = "cortex-memory.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a dialogue turn via the extractor/dedup pipeline.
    Remember {
        #[arg(long)]
        user_message: Option<String>,
        #[arg(long)]
        assistant_message: Option<String>,
        #[arg(long, default_value = "cli")]
        session_id: String,
        #[arg(long)]
        project: Option<String>,
        /// Read a JSON body ({"user_message","assistant_message","session_id","project"}) from stdin.
        #[arg(long)]
        stdin: bool,
    },
    /// Assemble pre-turn context for a query.
    Recall {
        query: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 0)]
        token_budget: usize,
    },
    /// Delete a memory by id.
    Forget { id: String },
    /// Raw similarity search (no ranking/formatting).
    Search {
        query: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print process-wide metrics and store counts.
    Stats,
    /// Run the lifecycle manager's four phases once.
    Lifecycle {
        #[arg(long)]
        dry_run: bool,
    },
    /// Index a directory of markdown files.
    Index {
        path: PathBuf,
        #[arg(long, default_value = "")]
        project: String,
    },
    /// Bulk-import memory records from a JSON/JSONL file.
    Import { path: PathBuf },
    /// Install or inspect the post-turn capture hook.
    Hooks {
        #[command(subcommand)]
        action: HookAction,
    },
    /// Validate the loaded configuration and exit.
    CheckConfig,
}

#[derive(Subcommand)]
enum HookAction {
    Install,
    Path,
}

fn load_config(path: &PathBuf) -> anyhow::Result<CortexMemoryConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(raw) => CortexMemoryConfig::from_toml(&raw)?,
        Err(_) => {
            tracing::warn!(path = %path.display(), "no config file found, using defaults");
            CortexMemoryConfig::default()
        }
    };
    config.apply_env_overrides();
    config.validate().map_err(|msg| anyhow::anyhow!("invalid configuration: {msg}"))?;
    Ok(config)
}

fn build_store(config: &CortexMemoryConfig) -> Arc<dyn MemoryStore> {
    Arc::new(QdrantStore::new(&config.storage, config.embedding.dimension))
}

fn build_embedder(config: &CortexMemoryConfig) -> Arc<dyn Embedder> {
    Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
        url: config.embedding.url.clone(),
        model: config.embedding.model.clone(),
        dimension: config.embedding.dimension,
        max_batch_workers: config.embedding.max_batch_workers,
    }))
}

fn llm_chat_config() -> ChatClientConfig {
    ChatClientConfig {
        url: std::env::var("CORTEX_MEMORY_LLM_URL").unwrap_or_else(|_| "http://localhost:8082/complete".to_string()),
        model: std::env::var("CORTEX_MEMORY_LLM_MODEL").unwrap_or_else(|_| "default".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Remember {
            user_message,
            assistant_message,
            session_id,
            project,
            stdin,
        } => {
            let request = if stdin {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                serde_json::from_str(&buf)?
            } else {
                CaptureRequest {
                    user_message: user_message.ok_or_else(|| anyhow::anyhow!("--user-message is required without --stdin"))?,
                    assistant_message: assistant_message
                        .ok_or_else(|| anyhow::anyhow!("--assistant-message is required without --stdin"))?,
                    session_id,
                    project,
                }
            };

            let store = build_store(&config);
            let embedder = build_embedder(&config);
            let metrics = Arc::new(Metrics::new());
            let extractor = Arc::new(HttpMemoryExtractor::new(ChatClient::new(llm_chat_config())));
            let pipeline = CapturePipeline::new(
                store,
                embedder,
                extractor,
                Arc::new(RuleBasedClassifier::new()),
                metrics,
                CaptureConfig {
                    dedup_threshold: config.engine.dedup_threshold_hook as f32,
                    min_confidence: config.engine.min_capture_confidence,
                    ..CaptureConfig::default()
                },
            );
            // Hook entry points swallow errors and exit successfully so
            // a broken memory backend never breaks the host agent turn.
            match pipeline.capture_turn(&request).await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report_to_json(&report))?),
                Err(err) => tracing::warn!(error = %err, "capture failed, continuing"),
            }
        }

        Command::Recall {
            query,
            project,
            token_budget,
        } => {
            let store = build_store(&config);
            let embedder = build_embedder(&config);
            let metrics = Arc::new(Metrics::new());
            let assembler = ContextAssembler::new(store, embedder, config.ranker, metrics, config.engine.default_context_token_budget)
                .with_search_limit(config.engine.default_search_limit);
            let result = assembler
                .assemble_context(&ContextRequest {
                    query,
                    project,
                    token_budget,
                })
                .await?;
            println!("{}", result.context_string);
            eprintln!("({} memories, {} tokens)", result.memory_count, result.tokens_used);
        }

        Command::Forget { id } => {
            let store = build_store(&config);
            store.delete(&id).await?;
            println!("deleted {id}");
        }

        Command::Search { query, project, limit } => {
            let store = build_store(&config);
            let embedder = build_embedder(&config);
            let vector = embedder.embed_one(&query).await?;
            let filters = match project {
                Some(p) => SearchFilters::with_project(p),
                None => SearchFilters::default(),
            };
            let hits = store.search(&vector, limit, &filters).await?;
            for hit in hits {
                println!("{:.4}\t{}\t{}", hit.score, hit.memory.id, hit.memory.content);
            }
        }

        Command::Stats => {
            let store = build_store(&config);
            let stats = store.stats().await?;
            println!("total: {}", stats.total);
            for (ty, count) in stats.by_type {
                println!("  type {ty}: {count}");
            }
            for (scope, count) in stats.by_scope {
                println!("  scope {scope}: {count}");
            }
        }

        Command::Lifecycle { dry_run } => {
            let store = build_store(&config);
            let metrics = Arc::new(Metrics::new());
            let manager = LifecycleManager::new(store, metrics, LifecycleConfig::default());
            let (report, errors) = manager.run(dry_run).await;
            println!("{report:?}");
            for err in errors {
                tracing::warn!(phase = err.phase, message = %err.message, "lifecycle phase reported an error");
            }
        }

        Command::Index { path, project } => {
            let store = build_store(&config);
            let embedder = build_embedder(&config);
            let metrics = Arc::new(Metrics::new());
            let indexer = memory_index::MarkdownIndexer::new(store, embedder, metrics, config.engine.clone());
            let report = indexer.index_directory(&path, &project).await?;
            println!("{report:?}");
        }

        Command::Import { path } => {
            let text = std::fs::read_to_string(&path)?;
            let report = memory_import::parse_import(&text)?;
            let store = build_store(&config);
            let embedder = build_embedder(&config);
            let mut imported = 0usize;
            for record in &report.records {
                let vector = embedder.embed_one(&record.content).await?;
                store.upsert(record, &vector).await?;
                imported += 1;
            }
            println!(
                "parsed {} / blank skipped {} / backfilled {} / imported {}",
                report.parsed, report.blank_skipped, report.timestamps_backfilled, imported
            );
        }

        Command::Hooks { action } => match action {
            HookAction::Install => {
                if hook::install() {
                    if let Some(path) = hook::default_hook_path() {
                        println!("installed hook at {}", path.display());
                    }
                } else {
                    println!("hook install failed (see logs); continuing without it");
                }
            }
            HookAction::Path => {
                if let Some(path) = hook::default_hook_path() {
                    println!("{}", path.display());
                }
            }
        },

        Command::CheckConfig => {
            println!("configuration is valid");
        }
    }

    Ok(())
}

fn report_to_json(report: &memory_capture::CaptureReport) -> serde_json::Value {
    serde_json::json!({
        "extracted": report.extracted,
        "confidence_filtered": report.confidence_filtered,
        "embedding_failed": report.embedding_failed,
        "dedup_skipped": report.dedup_skipped,
        "conflict_skipped": report.conflict_skipped,
        "stored": report.stored,
        "store_errors": report.store_errors,
    })
}
