use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use triage_ai::corpus::demo::demo_corpus;
use triage_ai::corpus::{build_with_embedder, CorpusHandle, CorpusManifest, CorpusSnapshot, CorpusStore};
use triage_ai::embeddings::hashing::HASHING_MODEL;
use triage_ai::embeddings::{Embedder, HashingEmbedder, OllamaEmbedder};
use triage_ai::gate::TriageService;
use triage_ai::ollama::OllamaClient;
use triage_core::classify::{RuleClassifier, RuleSet};
use triage_core::config::{ConfigOverrides, TriageConfig};
use triage_core::error::{codes, AppError};
use triage_core::lexicon::Lexicon;

mod logging;

#[derive(Parser, Debug)]
#[command(name = "malaria-triage", version, about = "Screen symptom descriptions for malaria risk")]
struct Cli {
    /// TOML file overriding the compiled defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Corpus store directory (default: in-memory demo corpus)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Lexicon JSON replacing the builtin one
    #[arg(long, global = true)]
    lexicon: Option<PathBuf>,

    /// Emergency rules TOML replacing the builtin set
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Hashing)]
    embedder: EmbedderKind,

    /// Embedding model name; must match the corpus manifest
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    #[arg(long, global = true, default_value = "http://127.0.0.1:11434")]
    ollama_url: String,

    /// End-to-end budget for retrieval, in milliseconds
    #[arg(long, global = true)]
    budget_ms: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full assessment of a symptom description
    Assess {
        #[arg(long)]
        text: String,
        /// Language hint: en, hi or auto
        #[arg(long)]
        lang: Option<String>,
    },
    /// Emergency screening only, without retrieval
    CheckEmergency {
        #[arg(long)]
        text: String,
        #[arg(long)]
        lang: Option<String>,
    },
    /// Embed the bundled demo corpus and write it as a corpus store
    BuildDemoCorpus {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the manifest of the store given by --corpus
    CorpusStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Hashing,
    Ollama,
}

#[derive(Debug, Serialize)]
struct CorpusStatusResponse {
    root: String,
    present: bool,
    manifest: Option<CorpusManifest>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json);

    match run(cli).await {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = %e.code, message = %e.message, "command failed");
            let body = serde_json::to_string_pretty(&e).unwrap_or_else(|_| e.to_string());
            eprintln!("{body}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, AppError> {
    let overrides = ConfigOverrides {
        budget_ms: cli.budget_ms,
        max_concurrent: None,
        embedding_model: cli.embedding_model.clone(),
    };
    let config = TriageConfig::load(cli.config.as_deref(), Some(&overrides))?;

    match &cli.command {
        Command::Assess { text, lang } => {
            let service = build_service(&cli, config)?;
            let assessment = service.assess(text, lang.as_deref()).await;
            to_json(&assessment)
        }
        Command::CheckEmergency { text, lang } => {
            let service = build_service(&cli, config)?;
            let check = service.check_emergency(text, lang.as_deref()).await;
            to_json(&check)
        }
        Command::BuildDemoCorpus { out } => {
            let embedder = build_embedder(&cli, &config)?;
            let snapshot = embed_demo_corpus(embedder.as_ref(), &config, &now_rfc3339_utc()?)?;
            let store = CorpusStore::open(out.clone());
            store.write(&snapshot)?;
            tracing::info!(
                root = %store.root().display(),
                version = snapshot.version(),
                chunks = snapshot.len(),
                "demo corpus written"
            );
            to_json(snapshot.manifest())
        }
        Command::CorpusStatus => {
            let Some(root) = cli.corpus.clone() else {
                return Err(AppError::new(codes::CONFIG_INVALID, "corpus-status needs --corpus <DIR>"));
            };
            let store = CorpusStore::open(root);
            let manifest = store.status()?;
            to_json(&CorpusStatusResponse {
                root: store.root().to_string_lossy().to_string(),
                present: manifest.is_some(),
                manifest,
            })
        }
    }
}

fn build_service(cli: &Cli, config: TriageConfig) -> Result<TriageService, AppError> {
    let lexicon = match cli.lexicon.as_deref() {
        Some(p) => Lexicon::load(p)?,
        None => Lexicon::builtin()?,
    };
    let rules = match cli.rules.as_deref() {
        Some(p) => RuleSet::load(p)?,
        None => RuleSet::builtin()?,
    };
    let classifier = RuleClassifier::new(rules, &lexicon)?;
    tracing::info!(
        lexicon_version = lexicon.version(),
        rules_version = classifier.rules_version(),
        "classifier ready"
    );

    let embedder = build_embedder(cli, &config)?;
    let corpus = match cli.corpus.as_ref() {
        Some(root) => CorpusHandle::new(CorpusStore::open(root.clone()).load()?),
        None => CorpusHandle::new(embed_demo_corpus(
            embedder.as_ref(),
            &config,
            triage_ai::corpus::demo::DEMO_BUILT_AT,
        )?),
    };

    Ok(TriageService::new(
        Arc::new(lexicon),
        Arc::new(classifier),
        Arc::new(corpus),
        embedder,
        config,
    ))
}

fn build_embedder(cli: &Cli, config: &TriageConfig) -> Result<Arc<dyn Embedder>, AppError> {
    match cli.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding.dims))),
        EmbedderKind::Ollama => {
            // The hashing model name would be sent to Ollama and fail on the first query.
            if config.embedding.model == HASHING_MODEL {
                return Err(AppError::new(
                    codes::CONFIG_INVALID,
                    "--embedder ollama needs --embedding-model naming an Ollama model",
                )
                .with_details(format!("model={}", config.embedding.model)));
            }
            let client = OllamaClient::new(&cli.ollama_url)?.with_timeout(Duration::from_millis(config.gate.budget_ms));
            client.health_check()?;
            Ok(Arc::new(OllamaEmbedder::new(client)))
        }
    }
}

fn embed_demo_corpus(
    embedder: &dyn Embedder,
    config: &TriageConfig,
    built_at: &str,
) -> Result<CorpusSnapshot, AppError> {
    let demo = demo_corpus()?;
    build_with_embedder(
        &demo.chunks,
        embedder,
        &config.embedding.model,
        &demo.version,
        built_at,
    )
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new(codes::CORPUS_STORE_FAILED, "Failed to format time").with_details(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(codes::CONFIG_INVALID, "Failed to encode output").with_details(e.to_string())
    })
}
