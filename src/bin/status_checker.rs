//! Status checker CLI
//!
//! Runs the reconciliation loop against a local JSON table.
//!
//! Usage:
//!   status-checker run                         # one invocation
//!   status-checker run --auto-continue         # keep going via self-reinvocation
//!   status-checker run --payload '{"paginationToken": "..."}'
//!   status-checker drain --delay 5 --max-invocations 20
//!   status-checker seed "Richard Simmons" "Forest Whitaker"
//!
//! Global options:
//!   --config checker.yaml   YAML overlay for configuration
//!   --fixtures kb.yaml      serve lookups from a fixture file instead of Wikidata
//!   --table deadpool.json   table path (overrides TABLE_PATH)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use status_checker::config::CheckerConfig;
use status_checker::knowledge::{
    FixtureKnowledge, KnowledgeSource, TitleCandidates, UnderscoreTitles, WikidataClient,
};
use status_checker::model::PersonRecord;
use status_checker::notify::DeathNotifier;
use status_checker::reconcile::{
    ChannelInvoker, DrainDriver, DrainStop, InvocationPayload, InvocationResponse, Reconciler,
};
use status_checker::store::{JsonFileStore, StoreAdapter};

#[derive(Parser)]
#[command(name = "status-checker")]
#[command(version)]
#[command(about = "Reconcile tracked people against Wikidata birth and death dates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration overlay
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Knowledge fixture file (YAML) used instead of the live APIs
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    /// JSON table to read and write
    #[arg(long, short = 't', global = true, env = "TABLE_PATH")]
    table: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single invocation and print its response
    Run {
        /// Invocation payload as JSON
        #[arg(long, short = 'p')]
        payload: Option<String>,

        /// Follow self-reinvocations until done or the ceiling is hit
        #[arg(long)]
        auto_continue: bool,
    },

    /// Invoke repeatedly, feeding back the continuation token
    Drain {
        /// Seconds between invocations
        #[arg(long, short = 'd', default_value_t = 5)]
        delay: u64,

        /// Maximum invocations (0 for unlimited)
        #[arg(long, short = 'm', default_value_t = 0)]
        max_invocations: u32,
    },

    /// Add people to the table by name
    Seed {
        /// Display names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = CheckerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(table) = cli.table {
        config.table_path = table;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let table = Arc::new(
        JsonFileStore::open(&config.table_path)
            .await
            .with_context(|| format!("opening table {}", config.table_path.display()))?,
    );
    let store = StoreAdapter::new(table);

    match cli.command {
        Commands::Seed { names } => cmd_seed(&store, names, &config).await,
        Commands::Run {
            payload,
            auto_continue,
        } => {
            let payload = parse_payload(payload.as_deref())?;
            let knowledge = knowledge_source(&config, cli.fixtures)?;
            cmd_run(store, knowledge, config, payload, auto_continue).await
        }
        Commands::Drain {
            delay,
            max_invocations,
        } => {
            let knowledge = knowledge_source(&config, cli.fixtures)?;
            let reconciler = reconciler(store, knowledge, &config)?;
            let summary = DrainDriver::new(Duration::from_secs(delay), Some(max_invocations))
                .drain(&reconciler, InvocationPayload::default())
                .await;

            println!("Total invocations: {}", summary.invocations);
            println!("Total processed:   {}", summary.totals.processed);
            println!("Total updated:     {}", summary.totals.updated);
            println!("Total failed:      {}", summary.totals.failed);
            println!("Total duration:    {:.2}s", summary.duration.as_secs_f64());
            Ok(match summary.stop {
                DrainStop::Failed { .. } => ExitCode::FAILURE,
                DrainStop::Exhausted | DrainStop::InvocationLimit => ExitCode::SUCCESS,
            })
        }
    }
}

fn parse_payload(raw: Option<&str>) -> Result<InvocationPayload> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("parsing --payload"),
        None => Ok(InvocationPayload::default()),
    }
}

fn knowledge_source(
    config: &CheckerConfig,
    fixtures: Option<PathBuf>,
) -> Result<Arc<dyn KnowledgeSource>> {
    Ok(match fixtures {
        Some(path) => {
            info!(path = %path.display(), "Using knowledge fixtures");
            Arc::new(
                FixtureKnowledge::from_yaml_file(&path)
                    .with_context(|| format!("loading fixtures {}", path.display()))?,
            )
        }
        None => Arc::new(WikidataClient::new(&config.knowledge).context("building HTTP client")?),
    })
}

fn reconciler(
    store: StoreAdapter,
    knowledge: Arc<dyn KnowledgeSource>,
    config: &CheckerConfig,
) -> Result<Reconciler> {
    let notifier = DeathNotifier::from_config(&config.notify, &config.knowledge, Arc::new(store.clone()))
        .context("configuring notifications")?;
    Ok(Reconciler::new(store, knowledge, notifier, config))
}

async fn cmd_run(
    store: StoreAdapter,
    knowledge: Arc<dyn KnowledgeSource>,
    mut config: CheckerConfig,
    payload: InvocationPayload,
    auto_continue: bool,
) -> Result<ExitCode> {
    config.auto_continue |= auto_continue;
    let (invoker, mut queued) = ChannelInvoker::new();
    let reconciler = reconciler(store, knowledge, &config)?.with_invoker(Arc::new(invoker));

    let mut next = Some(payload);
    let mut last: Option<InvocationResponse> = None;
    while let Some(payload) = next.take() {
        let response = reconciler.invoke(payload).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        let failed = !response.is_success();
        last = Some(response);
        if failed {
            break;
        }
        next = queued.try_recv().ok();
    }

    Ok(match last {
        Some(response) if !response.is_success() => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

async fn cmd_seed(store: &StoreAdapter, names: Vec<String>, config: &CheckerConfig) -> Result<ExitCode> {
    let records: Vec<PersonRecord> = names
        .into_iter()
        .map(|name| {
            let title = UnderscoreTitles.candidates(&name).into_iter().next();
            let record = PersonRecord::with_random_id(name);
            match title {
                Some(title) => record.with_page_title(title),
                None => record,
            }
        })
        .collect();

    let report = store.batch_put(&records, config.max_store_batch_size).await;
    for record in &records {
        println!("PERSON#{}  {}", record.id, record.name);
    }
    info!(succeeded = report.succeeded, failed = report.failed, "Seeded records");
    Ok(if report.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
