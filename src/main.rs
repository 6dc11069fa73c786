use anyhow::{Context, Result};
use clap::Parser;
use rust_defect_metrics::analyze::{Orchestrator, ReportKind, ShaLookup, DEFAULT_CONCURRENCY};
use rust_defect_metrics::model::AnalysisSettings;
use rust_defect_metrics::report::CsvReport;
use rust_defect_metrics::store::{SnapshotStore, Store, StoreConnector};
use rust_defect_metrics::utils::timed;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Projects kept by `--small`.
const SMALL_PROJECTS: usize = 16;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Per-project pull request and defect metrics")]
struct Args {
    #[arg(value_enum)]
    report: ReportKind,
    /// Output CSV, defaults to a per-report path under `data/`
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Only analyze the first 16 projects
    #[arg(long)]
    small: bool,
    /// Analysis settings JSON
    #[arg(long = "config")]
    config_path: Option<String>,
    /// Read entities from a JSON snapshot instead of MongoDB
    #[arg(long = "snapshot")]
    snapshot_path: Option<String>,
    /// Pull request → commit SHA table used when the join table is incomplete
    #[arg(long = "commits-on-pull-request")]
    lookup_path: Option<String>,
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    timed(args.report.name(), run(args)).await
}

async fn run(args: Args) -> Result<()> {
    let settings = match &args.config_path {
        Some(path) => AnalysisSettings::from_config(path)
            .with_context(|| format!("failed to load settings from `{path}`"))?,
        None => AnalysisSettings::default(),
    };
    let lookup = match &args.lookup_path {
        Some(path) => {
            let lookup = ShaLookup::from_csv(path)
                .with_context(|| format!("failed to load commit lookup `{path}`"))?;
            tracing::info!(entries = lookup.len(), "loaded commit lookup");
            Some(lookup)
        }
        None => None,
    };

    match &args.snapshot_path {
        Some(path) => {
            let store = SnapshotStore::from_config(path)
                .with_context(|| format!("failed to load snapshot `{path}`"))?;
            execute(store, settings, lookup, &args).await
        }
        None => execute_mongo(settings, lookup, &args).await,
    }
}

#[cfg(feature = "mongo")]
async fn execute_mongo(
    settings: AnalysisSettings,
    lookup: Option<ShaLookup>,
    args: &Args,
) -> Result<()> {
    use rust_defect_metrics::model::StoreConfig;
    use rust_defect_metrics::store::mongo::MongoConnector;

    let config = StoreConfig::from_env().context("invalid store configuration")?;
    tracing::info!(?config, "using MongoDB store");
    execute(MongoConnector::new(config), settings, lookup, args).await
}

#[cfg(not(feature = "mongo"))]
async fn execute_mongo(
    _settings: AnalysisSettings,
    _lookup: Option<ShaLookup>,
    _args: &Args,
) -> Result<()> {
    anyhow::bail!("built without the `mongo` feature, pass --snapshot")
}

async fn execute<C: StoreConnector>(
    connector: C,
    settings: AnalysisSettings,
    lookup: Option<ShaLookup>,
    args: &Args,
) -> Result<()> {
    let mut projects = {
        let store = connector
            .connect()
            .await
            .context("failed to connect to the store")?;
        store.projects().await.context("failed to list projects")?
    };
    if args.small {
        projects.truncate(SMALL_PROJECTS);
    }

    let outcome = Orchestrator::new(connector, settings, args.report)
        .with_lookup(lookup)
        .with_concurrency(args.concurrency)
        .run(projects)
        .await
        .context("failed to merge project rows")?;
    if !outcome.failures.is_empty() {
        let failed = outcome
            .failures
            .iter()
            .map(|failure| failure.project.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!("{} project(s) left out of the report: {failed}", outcome.failures.len());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.report.default_output()));
    outcome
        .table
        .report_create(&output)
        .with_context(|| format!("failed to write `{}`", output.display()))?;
    tracing::info!(
        rows = outcome.table.len(),
        path = %output.display(),
        "report written"
    );
    Ok(())
}
