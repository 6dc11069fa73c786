//! Fans the per-project aggregation out over a bounded worker pool and merges
//! the finished rows into one table.

use crate::analyze::{AggregateError, AggregateRow, Aggregator, ReportKind, ShaLookup};
use crate::model::{AnalysisSettings, Project};
use crate::report::{Table, TableError};
use crate::store::StoreConnector;
use crate::utils::ProgressStyleTemplate;
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    pub project: String,
    pub error: String,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub table: Table,
    /// Projects whose task failed; they have no row in `table`.
    pub failures: Vec<ProjectFailure>,
}

pub struct Orchestrator<C: StoreConnector> {
    connector: Arc<C>,
    settings: Arc<AnalysisSettings>,
    lookup: Option<Arc<ShaLookup>>,
    report: ReportKind,
    concurrency: usize,
}

// Create
impl<C: StoreConnector> Orchestrator<C> {
    pub fn new(connector: C, settings: AnalysisSettings, report: ReportKind) -> Self {
        Self {
            connector: Arc::new(connector),
            settings: Arc::new(settings),
            lookup: None,
            report,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_lookup(mut self, lookup: Option<ShaLookup>) -> Self {
        self.lookup = lookup.map(Arc::new);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl<C: StoreConnector> Orchestrator<C> {
    pub async fn run(&self, projects: Vec<Project>) -> Result<RunOutcome, TableError> {
        let projects = if self.report.honors_ignore_list() {
            let policy = &self.settings.exclusions;
            let (ignored, kept): (Vec<_>, Vec<_>) = projects
                .into_iter()
                .partition(|project| policy.is_ignored(&project.name));
            for project in &ignored {
                tracing::info!(project = %project.name, "skipping ignored project");
            }
            kept
        } else {
            projects
        };

        let total = projects.len();
        tracing::info!(
            report = %self.report,
            projects = total,
            concurrency = self.concurrency,
            "dispatching projects"
        );
        let progress = ProgressBar::new(total as u64);
        progress.set_style(ProgressStyleTemplate::number_bar());
        progress.set_message(self.report.name());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let mut names = HashMap::<task::Id, String>::with_capacity(total);
        for project in projects {
            let name = project.name.clone();
            let connector = self.connector.clone();
            let settings = self.settings.clone();
            let lookup = self.lookup.clone();
            let semaphore = semaphore.clone();
            let report = self.report;

            let handle = join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(AggregateError::Cancelled),
                };
                aggregate_project(
                    connector.as_ref(),
                    &settings,
                    lookup.as_deref(),
                    report,
                    &project,
                )
                .await
            });
            names.insert(handle.id(), name);
        }

        let mut rows = Vec::with_capacity(total);
        let mut failures = vec![];
        let mut finished = 0;
        while let Some(joined) = join_set.join_next_with_id().await {
            finished += 1;
            progress.inc(1);
            let (id, result) = match joined {
                Ok((id, result)) => (id, result.map_err(|err| err.to_string())),
                Err(err) => (err.id(), Err(format!("task aborted: {err}"))),
            };
            let name = names.remove(&id).unwrap_or_default();
            match result {
                Ok(project_rows) => {
                    tracing::info!("{name} done ({finished}/{total})");
                    rows.extend(project_rows);
                }
                Err(error) => {
                    tracing::error!(project = %name, "aggregation failed: {error}");
                    failures.push(ProjectFailure {
                        project: name,
                        error,
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.project.cmp(&b.project));
        progress.finish_and_clear();

        let table = Table::from_rows(rows)?;
        Ok(RunOutcome { table, failures })
    }
}

/// Opens a private store for the project; it is dropped when the task ends.
async fn aggregate_project<C: StoreConnector>(
    connector: &C,
    settings: &AnalysisSettings,
    lookup: Option<&ShaLookup>,
    report: ReportKind,
    project: &Project,
) -> Result<Vec<AggregateRow>, AggregateError> {
    let store = connector
        .connect()
        .await
        .map_err(|source| AggregateError::Store {
            project: project.name.clone(),
            source,
        })?;
    Aggregator::new(&store, settings)
        .with_lookup(lookup)
        .aggregate(report, project)
        .await
}
