//! Per-project passes over the store, one per report kind.

use crate::analyze::{
    classify_commit, touches_source, AggregateRow, BugFixVariant, CommitHistogram, CommitVerdict,
    CrossTab, LinkageCounts, LinkageResolver, ReportKind, Resolution, ShaLookup, SzzVariant,
    Variant, VariantTally,
};
use crate::model::{AnalysisSettings, Commit, Id, Project, PullRequest, VcsSystem};
use crate::store::{self, Extremum, PullRequestFilter, Store, StoreError};
use chrono::Duration;
use itertools::Itertools;
use std::collections::BTreeSet;
use thiserror::Error;

/// Pull requests created up to this long after the last commit still count as
/// having commit data.
const PR_WITH_COMMIT_GRACE_DAYS: i64 = 7;

const DEPENDABOT_TITLE_PREFIX: &str = "Bump ";
const DEPENDABOT_FOOTER: &str = "You can trigger Dependabot actions by commenting on this PR:";

const TEST_PATH_MARKERS: [&str; 2] = ["test", "spec"];

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("project `{0}` has no VCS system")]
    MissingVcs(String),

    #[error("project `{project}`: {source}")]
    Store {
        project: String,
        #[source]
        source: StoreError,
    },

    #[error("worker pool closed before the project was scheduled")]
    Cancelled,
}

/// What every pass needs to know about the project besides its name.
struct Scope<'p> {
    project: &'p Project,
    vcs: VcsSystem,
    system_ids: Vec<Id>,
    /// Owner and name of the tracked GitHub repository.
    slug: Option<(String, String)>,
}

impl Scope<'_> {
    fn repository(&self) -> Option<&str> {
        self.slug.as_ref().map(|(_, repository)| repository.as_str())
    }

    fn pull_request_url(&self, pull_request: &PullRequest) -> Option<String> {
        let (owner, repository) = self.slug.as_ref()?;
        Some(format!(
            "https://github.com/{owner}/{repository}/pull/{}",
            pull_request.external_id
        ))
    }
}

pub struct Aggregator<'a, S: Store + ?Sized> {
    store: &'a S,
    settings: &'a AnalysisSettings,
    lookup: Option<&'a ShaLookup>,
}

// Create
impl<'a, S: Store + ?Sized> Aggregator<'a, S> {
    pub fn new(store: &'a S, settings: &'a AnalysisSettings) -> Self {
        Self {
            store,
            settings,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Option<&'a ShaLookup>) -> Self {
        self.lookup = lookup;
        self
    }
}

impl<'a, S: Store + ?Sized> Aggregator<'a, S> {
    /// Rows of one project: a single row, or one per merged pull request for
    /// [`ReportKind::PullRequestFeatures`].
    pub async fn aggregate(
        &self,
        report: ReportKind,
        project: &Project,
    ) -> Result<Vec<AggregateRow>, AggregateError> {
        let store_error = |source| AggregateError::Store {
            project: project.name.clone(),
            source,
        };
        let scope = match self.scope(project).await.map_err(store_error)? {
            Some(scope) => scope,
            None => return Err(AggregateError::MissingVcs(project.name.clone())),
        };
        let mut row = AggregateRow::new(&project.name);
        let pass = match report {
            ReportKind::Commits => self.commits(&scope, &mut row).await,
            ReportKind::PullRequestBasics => self.pull_request_basics(&scope, &mut row).await,
            ReportKind::PullRequestDefects => self.pull_request_defects(&scope, &mut row).await,
            ReportKind::PullRequestImpact => self.pull_request_impact(&scope, &mut row).await,
            ReportKind::PullRequestEffect => self.pull_request_effect(&scope, &mut row).await,
            ReportKind::Authors => self.authors(&scope, &mut row).await,
            ReportKind::PullRequestFeatures => {
                return self.pull_request_features(&scope).await.map_err(store_error);
            }
        };
        pass.map_err(store_error)?;
        Ok(vec![row])
    }

    async fn scope<'p>(&self, project: &'p Project) -> store::Result<Option<Scope<'p>>> {
        let Some(vcs) = self.store.vcs_system(&project.id).await? else {
            return Ok(None);
        };
        let systems = self.store.pull_request_systems(&project.id).await?;
        let slug = systems.iter().find_map(|system| system.repository());
        Ok(Some(Scope {
            project,
            vcs,
            system_ids: systems.into_iter().map(|system| system.id).collect(),
            slug,
        }))
    }

    async fn verdict(&self, commit: &Commit) -> store::Result<CommitVerdict> {
        let file_actions = self.store.file_actions(&commit.id).await?;
        Ok(classify_commit(&commit.labels, &file_actions))
    }

    fn resolver<'r>(&'r self, scope: &'r Scope<'_>) -> LinkageResolver<'r, S> {
        LinkageResolver::new(self.store, &scope.vcs.id)
            .with_lookup(scope.repository(), self.lookup)
    }

    fn progress(&self, scope: &Scope<'_>, report: ReportKind, total: usize) -> ProgressLog {
        ProgressLog {
            project: scope.project.name.clone(),
            unit: report.unit(),
            every: self.settings.progress_every.max(1),
            done: 0,
            total,
        }
    }
}

// Passes
impl<'a, S: Store + ?Sized> Aggregator<'a, S> {
    async fn commits(&self, scope: &Scope<'_>, row: &mut AggregateRow) -> store::Result<()> {
        let vcs_id = scope.vcs.id.as_str();
        let (count, first, last) = futures::try_join!(
            self.store.count_commits(vcs_id),
            self.store.commit_date(vcs_id, Extremum::Earliest),
            self.store.commit_date(vcs_id, Extremum::Latest),
        )?;

        let commits = self.store.commits(vcs_id).await?;
        let mut progress = self.progress(scope, ReportKind::Commits, commits.len());
        let mut bug_fixing = VariantTally::<BugFixVariant>::default();
        let mut bug_inducing = VariantTally::<SzzVariant>::default();
        for commit in &commits {
            let verdict = self.verdict(commit).await?;
            bug_fixing.record(fixing_variants(&verdict));
            bug_inducing.record(verdict.bug_inducing.iter());
            progress.tick();
        }

        row.set_count("#cmt", count);
        row.set_date("first_commit_date", first);
        row.set_date("last_commit_date", last);
        bug_fixing.write(row, "#bf_cmt");
        bug_inducing.write(row, "#bi_cmt");
        Ok(())
    }

    async fn pull_request_basics(
        &self,
        scope: &Scope<'_>,
        row: &mut AggregateRow,
    ) -> store::Result<()> {
        let ids = scope.system_ids.as_slice();
        let all = PullRequestFilter::all();
        let (count, first, last, last_commit) = futures::try_join!(
            self.store.count_pull_requests(ids, &all),
            self.store.pull_request_date(ids, Extremum::Earliest),
            self.store.pull_request_date(ids, Extremum::Latest),
            self.store.commit_date(&scope.vcs.id, Extremum::Latest),
        )?;
        let with_commit = match last_commit {
            Some(last_commit) => {
                let until = last_commit + Duration::days(PR_WITH_COMMIT_GRACE_DAYS);
                self.store
                    .count_pull_requests(ids, &PullRequestFilter::created_until(until))
                    .await?
            }
            None => 0,
        };

        let merged = self
            .store
            .pull_requests(ids, &PullRequestFilter::merged())
            .await?;
        let resolver = self.resolver(scope);
        let mut progress = self.progress(scope, ReportKind::PullRequestBasics, merged.len());
        let mut linkage_counts = LinkageCounts::default();
        let mut histogram = CommitHistogram::default();
        for pull_request in &merged {
            let linkage = resolver.resolve_pull_request(pull_request).await?;
            linkage_counts.record(linkage.completeness);
            match resolver.analyzable_commits(pull_request, &linkage).await? {
                Resolution::Linked(commits) => histogram.record(commits.len()),
                Resolution::Recovered(commits) => {
                    linkage_counts.recovered += 1;
                    histogram.record(commits.len());
                }
                Resolution::Excluded => {}
            }
            progress.tick();
        }

        row.set_count("#pr", count);
        row.set_date("first_pr_date", first);
        row.set_date("last_pr_date", last);
        row.set_date("last_commit_date", last_commit);
        row.set_count("#pr_with_commit", with_commit);
        row.set_count("#mpr", merged.len() as u64);
        linkage_counts.write(row, "#mpr_");
        histogram.write(row, "#mpr_");
        Ok(())
    }

    async fn pull_request_defects(
        &self,
        scope: &Scope<'_>,
        row: &mut AggregateRow,
    ) -> store::Result<()> {
        let ids = scope.system_ids.as_slice();
        let (all, rejected) = (PullRequestFilter::all(), PullRequestFilter::rejected());
        let (count, rejected) = futures::try_join!(
            self.store.count_pull_requests(ids, &all),
            self.store.count_pull_requests(ids, &rejected),
        )?;

        let merged = self
            .store
            .pull_requests(ids, &PullRequestFilter::merged())
            .await?;
        let resolver = self.resolver(scope);
        let mut progress = self.progress(scope, ReportKind::PullRequestDefects, merged.len());
        let mut linkage_counts = LinkageCounts::default();
        let mut bug_fixing = VariantTally::<BugFixVariant>::default();
        let mut bug_inducing = VariantTally::<SzzVariant>::default();
        for pull_request in &merged {
            let linkage = resolver.resolve_pull_request(pull_request).await?;
            linkage_counts.record(linkage.completeness);
            let commits = match resolver.analyzable_commits(pull_request, &linkage).await? {
                Resolution::Linked(commits) => commits,
                Resolution::Recovered(commits) => {
                    linkage_counts.recovered += 1;
                    commits
                }
                Resolution::Excluded => {
                    progress.tick();
                    continue;
                }
            };
            let mut verdict = CommitVerdict::default().with_pull_request(true);
            for commit in &commits {
                verdict.merge(&self.verdict(commit).await?);
            }
            bug_fixing.record(fixing_variants(&verdict));
            bug_inducing.record(verdict.bug_inducing.iter());
            progress.tick();
        }

        row.set_count("#pr", count);
        row.set_count("#mpr", merged.len() as u64);
        row.set_count("#rpr", rejected);
        linkage_counts.write(row, "#mpr_");
        bug_fixing.write(row, "#bf_mpr");
        bug_inducing.write(row, "#bi_mpr");
        Ok(())
    }

    async fn pull_request_impact(
        &self,
        scope: &Scope<'_>,
        row: &mut AggregateRow,
    ) -> store::Result<()> {
        let ids = scope.system_ids.as_slice();
        let (all, merged) = (PullRequestFilter::all(), PullRequestFilter::merged());
        let (count, merged) = futures::try_join!(
            self.store.count_pull_requests(ids, &all),
            self.store.count_pull_requests(ids, &merged),
        )?;

        let commits = self.store.commits(&scope.vcs.id).await?;
        let mut progress = self.progress(scope, ReportKind::PullRequestImpact, commits.len());
        let mut combined = CrossTab::default();
        let mut per_variant = SzzVariant::ALL
            .iter()
            .map(|variant| (*variant, CrossTab::default()))
            .collect::<Vec<_>>();
        for commit in &commits {
            let in_pull_request = self
                .store
                .pull_request_commit_for(&commit.id)
                .await?
                .is_some();
            let verdict = self.verdict(commit).await?;
            combined.record(in_pull_request, verdict.is_bug_inducing());
            for (variant, tab) in per_variant.iter_mut() {
                tab.record(in_pull_request, verdict.bug_inducing.contains(*variant));
            }
            progress.tick();
        }

        row.set_count("#pr", count);
        row.set_count("#mpr", merged);
        combined.write(row, "_all");
        for (variant, tab) in &per_variant {
            tab.write(row, &format!("_{}", variant.suffix()));
        }
        Ok(())
    }

    async fn pull_request_effect(
        &self,
        scope: &Scope<'_>,
        row: &mut AggregateRow,
    ) -> store::Result<()> {
        let policy = &self.settings.exclusions;
        let primary = self.settings.primary_variant;
        let commits = self.store.commits(&scope.vcs.id).await?;
        let mut progress = self.progress(scope, ReportKind::PullRequestEffect, commits.len());
        let mut tab = CrossTab::default();
        for commit in &commits {
            progress.tick();
            let file_actions = self.store.file_actions(&commit.id).await?;
            if !touches_source(self.store, policy, &file_actions).await? {
                continue;
            }
            let link = self.store.pull_request_commit_for(&commit.id).await?;
            if policy.is_bot(link.as_ref().and_then(|link| link.author_id.as_deref())) {
                continue;
            }
            let verdict = classify_commit(&commit.labels, &file_actions);
            tab.record(link.is_some(), verdict.bug_inducing.contains(primary));
        }

        tab.write(row, "");
        Ok(())
    }

    async fn authors(&self, scope: &Scope<'_>, row: &mut AggregateRow) -> store::Result<()> {
        let merged = self
            .store
            .pull_requests(&scope.system_ids, &PullRequestFilter::merged().with_text())
            .await?;
        let mut progress = self.progress(scope, ReportKind::Authors, merged.len());
        let mut dependabot = 0;
        let mut bot_ids = BTreeSet::new();
        for pull_request in &merged {
            progress.tick();
            if !is_dependabot(pull_request) {
                continue;
            }
            dependabot += 1;
            if let Some(creator) = &pull_request.creator_id {
                bot_ids.insert(creator.as_str());
            }
        }

        row.set_count("#mpr", merged.len() as u64);
        row.set_count("#dependabot_mpr", dependabot);
        row.set_text("bot_ids", bot_ids.iter().join(","));
        Ok(())
    }

    /// One row per merged pull request with at least one linked commit.
    async fn pull_request_features(&self, scope: &Scope<'_>) -> store::Result<Vec<AggregateRow>> {
        let policy = &self.settings.exclusions;
        let primary = self.settings.primary_variant;
        let merged = self
            .store
            .pull_requests(&scope.system_ids, &PullRequestFilter::merged())
            .await?;
        let mut progress = self.progress(scope, ReportKind::PullRequestFeatures, merged.len());
        let mut rows = Vec::with_capacity(merged.len());
        for pull_request in &merged {
            progress.tick();
            let Some(merged_at) = pull_request.merged_at else {
                continue;
            };
            let links = self.store.pull_request_commits(&pull_request.id).await?;
            let commit_ids = links
                .iter()
                .filter_map(|link| link.commit_id.clone())
                .collect::<Vec<_>>();
            if commit_ids.is_empty() {
                continue;
            }

            let commits = self
                .store
                .commits_by_ids(&commit_ids.iter().unique().cloned().collect::<Vec<_>>())
                .await?;
            let mut verdict = CommitVerdict::default().with_pull_request(true);
            let mut file_ids = vec![];
            for commit in &commits {
                let file_actions = self.store.file_actions(&commit.id).await?;
                verdict.merge(&classify_commit(&commit.labels, &file_actions));
                file_ids.extend(file_actions.into_iter().filter_map(|action| action.file_id));
            }
            let file_ids = file_ids.into_iter().unique().collect::<Vec<_>>();
            let files = if file_ids.is_empty() {
                vec![]
            } else {
                self.store.files(&file_ids).await?
            };

            let age = (merged_at - pull_request.created_at).num_milliseconds() as f64 / 60_000.0;
            let mut row = AggregateRow::new(&scope.project.name).with_key(&pull_request.id);
            row.set_text("id", &pull_request.id);
            row.set_number("age", age);
            row.set_count("#commits", commit_ids.len() as u64);
            row.set_flag("bot", policy.is_bot(pull_request.creator_id.as_deref()));
            row.set_flag(
                "code_change",
                files.iter().any(|file| policy.is_source_path(&file.path)),
            );
            row.set_flag("same_repository", pull_request.is_same_repository());
            row.set_flag("fix", verdict.bug_fixing.contains(BugFixVariant::IssueOnly));
            row.set_flag("test", files.iter().any(|file| is_test_path(&file.path)));
            row.set_flag("buggy", verdict.bug_inducing.contains(primary));
            match scope.pull_request_url(pull_request) {
                Some(url) => row.set_text("url", url),
                None => row.set_text_null("url"),
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

fn fixing_variants(verdict: &CommitVerdict) -> impl Iterator<Item = BugFixVariant> + '_ {
    BugFixVariant::ALL
        .iter()
        .copied()
        .filter(|variant| verdict.bug_fixing.contains(*variant))
}

fn is_test_path(path: &str) -> bool {
    let path = path.to_lowercase();
    TEST_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

fn is_dependabot(pull_request: &PullRequest) -> bool {
    let title = pull_request.title.as_deref().unwrap_or_default();
    let description = pull_request.description.as_deref().unwrap_or_default();
    title.starts_with(DEPENDABOT_TITLE_PREFIX) && description.contains(DEPENDABOT_FOOTER)
}

/// Logs `done/total` every `every` units. Never affects the result.
struct ProgressLog {
    project: String,
    unit: &'static str,
    every: usize,
    done: usize,
    total: usize,
}

impl ProgressLog {
    fn tick(&mut self) {
        self.done += 1;
        if self.done % self.every == 0 {
            tracing::info!(
                project = %self.project,
                "{}/{} {}",
                self.done,
                self.total,
                self.unit
            );
        }
    }
}
