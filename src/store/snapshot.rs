use crate::model::{
    Commit, File, FileAction, Id, Project, PullRequest, PullRequestCommit, PullRequestSystem,
    VcsSystem,
};
use crate::store::{Extremum, PullRequestFilter, Result, Store, StoreConnector, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

/// A JSON dump of the store collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub vcs_systems: Vec<VcsSystem>,
    pub pull_request_systems: Vec<PullRequestSystem>,
    pub commits: Vec<Commit>,
    pub pull_requests: Vec<PullRequest>,
    pub pull_request_commits: Vec<PullRequestCommit>,
    pub file_actions: Vec<FileAction>,
    pub files: Vec<File>,
}

// Create
impl Snapshot {
    pub fn from_config(path: &str) -> Result<Self> {
        let json_str = fs::read_to_string(path).map_err(|source| StoreError::SnapshotIo {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&json_str)?)
    }
}

/// In-memory store over a shared [`Snapshot`]. Connecting hands out another
/// handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    data: Arc<Snapshot>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            data: Arc::new(snapshot),
        }
    }

    pub fn from_config(path: &str) -> Result<Self> {
        Snapshot::from_config(path).map(Self::new)
    }

    fn pull_requests_of<'a>(
        &'a self,
        system_ids: &'a [Id],
        filter: &'a PullRequestFilter,
    ) -> impl Iterator<Item = &'a PullRequest> + 'a {
        self.data
            .pull_requests
            .iter()
            .filter(move |pr| system_ids.contains(&pr.pull_request_system_id))
            .filter(move |pr| filter.matches(pr))
    }

    fn commits_of<'a>(&'a self, vcs_system_id: &'a str) -> impl Iterator<Item = &'a Commit> + 'a {
        self.data
            .commits
            .iter()
            .filter(move |commit| commit.vcs_system_id == vcs_system_id)
    }
}

fn pick(dates: impl Iterator<Item = DateTime<Utc>>, extremum: Extremum) -> Option<DateTime<Utc>> {
    match extremum {
        Extremum::Earliest => dates.min(),
        Extremum::Latest => dates.max(),
    }
}

#[async_trait]
impl Store for SnapshotStore {
    async fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.data.projects.clone())
    }

    async fn vcs_system(&self, project_id: &str) -> Result<Option<VcsSystem>> {
        Ok(self
            .data
            .vcs_systems
            .iter()
            .find(|vcs| vcs.project_id == project_id)
            .cloned())
    }

    async fn pull_request_systems(&self, project_id: &str) -> Result<Vec<PullRequestSystem>> {
        Ok(self
            .data
            .pull_request_systems
            .iter()
            .filter(|system| system.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn commits(&self, vcs_system_id: &str) -> Result<Vec<Commit>> {
        Ok(self
            .commits_of(vcs_system_id)
            .sorted_by_key(|commit| commit.committer_date)
            .cloned()
            .collect())
    }

    async fn commits_by_ids(&self, ids: &[Id]) -> Result<Vec<Commit>> {
        Ok(self
            .data
            .commits
            .iter()
            .filter(|commit| ids.contains(&commit.id))
            .cloned()
            .collect())
    }

    async fn commit_by_revision(
        &self,
        vcs_system_id: &str,
        revision_hash: &str,
    ) -> Result<Option<Commit>> {
        Ok(self
            .commits_of(vcs_system_id)
            .find(|commit| commit.revision_hash == revision_hash)
            .cloned())
    }

    async fn count_commits(&self, vcs_system_id: &str) -> Result<u64> {
        Ok(self.commits_of(vcs_system_id).count() as u64)
    }

    async fn commit_date(
        &self,
        vcs_system_id: &str,
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(pick(
            self.commits_of(vcs_system_id).map(|commit| commit.committer_date),
            extremum,
        ))
    }

    async fn pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        Ok(self
            .pull_requests_of(system_ids, filter)
            .sorted_by_key(|pr| pr.created_at)
            .cloned()
            .map(|mut pr| {
                if !filter.with_text {
                    pr.title = None;
                    pr.description = None;
                }
                pr
            })
            .collect())
    }

    async fn count_pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<u64> {
        Ok(self.pull_requests_of(system_ids, filter).count() as u64)
    }

    async fn pull_request_date(
        &self,
        system_ids: &[Id],
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>> {
        let all = PullRequestFilter::all();
        Ok(pick(
            self.pull_requests_of(system_ids, &all).map(|pr| pr.created_at),
            extremum,
        ))
    }

    async fn pull_request_commits(&self, pull_request_id: &str) -> Result<Vec<PullRequestCommit>> {
        Ok(self
            .data
            .pull_request_commits
            .iter()
            .filter(|link| link.pull_request_id == pull_request_id)
            .cloned()
            .collect())
    }

    async fn pull_request_commit_for(&self, commit_id: &str) -> Result<Option<PullRequestCommit>> {
        Ok(self
            .data
            .pull_request_commits
            .iter()
            .find(|link| link.commit_id.as_deref() == Some(commit_id))
            .cloned())
    }

    async fn file_actions(&self, commit_id: &str) -> Result<Vec<FileAction>> {
        Ok(self
            .data
            .file_actions
            .iter()
            .filter(|action| action.commit_id == commit_id)
            .cloned()
            .collect())
    }

    async fn files(&self, ids: &[Id]) -> Result<Vec<File>> {
        Ok(self
            .data
            .files
            .iter()
            .filter(|file| ids.contains(&file.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreConnector for SnapshotStore {
    type Store = SnapshotStore;

    async fn connect(&self) -> Result<Self::Store> {
        Ok(self.clone())
    }
}
