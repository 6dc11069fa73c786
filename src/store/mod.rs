//! Read-only access to the entity store.
//!
//! Every aggregation task opens its own store through a [`StoreConnector`] and
//! drops it when the task ends, so a broken connection only ever affects one
//! project.

#[cfg(feature = "mongo")]
pub mod mongo;
pub mod snapshot;

use crate::model::{
    Commit, File, FileAction, Id, Project, PullRequest, PullRequestCommit, PullRequestSystem,
    VcsSystem,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use snapshot::{Snapshot, SnapshotStore};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid identifier `{0}`")]
    InvalidId(String),

    #[error("failed to read snapshot `{path}`: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot: {0}")]
    SnapshotJson(#[from] serde_json::Error),

    #[cfg(feature = "mongo")]
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Which end of a sorted collection a first/last lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Earliest,
    Latest,
}

/// Filter applied to the pull requests of a set of pull request systems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFilter {
    pub merged: Option<bool>,
    /// Closed without being merged.
    pub rejected: bool,
    pub created_until: Option<DateTime<Utc>>,
    /// Also load title and description.
    pub with_text: bool,
}

impl PullRequestFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn merged() -> Self {
        Self {
            merged: Some(true),
            ..Self::default()
        }
    }

    pub fn rejected() -> Self {
        Self {
            rejected: true,
            ..Self::default()
        }
    }

    pub fn created_until(until: DateTime<Utc>) -> Self {
        Self {
            created_until: Some(until),
            ..Self::default()
        }
    }

    pub fn with_text(mut self) -> Self {
        self.with_text = true;
        self
    }

    pub fn matches(&self, pull_request: &PullRequest) -> bool {
        if let Some(merged) = self.merged {
            if pull_request.is_merged() != merged {
                return false;
            }
        }
        if self.rejected && !pull_request.is_rejected() {
            return false;
        }
        if let Some(until) = self.created_until {
            if pull_request.created_at > until {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn projects(&self) -> Result<Vec<Project>>;

    async fn vcs_system(&self, project_id: &str) -> Result<Option<VcsSystem>>;

    async fn pull_request_systems(&self, project_id: &str) -> Result<Vec<PullRequestSystem>>;

    /// Commits of a VCS system in ascending committer date.
    async fn commits(&self, vcs_system_id: &str) -> Result<Vec<Commit>>;

    async fn commits_by_ids(&self, ids: &[Id]) -> Result<Vec<Commit>>;

    async fn commit_by_revision(
        &self,
        vcs_system_id: &str,
        revision_hash: &str,
    ) -> Result<Option<Commit>>;

    async fn count_commits(&self, vcs_system_id: &str) -> Result<u64>;

    async fn commit_date(
        &self,
        vcs_system_id: &str,
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Pull requests of the given systems in ascending creation date.
    async fn pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>>;

    async fn count_pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<u64>;

    async fn pull_request_date(
        &self,
        system_ids: &[Id],
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>>;

    async fn pull_request_commits(&self, pull_request_id: &str) -> Result<Vec<PullRequestCommit>>;

    /// Any join-table row referencing the commit.
    async fn pull_request_commit_for(&self, commit_id: &str) -> Result<Option<PullRequestCommit>>;

    async fn file_actions(&self, commit_id: &str) -> Result<Vec<FileAction>>;

    async fn files(&self, ids: &[Id]) -> Result<Vec<File>>;
}

/// Opens private store sessions, one per aggregation task.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Store: Store + 'static;

    async fn connect(&self) -> Result<Self::Store>;
}
