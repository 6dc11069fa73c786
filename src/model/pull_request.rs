use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CLOSED_STATE: &str = "closed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: Id,
    pub pull_request_system_id: Id,
    /// Number of the pull request on the hosting service.
    pub external_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub creator_id: Option<Id>,
    #[serde(default)]
    pub source_repo_url: Option<String>,
    #[serde(default)]
    pub target_repo_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Row of the pull request / commit join table. `commit_id` is empty when the
/// collector could not match the listed commit to one in the VCS data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCommit {
    pub pull_request_id: Id,
    #[serde(default)]
    pub commit_id: Option<Id>,
    #[serde(default)]
    pub author_id: Option<Id>,
}

// Create
impl PullRequest {
    pub fn new(
        id: impl ToString,
        pull_request_system_id: impl ToString,
        external_id: impl ToString,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            pull_request_system_id: pull_request_system_id.to_string(),
            external_id: external_id.to_string(),
            created_at,
            merged_at: None,
            state: "open".to_string(),
            creator_id: None,
            source_repo_url: None,
            target_repo_url: None,
            title: None,
            description: None,
        }
    }

    pub fn merged(mut self, merged_at: DateTime<Utc>) -> Self {
        self.merged_at = Some(merged_at);
        self.state = CLOSED_STATE.to_string();
        self
    }

    pub fn closed(mut self) -> Self {
        self.state = CLOSED_STATE.to_string();
        self
    }
}

// State
impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_merged() && self.state == CLOSED_STATE
    }

    pub fn number(&self) -> Option<u64> {
        self.external_id.trim().parse().ok()
    }

    /// Whether the head branch lives in the target repository rather than a
    /// fork. Unknown when either URL is missing, which counts as a fork.
    pub fn is_same_repository(&self) -> bool {
        let source = self.source_repo_url.as_deref().and_then(owner_and_name);
        let target = self.target_repo_url.as_deref().and_then(owner_and_name);
        matches!((source, target), (Some(source), Some(target)) if source == target)
    }
}

/// Last two path segments of a repository URL.
fn owner_and_name(url: &str) -> Option<(&str, &str)> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let name = segments.next().filter(|name| !name.is_empty())?;
    let owner = segments.next().filter(|owner| !owner.is_empty())?;
    Some((owner, name))
}

impl PullRequestCommit {
    pub fn new(pull_request_id: impl ToString, commit_id: Option<&str>) -> Self {
        Self {
            pull_request_id: pull_request_id.to_string(),
            commit_id: commit_id.map(String::from),
            author_id: None,
        }
    }

    pub fn with_author(mut self, author_id: impl ToString) -> Self {
        self.author_id = Some(author_id.to_string());
        self
    }
}
