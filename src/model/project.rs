use crate::model::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct VcsSystem {
    pub id: Id,
    pub project_id: Id,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSystem {
    pub id: Id,
    pub project_id: Id,
    #[serde(default)]
    pub url: Option<String>,
}

// Create
impl Project {
    pub fn new(id: impl ToString, name: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

impl PullRequestSystem {
    /// Owner and repository name of the tracked GitHub repository.
    pub fn repository(&self) -> Option<(String, String)> {
        repository_slug(self.url.as_deref()?)
    }
}

/// Parses `https://api.github.com/repos/<owner>/<repo>/pulls` into `(owner, repo)`.
///
/// Only the two path segments before the last one are looked at, so trailing
/// resource names other than `pulls` are accepted too.
pub fn repository_slug(url: &str) -> Option<(String, String)> {
    let segments = url.trim_end_matches('/').split('/').collect::<Vec<_>>();
    if segments.len() < 3 {
        return None;
    }
    let owner = segments[segments.len() - 3];
    let repository = segments[segments.len() - 2];
    if owner.is_empty() || repository.is_empty() {
        return None;
    }
    Some((owner.to_string(), repository.to_string()))
}
