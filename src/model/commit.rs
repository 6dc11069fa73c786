use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: Id,
    pub vcs_system_id: Id,
    pub committer_date: DateTime<Utc>,
    /// Bug-fix heuristics keyed by name. A missing key means `false`.
    #[serde(default)]
    pub labels: HashMap<String, bool>,
    #[serde(default)]
    pub revision_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAction {
    pub id: Id,
    pub commit_id: Id,
    #[serde(default)]
    pub file_id: Option<Id>,
    #[serde(default)]
    pub induces: Vec<InduceRecord>,
}

/// One attribution of a later bug fix to this change, tagged with the SZZ variant that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InduceRecord {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: Id,
    #[serde(default)]
    pub path: String,
}

// Create
impl Commit {
    pub fn new(
        id: impl ToString,
        vcs_system_id: impl ToString,
        committer_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            vcs_system_id: vcs_system_id.to_string(),
            committer_date,
            labels: HashMap::new(),
            revision_hash: String::new(),
        }
    }

    pub fn with_label(mut self, key: impl ToString, value: bool) -> Self {
        self.labels.insert(key.to_string(), value);
        self
    }

    pub fn with_revision(mut self, revision_hash: impl ToString) -> Self {
        self.revision_hash = revision_hash.to_string();
        self
    }
}

impl FileAction {
    pub fn new(id: impl ToString, commit_id: impl ToString, file_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            commit_id: commit_id.to_string(),
            file_id: file_id.map(String::from),
            induces: vec![],
        }
    }

    pub fn with_induce(mut self, label: impl ToString) -> Self {
        self.induces.push(InduceRecord {
            label: label.to_string(),
        });
        self
    }
}

impl File {
    pub fn new(id: impl ToString, path: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            path: path.to_string(),
        }
    }
}
