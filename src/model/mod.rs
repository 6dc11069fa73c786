mod commit;
pub mod config;
mod project;
mod pull_request;

pub use commit::{Commit, File, FileAction, InduceRecord};
pub use config::{AnalysisSettings, ConfigError, ExclusionPolicy, StoreConfig};
pub use project::{repository_slug, Project, PullRequestSystem, VcsSystem};
pub use pull_request::{PullRequest, PullRequestCommit, CLOSED_STATE};

/// Store identifiers are kept opaque; the MongoDB backend uses the hex form of the ObjectId.
pub type Id = String;
