#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_defect_metrics::model::{
    Commit, File, FileAction, Project, PullRequest, PullRequestCommit, PullRequestSystem,
    VcsSystem,
};
use rust_defect_metrics::store::{Snapshot, SnapshotStore};

pub const DEPENDABOT_ID: &str = "5ff191c8c26a57681e7b99d0";
pub const DEPENDABOT_FOOTER: &str =
    "You can trigger Dependabot actions by commenting on this PR:";

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, day, 12, 0, 0).unwrap()
}

/// Builds a snapshot where every project `name` owns VCS `v-<name>` and pull
/// request system `s-<name>` tracking `apache/<name>`.
#[derive(Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, name: &str) -> Self {
        self.snapshot
            .projects
            .push(Project::new(format!("p-{name}"), name));
        self.snapshot.vcs_systems.push(VcsSystem {
            id: format!("v-{name}"),
            project_id: format!("p-{name}"),
            url: Some(format!("https://github.com/apache/{name}")),
        });
        self.snapshot.pull_request_systems.push(PullRequestSystem {
            id: format!("s-{name}"),
            project_id: format!("p-{name}"),
            url: Some(format!("https://api.github.com/repos/apache/{name}/pulls")),
        });
        self
    }

    /// A project without any VCS data.
    pub fn bare_project(mut self, name: &str) -> Self {
        self.snapshot
            .projects
            .push(Project::new(format!("p-{name}"), name));
        self
    }

    pub fn commit(mut self, project: &str, commit: Commit) -> Self {
        let mut commit = commit;
        commit.vcs_system_id = format!("v-{project}");
        self.snapshot.commits.push(commit);
        self
    }

    /// A file action of `commit` touching `path`, with the given induce labels.
    pub fn touch(mut self, commit: &str, path: &str, induces: &[&str]) -> Self {
        let index = self.snapshot.file_actions.len();
        let file_id = format!("f{index}");
        let mut action = FileAction::new(format!("fa{index}"), commit, Some(file_id.as_str()));
        for label in induces {
            action = action.with_induce(*label);
        }
        self.snapshot.file_actions.push(action);
        self.snapshot.files.push(File::new(file_id, path));
        self
    }

    pub fn pull_request(mut self, project: &str, pull_request: PullRequest) -> Self {
        let mut pull_request = pull_request;
        pull_request.pull_request_system_id = format!("s-{project}");
        self.snapshot.pull_requests.push(pull_request);
        self
    }

    pub fn link(mut self, pull_request: &str, commit: Option<&str>) -> Self {
        self.snapshot
            .pull_request_commits
            .push(PullRequestCommit::new(pull_request, commit));
        self
    }

    pub fn link_by(mut self, pull_request: &str, commit: &str, author: &str) -> Self {
        self.snapshot
            .pull_request_commits
            .push(PullRequestCommit::new(pull_request, Some(commit)).with_author(author));
        self
    }

    pub fn build(self) -> SnapshotStore {
        SnapshotStore::new(self.snapshot)
    }
}

pub fn commit(id: &str, day: u32) -> Commit {
    Commit::new(id, "", at(day))
}

pub fn merged(id: &str, number: u32, day: u32) -> PullRequest {
    PullRequest::new(id, "", number, at(day)).merged(at(day + 1))
}
