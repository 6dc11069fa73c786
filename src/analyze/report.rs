use clap::ValueEnum;
use std::fmt;

/// One report per run. Each produces a table with one row per project, except
/// `PullRequestFeatures` which has one row per merged pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ReportKind {
    /// Commit counts, date range and per-variant bug-fixing / bug-inducing commits.
    Commits,
    /// Pull request counts, linkage completeness and commits-per-PR histogram.
    PullRequestBasics,
    /// Bug-fixing and bug-inducing merged pull requests.
    PullRequestDefects,
    /// In-PR × bug-inducing cross-tab over all commits, per SZZ variant.
    PullRequestImpact,
    /// In-PR × bug-inducing cross-tab over source-changing, non-bot commits.
    PullRequestEffect,
    /// Creators of Dependabot pull requests.
    Authors,
    /// Per merged pull request: age, size, bot and fork origin, fix and defect flags.
    PullRequestFeatures,
}

impl ReportKind {
    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Commits => "commits",
            ReportKind::PullRequestBasics => "pull-request-basics",
            ReportKind::PullRequestDefects => "pull-request-defects",
            ReportKind::PullRequestImpact => "pull-request-impact",
            ReportKind::PullRequestEffect => "pull-request-effect",
            ReportKind::Authors => "authors",
            ReportKind::PullRequestFeatures => "pull-request-features",
        }
    }

    pub fn default_output(self) -> &'static str {
        match self {
            ReportKind::Commits => "data/commit_info.csv",
            ReportKind::PullRequestBasics => "data/pull_request_basics.csv",
            ReportKind::PullRequestDefects => "data/pull_request_defects.csv",
            ReportKind::PullRequestImpact => "data/pull_request_impact.csv",
            ReportKind::PullRequestEffect => "data/pull_request_effect.csv",
            ReportKind::Authors => "data/author_info.csv",
            ReportKind::PullRequestFeatures => "data/pull_request_features.csv",
        }
    }

    /// Unit counted by the progress log.
    pub fn unit(self) -> &'static str {
        match self {
            ReportKind::Commits | ReportKind::PullRequestImpact | ReportKind::PullRequestEffect => {
                "commits"
            }
            ReportKind::PullRequestBasics
            | ReportKind::PullRequestDefects
            | ReportKind::Authors
            | ReportKind::PullRequestFeatures => "pull requests",
        }
    }

    /// Whether projects on the ignore list are skipped for this report.
    pub fn honors_ignore_list(self) -> bool {
        matches!(
            self,
            ReportKind::PullRequestEffect | ReportKind::PullRequestFeatures
        )
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
