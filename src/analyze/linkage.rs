//! Pull request → commit linkage and the commit exclusion filters.

use crate::analyze::ShaLookup;
use crate::model::{Commit, ExclusionPolicy, FileAction, Id, PullRequest, PullRequestCommit};
use crate::store::{Result, Store};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    All,
    Partial,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageResult {
    pub commit_ids: Vec<Option<Id>>,
    pub completeness: Completeness,
}

impl LinkageResult {
    pub fn from_commit_ids(commit_ids: Vec<Option<Id>>) -> Self {
        let resolved = commit_ids.iter().filter(|id| id.is_some()).count();
        let completeness = if resolved == 0 {
            Completeness::None
        } else if resolved == commit_ids.len() {
            Completeness::All
        } else {
            Completeness::Partial
        };
        Self {
            commit_ids,
            completeness,
        }
    }

    pub fn from_links(links: &[PullRequestCommit]) -> Self {
        Self::from_commit_ids(links.iter().map(|link| link.commit_id.clone()).collect())
    }

    /// Commit ids, only when every join-table entry is resolved.
    pub fn resolved_ids(&self) -> Option<Vec<Id>> {
        if self.completeness != Completeness::All {
            return None;
        }
        Some(self.commit_ids.iter().flatten().cloned().unique().collect())
    }
}

/// What may be folded into a pull request's defect verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every join-table entry points at a commit.
    Linked(Vec<Commit>),
    /// The join table was incomplete but the SHA lookup resolved every commit.
    Recovered(Vec<Commit>),
    /// Not analyzable for defect content.
    Excluded,
}

pub struct LinkageResolver<'a, S: Store + ?Sized> {
    store: &'a S,
    vcs_system_id: &'a str,
    repository: Option<&'a str>,
    lookup: Option<&'a ShaLookup>,
}

impl<'a, S: Store + ?Sized> LinkageResolver<'a, S> {
    pub fn new(store: &'a S, vcs_system_id: &'a str) -> Self {
        Self {
            store,
            vcs_system_id,
            repository: None,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, repository: Option<&'a str>, lookup: Option<&'a ShaLookup>) -> Self {
        self.repository = repository;
        self.lookup = lookup;
        self
    }

    pub async fn resolve_pull_request(&self, pull_request: &PullRequest) -> Result<LinkageResult> {
        let links = self.store.pull_request_commits(&pull_request.id).await?;
        Ok(LinkageResult::from_links(&links))
    }

    /// Partial data is never substituted: an incomplete join table is only
    /// replaced when the lookup resolves every listed SHA.
    pub async fn analyzable_commits(
        &self,
        pull_request: &PullRequest,
        linkage: &LinkageResult,
    ) -> Result<Resolution> {
        if let Some(ids) = linkage.resolved_ids() {
            let commits = self.store.commits_by_ids(&ids).await?;
            return Ok(Resolution::Linked(commits));
        }
        match self.recover(pull_request).await? {
            Some(commits) => Ok(Resolution::Recovered(commits)),
            None => Ok(Resolution::Excluded),
        }
    }

    async fn recover(&self, pull_request: &PullRequest) -> Result<Option<Vec<Commit>>> {
        let (Some(repository), Some(lookup)) = (self.repository, self.lookup) else {
            return Ok(None);
        };
        let Some(number) = pull_request.number() else {
            return Ok(None);
        };
        let Some(shas) = lookup.get(repository, number) else {
            return Ok(None);
        };
        let mut commits = Vec::with_capacity(shas.len());
        for sha in shas.iter().unique() {
            match self.store.commit_by_revision(self.vcs_system_id, sha).await? {
                Some(commit) => commits.push(commit),
                None => {
                    tracing::debug!(
                        pull_request = %pull_request.external_id,
                        sha = %sha,
                        "lookup commit missing from store"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(commits))
    }
}

/// Whether any file touched by the commit is a source file.
pub async fn touches_source<S: Store + ?Sized>(
    store: &S,
    policy: &ExclusionPolicy,
    file_actions: &[FileAction],
) -> Result<bool> {
    let file_ids = file_actions
        .iter()
        .filter_map(|action| action.file_id.clone())
        .unique()
        .collect::<Vec<_>>();
    if file_ids.is_empty() {
        return Ok(false);
    }
    let files = store.files(&file_ids).await?;
    Ok(files.iter().any(|file| policy.is_source_path(&file.path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[Option<&str>]) -> Vec<Option<Id>> {
        values.iter().map(|v| v.map(String::from)).collect()
    }

    #[test]
    fn all_entries_resolved() {
        let linkage = LinkageResult::from_commit_ids(ids(&[Some("c1"), Some("c2")]));
        assert_eq!(linkage.completeness, Completeness::All);
        assert_eq!(
            linkage.resolved_ids(),
            Some(vec!["c1".to_string(), "c2".to_string()])
        );
    }

    #[test]
    fn one_null_makes_it_partial() {
        let linkage = LinkageResult::from_commit_ids(ids(&[Some("c1"), None, Some("c3")]));
        assert_eq!(linkage.completeness, Completeness::Partial);
        assert_eq!(linkage.resolved_ids(), None);
    }

    #[test]
    fn only_nulls_is_none() {
        let linkage = LinkageResult::from_commit_ids(ids(&[None, None]));
        assert_eq!(linkage.completeness, Completeness::None);
    }

    #[test]
    fn empty_linkage_is_none() {
        let linkage = LinkageResult::from_commit_ids(vec![]);
        assert_eq!(linkage.completeness, Completeness::None);
        assert_eq!(linkage.resolved_ids(), None);
    }

    #[test]
    fn duplicate_references_resolve_once() {
        let linkage = LinkageResult::from_commit_ids(ids(&[Some("c1"), Some("c1")]));
        assert_eq!(linkage.resolved_ids(), Some(vec!["c1".to_string()]));
    }
}
