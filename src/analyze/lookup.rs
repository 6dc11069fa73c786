//! Pull request → commit SHA table produced by the GitHub fetcher.
//!
//! Columns: `owner,repository,pull_request_id,pull_request_number,commit_sha_list`,
//! where the SHA list is comma-joined and `Not Found` marks a failed fetch.

use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

const NOT_FOUND: &str = "Not Found";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("commit lookup table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct LookupRecord {
    repository: String,
    pull_request_number: u64,
    #[serde(default)]
    commit_sha_list: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShaLookup {
    entries: HashMap<(String, u64), Vec<String>>,
}

// Create
impl ShaLookup {
    pub fn from_csv(path: &str) -> Result<Self, LookupError> {
        let reader = csv::Reader::from_path(path)?;
        Self::parse(reader)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, LookupError> {
        Self::parse(csv::Reader::from_reader(reader))
    }

    pub fn insert(&mut self, repository: impl ToString, number: u64, shas: Vec<String>) {
        self.entries.insert((repository.to_string(), number), shas);
    }
}

// Parser
impl ShaLookup {
    fn parse<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, LookupError> {
        let mut lookup = Self::default();
        for record in reader.deserialize() {
            let record: LookupRecord = record?;
            let shas = record
                .commit_sha_list
                .split(',')
                .map(str::trim)
                .filter(|sha| !sha.is_empty())
                .map(String::from)
                .collect::<Vec<_>>();
            let shas = if shas.iter().any(|sha| sha == NOT_FOUND) {
                vec![]
            } else {
                shas
            };
            lookup.insert(record.repository, record.pull_request_number, shas);
        }
        Ok(lookup)
    }
}

impl ShaLookup {
    /// SHAs of the pull request, or `None` when the fetcher found nothing.
    pub fn get(&self, repository: &str, number: u64) -> Option<&[String]> {
        self.entries
            .get(&(repository.to_string(), number))
            .map(Vec::as_slice)
            .filter(|shas| !shas.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
