//! MongoDB backend over the SmartSHARK collections.

use crate::model::{
    Commit, File, FileAction, Id, InduceRecord, Project, PullRequest, PullRequestCommit,
    PullRequestSystem, StoreConfig, VcsSystem, CLOSED_STATE,
};
use crate::store::{Extremum, PullRequestFilter, Result, Store, StoreConnector, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::{ClientOptions, Credential, FindOneOptions, FindOptions, ServerAddress};
use mongodb::{Client, Collection, Database};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

const APP_NAME: &str = "defect-metrics";

#[derive(Debug, Clone)]
pub struct MongoConnector {
    config: StoreConfig,
}

impl MongoConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: self.config.host.clone(),
            port: Some(self.config.port),
        }];
        options.app_name = Some(APP_NAME.to_string());
        if self.config.username.is_some() {
            let mut credential = Credential::default();
            credential.username = self.config.username.clone();
            credential.password = self.config.password.clone();
            credential.source = self.config.authentication_database.clone();
            options.credential = Some(credential);
        }
        options
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    type Store = MongoStore;

    async fn connect(&self) -> Result<Self::Store> {
        let client = Client::with_options(self.client_options())?;
        let database = client.database(&self.config.database);
        Ok(MongoStore { client, database })
    }
}

pub struct MongoStore {
    // Held so the session lives exactly as long as the store.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

// Documents

#[derive(Deserialize)]
struct ProjectDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct SystemDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    project_id: ObjectId,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct CommitDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    vcs_system_id: ObjectId,
    committer_date: BsonDateTime,
    #[serde(default)]
    labels: HashMap<String, Option<bool>>,
    #[serde(default)]
    revision_hash: Option<String>,
}

#[derive(Deserialize)]
struct CommitDateDoc {
    committer_date: BsonDateTime,
}

#[derive(Deserialize)]
struct PullRequestDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    pull_request_system_id: ObjectId,
    #[serde(default)]
    external_id: Option<Bson>,
    created_at: BsonDateTime,
    #[serde(default)]
    merged_at: Option<BsonDateTime>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    creator_id: Option<ObjectId>,
    #[serde(default)]
    source_repo_url: Option<String>,
    #[serde(default)]
    target_repo_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestDateDoc {
    created_at: BsonDateTime,
}

#[derive(Deserialize)]
struct PullRequestCommitDoc {
    pull_request_id: ObjectId,
    #[serde(default)]
    commit_id: Option<ObjectId>,
    #[serde(default)]
    author_id: Option<ObjectId>,
}

#[derive(Deserialize)]
struct FileActionDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    commit_id: ObjectId,
    #[serde(default)]
    file_id: Option<ObjectId>,
    #[serde(default)]
    induces: Vec<InduceDoc>,
}

#[derive(Deserialize)]
struct InduceDoc {
    #[serde(default)]
    label: String,
}

#[derive(Deserialize)]
struct FileDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    path: String,
}

// Conversion

fn object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn object_ids(ids: &[Id]) -> Result<Vec<ObjectId>> {
    ids.iter().map(|id| object_id(id)).collect()
}

fn utc(datetime: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(datetime.timestamp_millis()).unwrap_or_default()
}

fn external_id(value: Option<Bson>) -> String {
    match value {
        Some(Bson::String(s)) => s,
        Some(Bson::Int32(n)) => n.to_string(),
        Some(Bson::Int64(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl From<CommitDoc> for Commit {
    fn from(doc: CommitDoc) -> Self {
        Self {
            id: doc.id.to_hex(),
            vcs_system_id: doc.vcs_system_id.to_hex(),
            committer_date: utc(doc.committer_date),
            labels: doc
                .labels
                .into_iter()
                .filter_map(|(key, value)| value.map(|value| (key, value)))
                .collect(),
            revision_hash: doc.revision_hash.unwrap_or_default(),
        }
    }
}

impl From<PullRequestDoc> for PullRequest {
    fn from(doc: PullRequestDoc) -> Self {
        Self {
            id: doc.id.to_hex(),
            pull_request_system_id: doc.pull_request_system_id.to_hex(),
            external_id: external_id(doc.external_id),
            created_at: utc(doc.created_at),
            merged_at: doc.merged_at.map(utc),
            state: doc.state.unwrap_or_default(),
            creator_id: doc.creator_id.map(|id| id.to_hex()),
            source_repo_url: doc.source_repo_url,
            target_repo_url: doc.target_repo_url,
            title: doc.title,
            description: doc.description,
        }
    }
}

impl From<PullRequestCommitDoc> for PullRequestCommit {
    fn from(doc: PullRequestCommitDoc) -> Self {
        Self {
            pull_request_id: doc.pull_request_id.to_hex(),
            commit_id: doc.commit_id.map(|id| id.to_hex()),
            author_id: doc.author_id.map(|id| id.to_hex()),
        }
    }
}

impl From<FileActionDoc> for FileAction {
    fn from(doc: FileActionDoc) -> Self {
        Self {
            id: doc.id.to_hex(),
            commit_id: doc.commit_id.to_hex(),
            file_id: doc.file_id.map(|id| id.to_hex()),
            induces: doc
                .induces
                .into_iter()
                .map(|induce| InduceRecord {
                    label: induce.label,
                })
                .collect(),
        }
    }
}

fn pull_request_query(system_ids: &[Id], filter: &PullRequestFilter) -> Result<Document> {
    let mut query = doc! { "pull_request_system_id": { "$in": object_ids(system_ids)? } };
    if let Some(merged) = filter.merged {
        query.insert("merged_at", doc! { "$exists": merged });
    }
    if filter.rejected {
        query.insert("merged_at", doc! { "$exists": false });
        query.insert("state", CLOSED_STATE);
    }
    if let Some(until) = filter.created_until {
        query.insert(
            "created_at",
            doc! { "$lte": BsonDateTime::from_millis(until.timestamp_millis()) },
        );
    }
    Ok(query)
}

fn pull_request_projection(filter: &PullRequestFilter) -> Document {
    let mut projection = doc! {
        "pull_request_system_id": 1,
        "external_id": 1,
        "created_at": 1,
        "merged_at": 1,
        "state": 1,
        "creator_id": 1,
        "source_repo_url": 1,
        "target_repo_url": 1,
    };
    if filter.with_text {
        projection.insert("title", 1);
        projection.insert("description", 1);
    }
    projection
}

fn sort_direction(extremum: Extremum) -> i32 {
    match extremum {
        Extremum::Earliest => 1,
        Extremum::Latest => -1,
    }
}

// Queries
impl MongoStore {
    fn collection<T>(&self, name: &str) -> Collection<T> {
        self.database.collection::<T>(name)
    }

    async fn find<T>(&self, name: &str, query: Document, options: FindOptions) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let cursor = self.collection::<T>(name).find(query, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one<T>(
        &self,
        name: &str,
        query: Document,
        options: FindOneOptions,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        Ok(self.collection::<T>(name).find_one(query, options).await?)
    }

    async fn count(&self, name: &str, query: Document) -> Result<u64> {
        Ok(self
            .collection::<Document>(name)
            .count_documents(query, None)
            .await?)
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn projects(&self) -> Result<Vec<Project>> {
        let options = FindOptions::builder()
            .projection(doc! { "name": 1 })
            .build();
        let docs: Vec<ProjectDoc> = self.find("project", doc! {}, options).await?;
        Ok(docs
            .into_iter()
            .map(|doc| Project::new(doc.id.to_hex(), doc.name))
            .collect())
    }

    async fn vcs_system(&self, project_id: &str) -> Result<Option<VcsSystem>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "project_id": 1, "url": 1 })
            .build();
        let doc: Option<SystemDoc> = self
            .find_one("vcs_system", doc! { "project_id": object_id(project_id)? }, options)
            .await?;
        Ok(doc.map(|doc| VcsSystem {
            id: doc.id.to_hex(),
            project_id: doc.project_id.to_hex(),
            url: doc.url,
        }))
    }

    async fn pull_request_systems(&self, project_id: &str) -> Result<Vec<PullRequestSystem>> {
        let options = FindOptions::builder()
            .projection(doc! { "project_id": 1, "url": 1 })
            .build();
        let docs: Vec<SystemDoc> = self
            .find(
                "pull_request_system",
                doc! { "project_id": object_id(project_id)? },
                options,
            )
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| PullRequestSystem {
                id: doc.id.to_hex(),
                project_id: doc.project_id.to_hex(),
                url: doc.url,
            })
            .collect())
    }

    async fn commits(&self, vcs_system_id: &str) -> Result<Vec<Commit>> {
        let options = FindOptions::builder()
            .projection(commit_projection())
            .sort(doc! { "committer_date": 1 })
            .build();
        let docs: Vec<CommitDoc> = self
            .find(
                "commit",
                doc! { "vcs_system_id": object_id(vcs_system_id)? },
                options,
            )
            .await?;
        Ok(docs.into_iter().map(Commit::from).collect())
    }

    async fn commits_by_ids(&self, ids: &[Id]) -> Result<Vec<Commit>> {
        let options = FindOptions::builder()
            .projection(commit_projection())
            .build();
        let docs: Vec<CommitDoc> = self
            .find("commit", doc! { "_id": { "$in": object_ids(ids)? } }, options)
            .await?;
        Ok(docs.into_iter().map(Commit::from).collect())
    }

    async fn commit_by_revision(
        &self,
        vcs_system_id: &str,
        revision_hash: &str,
    ) -> Result<Option<Commit>> {
        let options = FindOneOptions::builder()
            .projection(commit_projection())
            .build();
        let doc: Option<CommitDoc> = self
            .find_one(
                "commit",
                doc! {
                    "vcs_system_id": object_id(vcs_system_id)?,
                    "revision_hash": revision_hash,
                },
                options,
            )
            .await?;
        Ok(doc.map(Commit::from))
    }

    async fn count_commits(&self, vcs_system_id: &str) -> Result<u64> {
        self.count(
            "commit",
            doc! { "vcs_system_id": object_id(vcs_system_id)? },
        )
        .await
    }

    async fn commit_date(
        &self,
        vcs_system_id: &str,
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "committer_date": 1 })
            .sort(doc! { "committer_date": sort_direction(extremum) })
            .build();
        let doc: Option<CommitDateDoc> = self
            .find_one(
                "commit",
                doc! { "vcs_system_id": object_id(vcs_system_id)? },
                options,
            )
            .await?;
        Ok(doc.map(|doc| utc(doc.committer_date)))
    }

    async fn pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        let options = FindOptions::builder()
            .projection(pull_request_projection(filter))
            .sort(doc! { "created_at": 1 })
            .build();
        let docs: Vec<PullRequestDoc> = self
            .find(
                "pull_request",
                pull_request_query(system_ids, filter)?,
                options,
            )
            .await?;
        Ok(docs.into_iter().map(PullRequest::from).collect())
    }

    async fn count_pull_requests(
        &self,
        system_ids: &[Id],
        filter: &PullRequestFilter,
    ) -> Result<u64> {
        self.count("pull_request", pull_request_query(system_ids, filter)?)
            .await
    }

    async fn pull_request_date(
        &self,
        system_ids: &[Id],
        extremum: Extremum,
    ) -> Result<Option<DateTime<Utc>>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "created_at": 1 })
            .sort(doc! { "created_at": sort_direction(extremum) })
            .build();
        let query = pull_request_query(system_ids, &PullRequestFilter::all())?;
        let doc: Option<PullRequestDateDoc> =
            self.find_one("pull_request", query, options).await?;
        Ok(doc.map(|doc| utc(doc.created_at)))
    }

    async fn pull_request_commits(&self, pull_request_id: &str) -> Result<Vec<PullRequestCommit>> {
        let options = FindOptions::builder()
            .projection(pull_request_commit_projection())
            .build();
        let docs: Vec<PullRequestCommitDoc> = self
            .find(
                "pull_request_commit",
                doc! { "pull_request_id": object_id(pull_request_id)? },
                options,
            )
            .await?;
        Ok(docs.into_iter().map(PullRequestCommit::from).collect())
    }

    async fn pull_request_commit_for(&self, commit_id: &str) -> Result<Option<PullRequestCommit>> {
        let options = FindOneOptions::builder()
            .projection(pull_request_commit_projection())
            .build();
        let doc: Option<PullRequestCommitDoc> = self
            .find_one(
                "pull_request_commit",
                doc! { "commit_id": object_id(commit_id)? },
                options,
            )
            .await?;
        Ok(doc.map(PullRequestCommit::from))
    }

    async fn file_actions(&self, commit_id: &str) -> Result<Vec<FileAction>> {
        let options = FindOptions::builder()
            .projection(doc! { "commit_id": 1, "file_id": 1, "induces.label": 1 })
            .build();
        let docs: Vec<FileActionDoc> = self
            .find(
                "file_action",
                doc! { "commit_id": object_id(commit_id)? },
                options,
            )
            .await?;
        Ok(docs.into_iter().map(FileAction::from).collect())
    }

    async fn files(&self, ids: &[Id]) -> Result<Vec<File>> {
        let options = FindOptions::builder().projection(doc! { "path": 1 }).build();
        let docs: Vec<FileDoc> = self
            .find("file", doc! { "_id": { "$in": object_ids(ids)? } }, options)
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| File::new(doc.id.to_hex(), doc.path))
            .collect())
    }
}

fn commit_projection() -> Document {
    doc! { "vcs_system_id": 1, "committer_date": 1, "labels": 1, "revision_hash": 1 }
}

fn pull_request_commit_projection() -> Document {
    doc! { "pull_request_id": 1, "commit_id": 1, "author_id": 1 }
}
