//! Run configuration: the analysis settings file and the store connection taken from the environment.

use crate::analyze::SzzVariant;
use crate::model::Id;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use thiserror::Error;

pub const DEFAULT_PROGRESS_EVERY: usize = 500;

const DEFAULT_IGNORED_PROJECTS: [&str; 6] = [
    "jackrabbit",
    "maven",
    "tapestry-5",
    "james",
    "commons-rdf",
    "bigtop",
];

// dependabot
const DEFAULT_BOT_IDS: [&str; 1] = ["5ff191c8c26a57681e7b99d0"];

const DEFAULT_SOURCE_EXTENSIONS: [&str; 14] = [
    // Java
    ".java",
    // Scala
    ".scala",
    // Python
    ".py",
    // C
    ".c",
    ".h",
    // C++
    ".cpp",
    ".hpp",
    ".cc",
    ".hh",
    ".cxx",
    ".hxx",
    // C#
    ".cs",
    // JavaScript
    ".js",
    // TypeScript
    ".ts",
];

const ENV_HOST: &str = "SMARTSHARK_DB_HOST";
const ENV_PORT: &str = "SMARTSHARK_DB_PORT";
const ENV_USERNAME: &str = "SMARTSHARK_DB_USERNAME";
const ENV_PASSWORD: &str = "SMARTSHARK_DB_PASSWORD";
const ENV_AUTH_DATABASE: &str = "SMARTSHARK_DB_AUTHENTICATION_DATABASE";
const ENV_DATABASE: &str = "SMARTSHARK_DB_DATABASE";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 27017;
const DEFAULT_DATABASE: &str = "smartshark";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown SZZ variant `{0}`")]
    UnknownVariant(String),

    #[error("invalid value for {name}: `{value}`")]
    InvalidEnv { name: &'static str, value: String },
}

/// Which projects, authors and files are left out of the tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    pub ignored_projects: BTreeSet<String>,
    pub bot_ids: BTreeSet<Id>,
    pub source_extensions: Vec<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            ignored_projects: DEFAULT_IGNORED_PROJECTS.iter().map(|s| s.to_string()).collect(),
            bot_ids: DEFAULT_BOT_IDS.iter().map(|s| s.to_string()).collect(),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ExclusionPolicy {
    pub fn is_ignored(&self, project_name: &str) -> bool {
        self.ignored_projects.contains(project_name)
    }

    pub fn is_bot(&self, author_id: Option<&str>) -> bool {
        author_id.is_some_and(|id| self.bot_ids.contains(id))
    }

    pub fn is_source_path(&self, path: &str) -> bool {
        self.source_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub exclusions: ExclusionPolicy,
    /// Variant used by reports that cross-tabulate a single bug-inducing flag.
    pub primary_variant: SzzVariant,
    pub progress_every: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            exclusions: ExclusionPolicy::default(),
            primary_variant: SzzVariant::JlR,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    ignored_projects: Option<Vec<String>>,
    bot_ids: Option<Vec<String>>,
    source_extensions: Option<Vec<String>>,
    primary_variant: Option<String>,
    progress_every: Option<usize>,
}

// Create
impl AnalysisSettings {
    pub fn from_config(path: &str) -> Result<Self, ConfigError> {
        let json_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&json_str)
    }
}

// Parser
impl AnalysisSettings {
    fn parse(json_str: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = serde_json::from_str(json_str)?;
        let mut settings = Self::default();
        if let Some(ignored) = file.ignored_projects {
            settings.exclusions.ignored_projects = ignored.into_iter().collect();
        }
        if let Some(bot_ids) = file.bot_ids {
            settings.exclusions.bot_ids = bot_ids.into_iter().collect();
        }
        if let Some(extensions) = file.source_extensions {
            settings.exclusions.source_extensions = extensions;
        }
        if let Some(variant) = file.primary_variant {
            settings.primary_variant = variant
                .parse()
                .map_err(|_| ConfigError::UnknownVariant(variant))?;
        }
        if let Some(every) = file.progress_every {
            settings.progress_every = every.max(1);
        }
        Ok(settings)
    }
}

/// Connection parameters of the entity store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub authentication_database: Option<String>,
    pub database: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("authentication_database", &self.authentication_database)
            .field("database", &self.database)
            .finish()
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let port = match read(ENV_PORT) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                value,
            })?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            host: read(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            username: read(ENV_USERNAME),
            password: read(ENV_PASSWORD),
            authentication_database: read(ENV_AUTH_DATABASE),
            database: read(ENV_DATABASE).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }
}
