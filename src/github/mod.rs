use jiff::Timestamp;
use serde::Deserialize;
use thiserror::Error;

pub mod client;
pub mod factory;

pub use client::GitHubClient;
pub use factory::RepositoryFactory;

/// A tag of a remote repository and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    pub commit_sha: String,
}

impl TagRecord {
    pub fn new(name: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_sha: commit_sha.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseRecord {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("GitHub rejected the credentials while reading {repo}: {message}")]
    Unauthorized { repo: String, message: String },

    #[error("GitHub API rate limit exhausted while reading {repo}; {hint}")]
    RateLimited { repo: String, hint: String },

    #[error("Repository {0} was not found")]
    NotFound(String),

    #[error("GitHub returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RemoteError {
    /// Authentication and rate-limit failures end the whole run; everything
    /// else only costs the resolution of one step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized { .. } | RemoteError::RateLimited { .. }
        )
    }
}

/// Source of tags and releases for `owner/repo` identifiers.
pub trait RemoteRepository: Send + Sync {
    /// Every tag of the repository, across all pages.
    fn list_tags(&self, repo: &str) -> Result<Vec<TagRecord>, RemoteError>;

    /// Every release of the repository, across all pages.
    fn list_releases(&self, repo: &str) -> Result<Vec<ReleaseRecord>, RemoteError>;
}
