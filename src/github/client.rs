use crate::error::{ActionUpdaterError, Result};
use crate::github::{ReleaseRecord, RemoteError, RemoteRepository, TagRecord};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;
const MAX_PAGE_BYTES: usize = 10 * 1024 * 1024;

/// GitHub REST client for tag and release listings.
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_base: &str, token: Option<String>) -> Result<Self> {
        let api_base = Self::validate_api_url(api_base)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("action-updater/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActionUpdaterError::Io(std::io::Error::other(e)))?;

        Ok(Self {
            client,
            api_base,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, repo: &str, resource: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            repo,
            resource
        )
    }

    /// Fetch every page of a listing, following `Link: <...>; rel="next"`.
    fn get_paginated<T: DeserializeOwned>(
        &self,
        repo: &str,
        resource: &str,
    ) -> std::result::Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut next = Some(self.endpoint(repo, resource));
        let mut first = true;
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                debug!(repo, pages, "stopping pagination at page limit");
                break;
            }
            pages += 1;

            debug!(%url, "fetching");
            let mut request = self
                .client
                .get(&url)
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if first {
                request = request.query(&[("per_page", PAGE_SIZE)]);
                first = false;
            }
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }

            let response = request.send().map_err(|e| RemoteError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(self.classify_failure(repo, &url, response));
            }

            next = Self::next_link(response.headers());
            let text = response.text().map_err(|e| RemoteError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

            if text.len() > MAX_PAGE_BYTES {
                return Err(RemoteError::Decode {
                    url,
                    message: "response exceeded 10MB limit".to_string(),
                });
            }

            let page: Vec<T> = serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;
            items.extend(page);
        }

        Ok(items)
    }

    fn classify_failure(&self, repo: &str, url: &str, response: Response) -> RemoteError {
        let status = response.status();
        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false);
        let message = response
            .json::<ApiMessage>()
            .map(|m| m.message)
            .unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized {
                repo: repo.to_string(),
                message: if message.is_empty() {
                    "check the supplied token".to_string()
                } else {
                    message
                },
            },
            StatusCode::TOO_MANY_REQUESTS => self.rate_limited(repo),
            StatusCode::FORBIDDEN if exhausted || message.contains("rate limit") => {
                self.rate_limited(repo)
            }
            StatusCode::NOT_FOUND => RemoteError::NotFound(repo.to_string()),
            _ => RemoteError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
        }
    }

    fn rate_limited(&self, repo: &str) -> RemoteError {
        let hint = if self.has_token() {
            "wait for the limit to reset or use a token with a higher quota".to_string()
        } else {
            "export GITHUB_TOKEN (or pass --token) to increase API limits".to_string()
        };
        RemoteError::RateLimited {
            repo: repo.to_string(),
            hint,
        }
    }

    fn next_link(headers: &HeaderMap) -> Option<String> {
        let link = headers.get(LINK)?.to_str().ok()?;
        link.split(',').find_map(|part| {
            let mut sections = part.split(';');
            let target = sections.next()?.trim();
            let is_next = sections.any(|s| s.trim() == r#"rel="next""#);
            if !is_next {
                return None;
            }
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        })
    }

    pub(crate) fn validate_api_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|_| ActionUpdaterError::Settings(format!("Invalid GitHub API URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => Ok(parsed),
            scheme => Err(ActionUpdaterError::Settings(format!(
                "Unsupported GitHub API scheme: {scheme}"
            ))),
        }
    }
}

impl RemoteRepository for GitHubClient {
    fn list_tags(&self, repo: &str) -> std::result::Result<Vec<TagRecord>, RemoteError> {
        let tags: Vec<ApiTag> = self.get_paginated(repo, "tags")?;
        debug!(repo, count = tags.len(), "received tags");
        Ok(tags
            .into_iter()
            .map(|t| TagRecord::new(t.name, t.commit.sha))
            .collect())
    }

    fn list_releases(&self, repo: &str) -> std::result::Result<Vec<ReleaseRecord>, RemoteError> {
        self.get_paginated(repo, "releases")
    }
}

#[derive(Debug, Deserialize)]
struct ApiTag {
    name: String,
    commit: ApiCommit,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}
