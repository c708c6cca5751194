use crate::error::Result;
use crate::github::{GitHubClient, RemoteRepository};
use crate::settings::Settings;
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_github(
        settings: &Settings,
        token: Option<String>,
    ) -> Result<Arc<dyn RemoteRepository>> {
        let client = GitHubClient::new(&settings.github_api, token)?;
        Ok(Arc::new(client))
    }
}
