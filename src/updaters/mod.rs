// Updaters detect one category of outdated workflow syntax and rewrite it.
//
// Each updater is registered in `registry` and works on the working tree of a
// `DocumentModel` only; the orchestrator decides whether anything is written.

use crate::document::DocumentModel;
use crate::error::Result;

pub mod commands;
pub mod registry;
pub mod schema;
pub mod version;

pub use registry::{UpdaterContext, UpdaterRegistry};
pub use schema::ConfigSchema;

/// Static description of an updater.
#[derive(Debug)]
pub struct UpdaterMetadata {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub schema: Option<&'static ConfigSchema>,
}

impl UpdaterMetadata {
    /// The id without hyphens, accepted wherever an id is.
    pub fn slug(&self) -> String {
        self.id.replace('-', "")
    }

    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        self.id == selector || self.slug() == selector
    }
}

pub trait Updater: Send {
    fn metadata(&self) -> &'static UpdaterMetadata;

    /// Rewrites what this updater knows about in the working tree. Returns
    /// whether any step changed; `count` reports how many did.
    fn detect(&mut self, document: &mut DocumentModel) -> Result<bool>;

    fn count(&self) -> usize;
}
