use crate::github::{RemoteError, TagRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// All tags of one repository, in the order the remote returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLookup {
    records: Vec<TagRecord>,
}

impl TagLookup {
    pub fn new(records: Vec<TagRecord>) -> Self {
        Self { records }
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn commit_for(&self, name: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.commit_sha.as_str())
    }
}

type Slot = Arc<OnceLock<Result<Arc<TagLookup>, RemoteError>>>;

/// Tag lookups for the duration of one run, keyed by `owner/repo`.
///
/// Each key is fetched at most once: a second caller asking for a repository
/// whose fetch is in flight blocks on the same slot instead of issuing another
/// request. Failures are remembered as well.
#[derive(Debug, Default)]
pub struct TagCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch<F>(&self, repo: &str, fetch: F) -> Result<Arc<TagLookup>, RemoteError>
    where
        F: FnOnce() -> Result<Vec<TagRecord>, RemoteError>,
    {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(slots.entry(repo.to_string()).or_default())
        };

        slot.get_or_init(|| fetch().map(|records| Arc::new(TagLookup::new(records))))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
