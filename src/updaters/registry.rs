use crate::error::{ActionUpdaterError, Result};
use crate::github::RemoteRepository;
use crate::settings::Settings;
use crate::tags::TagCache;
use crate::updaters::{Updater, UpdaterMetadata, commands, version};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Collaborators handed to updater factories.
pub struct UpdaterContext<'a> {
    pub settings: &'a Settings,
    pub remote: Arc<dyn RemoteRepository>,
    pub cache: Arc<TagCache>,
}

pub type UpdaterFactory = fn(&UpdaterContext<'_>) -> Result<Box<dyn Updater>>;

pub struct Registration {
    pub metadata: &'static UpdaterMetadata,
    pub factory: UpdaterFactory,
}

static REGISTRATIONS: &[Registration] = &[
    Registration {
        metadata: &commands::SET_OUTPUT,
        factory: commands::set_output,
    },
    Registration {
        metadata: &commands::SET_ENV,
        factory: commands::set_env,
    },
    Registration {
        metadata: &commands::SAVE_STATE,
        factory: commands::save_state,
    },
    Registration {
        metadata: &commands::SET_STATE,
        factory: commands::set_state,
    },
    Registration {
        metadata: &version::VERSION,
        factory: version::create,
    },
];

/// The compiled-in set of updaters, in the order they run.
pub struct UpdaterRegistry {
    registrations: &'static [Registration],
}

impl UpdaterRegistry {
    pub fn discover() -> Self {
        Self {
            registrations: REGISTRATIONS,
        }
    }

    #[cfg(test)]
    fn from_registrations(registrations: &'static [Registration]) -> Self {
        Self { registrations }
    }

    pub fn metadata(&self) -> impl Iterator<Item = &'static UpdaterMetadata> + '_ {
        self.registrations.iter().map(|r| r.metadata)
    }

    /// Looks a registration up by id or slug.
    pub fn find(&self, selector: &str) -> Option<&'static Registration> {
        self.registrations
            .iter()
            .find(|r| r.metadata.matches(selector))
    }

    pub fn instantiate(&self, selector: &str, ctx: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
        let registration = self
            .find(selector)
            .ok_or_else(|| self.unknown(selector))?;
        self.validate(registration)?;

        let metadata = registration.metadata;
        if let Some(schema) = metadata.schema {
            schema.validate(metadata.id, &ctx.settings.updater_settings(metadata.id))?;
        }

        debug!(updater = metadata.id, "instantiating updater");
        (registration.factory)(ctx)
    }

    /// Instantiates the selected updaters (all when `selectors` is empty) in
    /// registration order. Repeated selectors are ignored.
    pub fn instantiate_selected(
        &self,
        selectors: &[String],
        ctx: &UpdaterContext<'_>,
    ) -> Result<Vec<Box<dyn Updater>>> {
        for slot in ctx.settings.updaters.keys() {
            if self.find(slot).is_none() {
                warn!(updater = %slot, "settings provided for an unknown updater");
            }
        }

        let mut selected = BTreeSet::new();
        for selector in selectors {
            let registration = self
                .find(selector)
                .ok_or_else(|| self.unknown(selector))?;
            selected.insert(registration.metadata.id);
        }

        self.registrations
            .iter()
            .filter(|r| selectors.is_empty() || selected.contains(r.metadata.id))
            .map(|r| self.instantiate(r.metadata.id, ctx))
            .collect()
    }

    fn validate(&self, registration: &Registration) -> Result<()> {
        let metadata = registration.metadata;
        let invalid = |message: &str| ActionUpdaterError::Registration {
            id: metadata.id.to_string(),
            message: message.to_string(),
        };

        if metadata.id.is_empty()
            || !metadata
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-')
        {
            return Err(invalid("id must use lowercase letters and hyphens only"));
        }
        if metadata.title.trim().is_empty() {
            return Err(invalid("title is empty"));
        }
        if metadata.description.trim().is_empty() {
            return Err(invalid("description is empty"));
        }
        let duplicates = self
            .registrations
            .iter()
            .filter(|r| r.metadata.id == metadata.id)
            .count();
        if duplicates > 1 {
            return Err(invalid("id is registered more than once"));
        }
        Ok(())
    }

    fn unknown(&self, selector: &str) -> ActionUpdaterError {
        ActionUpdaterError::UnknownUpdater {
            name: selector.to_string(),
            available: self
                .registrations
                .iter()
                .map(|r| r.metadata.id)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
