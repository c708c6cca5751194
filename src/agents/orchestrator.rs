use crate::agents::PathScannerAgent;
use crate::document::DocumentModel;
use crate::error::Result;
use crate::github::{RemoteRepository, RepositoryFactory};
use crate::settings::Settings;
use crate::tags::TagCache;
use crate::updaters::{Updater, UpdaterContext, UpdaterMetadata, UpdaterRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report what would change, never write.
    Detect,
    /// Write changed files back in place.
    Update,
}

/// Result of one updater on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterOutcome {
    pub id: &'static str,
    pub title: &'static str,
    pub changed: bool,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub has_changes: bool,
    /// Unified diff, only collected when details are enabled.
    pub diff: Option<String>,
    pub outcomes: Vec<UpdaterOutcome>,
    pub written: bool,
}

impl FileReport {
    pub fn total_updates(&self) -> usize {
        self.outcomes.iter().map(|o| o.count).sum()
    }
}

/// A file that could not be processed; the rest of the run went on.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub files: BTreeMap<PathBuf, FileReport>,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn changed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.values().filter(|f| f.has_changes)
    }

    pub fn has_changes(&self) -> bool {
        self.changed_files().next().is_some()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn written_files(&self) -> usize {
        self.files.values().filter(|f| f.written).count()
    }
}

/// Receives progress while a run is in flight.
pub trait RunObserver {
    fn on_start(&mut self, _total: usize) {}
    fn on_file(&mut self, _report: &FileReport) {}
    fn on_failure(&mut self, _failure: &FileFailure) {}
}

impl RunObserver for () {}

/// UpdateOrchestrator runs the selected updaters over every input file
pub struct UpdateOrchestrator {
    settings: Settings,
    updaters: Vec<Box<dyn Updater>>,
    cache: Arc<TagCache>,
    details: bool,
}

impl UpdateOrchestrator {
    pub fn new(settings: Settings, token: Option<String>, selectors: &[String]) -> Result<Self> {
        let remote = RepositoryFactory::create_github(&settings, token)?;
        Self::with_remote(settings, remote, selectors)
    }

    pub fn with_remote(
        settings: Settings,
        remote: Arc<dyn RemoteRepository>,
        selectors: &[String],
    ) -> Result<Self> {
        let cache = Arc::new(TagCache::new());
        let updaters = {
            let ctx = UpdaterContext {
                settings: &settings,
                remote,
                cache: Arc::clone(&cache),
            };
            UpdaterRegistry::discover().instantiate_selected(selectors, &ctx)?
        };

        Ok(Self {
            settings,
            updaters,
            cache,
            details: true,
        })
    }

    /// Whether file reports carry a diff.
    pub fn with_details(mut self, details: bool) -> Self {
        self.details = details;
        self
    }

    pub fn updaters(&self) -> impl Iterator<Item = &'static UpdaterMetadata> + '_ {
        self.updaters.iter().map(|u| u.metadata())
    }

    pub fn detect<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<RunReport> {
        self.run_with(paths, RunMode::Detect, &mut ())
    }

    pub fn update<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<RunReport> {
        self.run_with(paths, RunMode::Update, &mut ())
    }

    pub fn run_with<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        mode: RunMode,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport> {
        let files = PathScannerAgent::new(paths).scan()?;
        observer.on_start(files.len());

        let mut report = RunReport::default();
        for path in files {
            match self.process(&path, mode) {
                Ok(file_report) => {
                    observer.on_file(&file_report);
                    report.files.insert(path, file_report);
                }
                Err(e) if e.is_file_scoped() => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    let failure = FileFailure {
                        path,
                        error: e.to_string(),
                    };
                    observer.on_failure(&failure);
                    report.failures.push(failure);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            files = report.files.len(),
            failures = report.failures.len(),
            cached_repositories = self.cache.len(),
            "run finished"
        );
        Ok(report)
    }

    fn process(&mut self, path: &Path, mode: RunMode) -> Result<FileReport> {
        let mut document = DocumentModel::load(path)?.with_line_length(self.settings.line_length);

        let mut outcomes = Vec::with_capacity(self.updaters.len());
        for updater in &mut self.updaters {
            let changed = updater.detect(&mut document)?;
            let metadata = updater.metadata();
            outcomes.push(UpdaterOutcome {
                id: metadata.id,
                title: metadata.title,
                changed,
                count: updater.count(),
            });
        }

        let has_changes = document.has_changes();
        let diff = (self.details && has_changes).then(|| document.diff());

        let written = mode == RunMode::Update && has_changes;
        if written {
            document.save(path)?;
            debug!(path = %path.display(), "wrote updated workflow");
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            has_changes,
            diff,
            outcomes,
            written,
        })
    }
}
