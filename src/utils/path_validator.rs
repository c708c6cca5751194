use crate::error::{ActionUpdaterError, Result};
use std::path::{Path, PathBuf};

const SYSTEM_DIRECTORIES: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Guards the file system inputs of a run.
pub struct PathValidator;

impl PathValidator {
    /// Canonicalises a workflow file or directory given on the command line.
    /// The path must exist and must not live under a system directory.
    pub fn validate_input_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            ActionUpdaterError::PathValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        for system in SYSTEM_DIRECTORIES {
            let system_path = Path::new(system);
            let resolved = system_path.canonicalize().ok();

            let inside = path.starts_with(system_path)
                || canonical.starts_with(system_path)
                || resolved.is_some_and(|r| canonical.starts_with(r));
            if inside {
                return Err(ActionUpdaterError::PathValidation(format!(
                    "Refusing to process files under system directory '{system}'"
                )));
            }
        }

        Ok(canonical)
    }

    /// Whether a file name carries a workflow extension.
    pub fn is_workflow_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
    }
}
