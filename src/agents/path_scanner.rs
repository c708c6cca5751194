use crate::error::{ActionUpdaterError, Result};
use crate::utils::PathValidator;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// PathScannerAgent turns command-line inputs into the workflow files to process
pub struct PathScannerAgent {
    inputs: Vec<PathBuf>,
}

impl PathScannerAgent {
    pub fn new<P: AsRef<Path>>(inputs: &[P]) -> Self {
        Self {
            inputs: inputs.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    /// Files are taken as given, directories are searched recursively for
    /// `.yml`/`.yaml` files. The result keeps first-seen order and holds each
    /// canonical path once.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for input in &self.inputs {
            let canonical = PathValidator::validate_input_path(input)?;

            if canonical.is_file() {
                if seen.insert(canonical.clone()) {
                    files.push(canonical);
                }
                continue;
            }

            for entry in WalkDir::new(&canonical).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    ActionUpdaterError::PathValidation(format!(
                        "Cannot read {}: {e}",
                        canonical.display()
                    ))
                })?;
                if !entry.file_type().is_file() || !PathValidator::is_workflow_file(entry.path()) {
                    continue;
                }
                let path = entry.path().canonicalize()?;
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        debug!(count = files.len(), "resolved workflow files");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_directories_in_sorted_order() {
        let dir = tempdir().unwrap();
        let workflows = dir.path().join(".github/workflows");
        fs::create_dir_all(&workflows).unwrap();
        fs::write(workflows.join("b.yml"), "on: push\n").unwrap();
        fs::write(workflows.join("a.yaml"), "on: push\n").unwrap();
        fs::write(workflows.join("notes.md"), "# notes\n").unwrap();

        let files = PathScannerAgent::new(&[dir.path()]).scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml"]);
    }

    #[test]
    fn deduplicates_overlapping_inputs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ci.yml");
        fs::write(&file, "on: push\n").unwrap();

        let files = PathScannerAgent::new(&[file.clone(), dir.path().to_path_buf(), file])
            .scan()
            .unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn explicit_files_are_used_regardless_of_extension() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("workflow.txt");
        fs::write(&file, "on: push\n").unwrap();

        let files = PathScannerAgent::new(&[&file]).scan().unwrap();
        assert_eq!(files, vec![file.canonicalize().unwrap()]);
    }

    #[test]
    fn missing_paths_are_rejected() {
        let dir = tempdir().unwrap();
        let err = PathScannerAgent::new(&[dir.path().join("absent.yml")])
            .scan()
            .unwrap_err();
        assert!(matches!(err, ActionUpdaterError::PathValidation(_)));
    }
}
