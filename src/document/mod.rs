use crate::error::{ActionUpdaterError, Result};
use similar::TextDiff;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub mod scalar;
pub mod tree;

pub use tree::{NodeId, Tree};

/// Where a step sits in its document, for messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepLocation {
    Job { job: String, index: usize },
    Composite { index: usize },
}

impl fmt::Display for StepLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLocation::Job { job, index } => write!(f, "jobs.{job}.steps[{index}]"),
            StepLocation::Composite { index } => write!(f, "runs.steps[{index}]"),
        }
    }
}

/// Handle to a step mapping in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub node: NodeId,
    pub location: StepLocation,
}

/// A workflow or composite action file held as two trees: the baseline as
/// parsed, and the working copy updaters edit.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    path: Option<PathBuf>,
    baseline: Tree,
    working: Tree,
    line_length: Option<usize>,
}

impl DocumentModel {
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_named(source, None)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        Self::parse_named(&source, Some(path.to_path_buf()))
    }

    fn parse_named(source: &str, path: Option<PathBuf>) -> Result<Self> {
        let display = path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string());

        serde_yaml::from_str::<serde_yaml::Value>(source).map_err(|e| {
            ActionUpdaterError::Parse {
                path: display.clone(),
                message: e.to_string(),
            }
        })?;

        let baseline = Tree::parse(source).map_err(|e| ActionUpdaterError::Parse {
            path: display,
            message: e.to_string(),
        })?;

        Ok(Self {
            path,
            working: baseline.clone(),
            baseline,
            line_length: None,
        })
    }

    pub fn with_line_length(mut self, line_length: Option<usize>) -> Self {
        self.line_length = line_length;
        self
    }

    pub fn path_display(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string())
    }

    /// Steps of every job (`jobs.*.steps`) followed by the steps of a
    /// composite action (`runs.steps`), read from the working tree.
    pub fn steps(&self) -> Vec<WorkflowStep> {
        let tree = &self.working;
        let Some(root) = tree.root() else {
            return Vec::new();
        };

        let mut steps = Vec::new();
        if let Some(jobs) = tree.get(root, "jobs") {
            for (job, job_node) in tree.entries(jobs) {
                let Some(job_steps) = tree.get(job_node, "steps") else {
                    continue;
                };
                for (index, node) in tree.items(job_steps).into_iter().enumerate() {
                    if tree.is_mapping(node) {
                        steps.push(WorkflowStep {
                            node,
                            location: StepLocation::Job {
                                job: job.to_string(),
                                index,
                            },
                        });
                    }
                }
            }
        }

        if let Some(runs_steps) = tree.get(root, "runs").and_then(|r| tree.get(r, "steps")) {
            for (index, node) in tree.items(runs_steps).into_iter().enumerate() {
                if tree.is_mapping(node) {
                    steps.push(WorkflowStep {
                        node,
                        location: StepLocation::Composite { index },
                    });
                }
            }
        }
        steps
    }

    pub fn step_value(&self, step: &WorkflowStep, key: &str) -> Option<String> {
        self.working
            .get(step.node, key)
            .and_then(|id| self.working.scalar(id))
            .map(str::to_string)
    }

    pub fn set_step_value(&mut self, step: &WorkflowStep, key: &str, value: &str) -> bool {
        match self.working.get(step.node, key) {
            Some(id) => self.working.set_scalar(id, value),
            None => false,
        }
    }

    pub fn step_comment(&self, step: &WorkflowStep, key: &str) -> Option<String> {
        self.working
            .get(step.node, key)
            .and_then(|id| self.working.comment(id))
            .map(str::to_string)
    }

    pub fn set_step_comment(&mut self, step: &WorkflowStep, key: &str, comment: &str) -> bool {
        match self.working.get(step.node, key) {
            Some(id) => self.working.set_comment(id, comment),
            None => false,
        }
    }

    pub fn clear_step_comment(&mut self, step: &WorkflowStep, key: &str) -> bool {
        match self.working.get(step.node, key) {
            Some(id) => self.working.clear_comment(id),
            None => false,
        }
    }

    /// Whether the working tree renders differently from the baseline.
    pub fn has_changes(&self) -> bool {
        self.baseline.render(self.line_length) != self.working.render(self.line_length)
    }

    pub fn render(&self) -> String {
        self.working.render(self.line_length)
    }

    /// The source text as it was read.
    pub fn render_original(&self) -> String {
        self.baseline.render(None)
    }

    /// Unified diff from the file as read to the text `save` would write.
    pub fn diff(&self) -> String {
        let original = self.render_original();
        let updated = self.render();
        TextDiff::from_lines(&original, &updated)
            .unified_diff()
            .context_radius(3)
            .header("original", "updated")
            .to_string()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.render()).map_err(|source| ActionUpdaterError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const WORKFLOW: &str = "\
name: build
on: [push]

jobs:
  test:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v3
      - name: Say
        run: echo \"::set-output name=greeting::hello\"
      - plain string step
  lint:
    steps:
      - uses: github/super-linter@v4 # v4
";

    #[test]
    fn round_trips_without_changes() {
        let document = DocumentModel::parse(WORKFLOW).unwrap();
        assert_eq!(document.render(), WORKFLOW);
        assert_eq!(document.render_original(), WORKFLOW);
        assert!(!document.has_changes());
        assert!(document.diff().is_empty());
    }

    #[test]
    fn lists_job_steps_in_order() {
        let document = DocumentModel::parse(WORKFLOW).unwrap();
        let steps = document.steps();
        let locations: Vec<String> = steps.iter().map(|s| s.location.to_string()).collect();
        assert_eq!(
            locations,
            vec!["jobs.test.steps[0]", "jobs.test.steps[1]", "jobs.lint.steps[0]"]
        );
        assert_eq!(
            document.step_value(&steps[0], "uses").as_deref(),
            Some("actions/checkout@v3")
        );
        assert_eq!(document.step_comment(&steps[2], "uses").as_deref(), Some("# v4"));
        assert!(document.step_value(&steps[1], "uses").is_none());
    }

    #[test]
    fn lists_composite_action_steps() {
        let action = "name: composite\nruns:\n  using: composite\n  steps:\n    - uses: actions/cache@v3\n";
        let document = DocumentModel::parse(action).unwrap();
        let steps = document.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].location, StepLocation::Composite { index: 0 });
    }

    #[test]
    fn change_detection_is_idempotent() {
        let mut document = DocumentModel::parse(WORKFLOW).unwrap();
        let step = document.steps()[0].clone();
        assert!(document.set_step_value(&step, "uses", "actions/checkout@v4"));

        assert!(document.has_changes());
        assert!(document.has_changes());
        let diff = document.diff();
        assert!(diff.contains("--- original"));
        assert!(diff.contains("+++ updated"));
        assert!(diff.contains("-      - uses: actions/checkout@v3"));
        assert!(diff.contains("+      - uses: actions/checkout@v4"));
    }

    #[test]
    fn reverting_a_value_clears_changes() {
        let mut document = DocumentModel::parse(WORKFLOW).unwrap();
        let step = document.steps()[0].clone();
        document.set_step_value(&step, "uses", "actions/checkout@v4");
        document.set_step_value(&step, "uses", "actions/checkout@v3");
        assert!(!document.has_changes());
    }

    #[test]
    fn invalid_yaml_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yml");
        fs::write(&path, "jobs:\n  build: [unclosed\n").unwrap();

        let err = DocumentModel::load(&path).unwrap_err();
        match err {
            ActionUpdaterError::Parse { path: shown, .. } => assert!(shown.ends_with("broken.yml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_constructs_are_parse_errors() {
        let err = DocumentModel::parse("a: 1\n---\nb: 2\n").unwrap_err();
        assert!(matches!(err, ActionUpdaterError::Parse { .. }));
        assert!(err.is_file_scoped());
    }

    #[test]
    fn saves_the_working_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ci.yml");
        fs::write(&path, WORKFLOW).unwrap();

        let mut document = DocumentModel::load(&path).unwrap();
        let step = document.steps()[2].clone();
        document.set_step_value(&step, "uses", "github/super-linter@v5");
        document.set_step_comment(&step, "uses", "# v5");
        document.save(&path).unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("      - uses: github/super-linter@v5 # v5\n"));
        assert_eq!(saved.lines().count(), WORKFLOW.lines().count());
    }

    #[test]
    fn wraps_long_lines_when_configured() {
        let source = "jobs:\n  a:\n    steps:\n      - run: echo alpha beta gamma delta epsilon zeta\n";
        let document = DocumentModel::parse(source)
            .unwrap()
            .with_line_length(Some(40));
        assert!(!document.has_changes());
        assert!(document.render().lines().count() > source.lines().count());
    }
}
