use crate::document::DocumentModel;
use crate::error::{ActionUpdaterError, Result};
use crate::updaters::{Updater, UpdaterContext, UpdaterMetadata};
use regex::Regex;
use tracing::debug;

pub static SET_OUTPUT: UpdaterMetadata = UpdaterMetadata {
    id: "set-output",
    title: "Set Output",
    description: "Replace deprecated ::set-output workflow commands with writes to $GITHUB_OUTPUT.",
    schema: None,
};

pub static SET_ENV: UpdaterMetadata = UpdaterMetadata {
    id: "set-env",
    title: "Set Env",
    description: "Replace deprecated ::set-env workflow commands with writes to $GITHUB_ENV.",
    schema: None,
};

pub static SAVE_STATE: UpdaterMetadata = UpdaterMetadata {
    id: "save-state",
    title: "Save State",
    description: "Replace deprecated ::save-state workflow commands with writes to $GITHUB_STATE.",
    schema: None,
};

pub static SET_STATE: UpdaterMetadata = UpdaterMetadata {
    id: "set-state",
    title: "Set State",
    description: "Replace deprecated ::set-state workflow commands with writes to $GITHUB_STATE.",
    schema: None,
};

pub fn set_output(_: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
    CommandUpdater::boxed(&SET_OUTPUT, "set-output", "$GITHUB_OUTPUT")
}

pub fn set_env(_: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
    CommandUpdater::boxed(&SET_ENV, "set-env", "$GITHUB_ENV")
}

pub fn save_state(_: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
    CommandUpdater::boxed(&SAVE_STATE, "save-state", "$GITHUB_STATE")
}

pub fn set_state(_: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
    CommandUpdater::boxed(&SET_STATE, "set-state", "$GITHUB_STATE")
}

/// Rewrites `<command> name=<name>::<value>` lines in `run` scripts into
/// appends to the matching environment file. The leading `::` is optional.
pub struct CommandUpdater {
    metadata: &'static UpdaterMetadata,
    pattern: Regex,
    target: &'static str,
    count: usize,
}

impl CommandUpdater {
    pub fn new(
        metadata: &'static UpdaterMetadata,
        marker: &str,
        target: &'static str,
    ) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"{}\s+name=(?P<name>.+?)::(?P<value>.+)",
            regex::escape(marker)
        ))
        .map_err(|e| ActionUpdaterError::Registration {
            id: metadata.id.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            metadata,
            pattern,
            target,
            count: 0,
        })
    }

    fn boxed(
        metadata: &'static UpdaterMetadata,
        marker: &str,
        target: &'static str,
    ) -> Result<Box<dyn Updater>> {
        Ok(Box::new(Self::new(metadata, marker, target)?))
    }
}

impl Updater for CommandUpdater {
    fn metadata(&self) -> &'static UpdaterMetadata {
        self.metadata
    }

    fn detect(&mut self, document: &mut DocumentModel) -> Result<bool> {
        self.count = 0;
        for step in document.steps() {
            let Some(script) = document.step_value(&step, "run") else {
                continue;
            };
            let Some(rewritten) = rewrite_lines(&script, &self.pattern, self.target) else {
                continue;
            };
            if document.set_step_value(&step, "run", &rewritten) {
                debug!(updater = self.metadata.id, step = %step.location, "rewrote run script");
                self.count += 1;
            }
        }
        Ok(self.count > 0)
    }

    fn count(&self) -> usize {
        self.count
    }
}

/// Replaces every matching line of `script`, keeping indentation and line
/// terminators. `None` when no line matched.
pub fn rewrite_lines(script: &str, pattern: &Regex, target: &str) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(script.len());

    for line in script.split_inclusive('\n') {
        let (body, terminator) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };

        match pattern.captures(body) {
            Some(captures) => {
                let indent = &body[..body.len() - body.trim_start().len()];
                let name = captures["name"].trim();
                let value = captures["value"].trim().trim_matches(['"', '\'']);
                out.push_str(&format!("{indent}echo \"{name}={value}\" >> {target}"));
                out.push_str(terminator);
                changed = true;
            }
            None => out.push_str(line),
        }
    }

    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updater(metadata: &'static UpdaterMetadata, marker: &str, target: &'static str) -> CommandUpdater {
        CommandUpdater::new(metadata, marker, target).unwrap()
    }

    fn run_value(document: &DocumentModel, index: usize) -> String {
        let step = document.steps()[index].clone();
        document.step_value(&step, "run").unwrap()
    }

    #[test]
    fn rewrites_set_output_lines() {
        let source = "jobs:\n  build:\n    steps:\n      - run: echo \"::set-output name=foo::bar\"\n";
        let mut document = DocumentModel::parse(source).unwrap();
        let mut set_output = updater(&SET_OUTPUT, "set-output", "$GITHUB_OUTPUT");

        assert!(set_output.detect(&mut document).unwrap());
        assert_eq!(set_output.count(), 1);
        assert_eq!(
            document.render(),
            "jobs:\n  build:\n    steps:\n      - run: echo \"foo=bar\" >> $GITHUB_OUTPUT\n"
        );

        assert!(!set_output.detect(&mut document).unwrap());
        assert_eq!(set_output.count(), 0);
    }

    #[test]
    fn rewrites_only_matching_lines_of_block_scripts() {
        let source = "\
jobs:
  build:
    steps:
      - run: |
          date
            echo \"::set-env name=STAMP::'today'\"
          echo done
";
        let mut document = DocumentModel::parse(source).unwrap();
        let mut set_env = updater(&SET_ENV, "set-env", "$GITHUB_ENV");

        assert!(set_env.detect(&mut document).unwrap());
        assert_eq!(
            run_value(&document, 0),
            "date\n  echo \"STAMP=today\" >> $GITHUB_ENV\necho done\n"
        );
        assert!(document.render().contains("      - run: |\n          date\n"));
    }

    #[test]
    fn commands_without_leading_separator_are_rewritten() {
        let source = "jobs:\n  a:\n    steps:\n      - run: echo \"set-env name=A::1\"\n";
        let mut document = DocumentModel::parse(source).unwrap();
        let mut set_env = updater(&SET_ENV, "set-env", "$GITHUB_ENV");

        assert!(set_env.detect(&mut document).unwrap());
        assert_eq!(run_value(&document, 0), "echo \"A=1\" >> $GITHUB_ENV");
    }

    #[test]
    fn counts_changed_steps() {
        let source = "\
jobs:
  a:
    steps:
      - run: echo \"::save-state name=one::1\"
      - run: echo unrelated
  b:
    steps:
      - run: echo \"::save-state name=two::2\"
";
        let mut document = DocumentModel::parse(source).unwrap();
        let mut save_state = updater(&SAVE_STATE, "save-state", "$GITHUB_STATE");

        assert!(save_state.detect(&mut document).unwrap());
        assert_eq!(save_state.count(), 2);
        assert_eq!(run_value(&document, 1), "echo unrelated");
    }

    #[test]
    fn no_match_leaves_document_untouched() {
        let source = "jobs:\n  a:\n    steps:\n      - run: echo \"::set-state name=x::y\"\n";
        let mut document = DocumentModel::parse(source).unwrap();
        let mut set_output = updater(&SET_OUTPUT, "set-output", "$GITHUB_OUTPUT");

        assert!(!set_output.detect(&mut document).unwrap());
        assert!(!document.has_changes());
    }

    #[test]
    fn rewrite_keeps_terminators() {
        let pattern = Regex::new(r"set-output\s+name=(?P<name>.+?)::(?P<value>.+)").unwrap();
        let script = "a\r\n  echo \"::set-output name=k::v\"\r\nb";
        assert_eq!(
            rewrite_lines(script, &pattern, "$GITHUB_OUTPUT").unwrap(),
            "a\r\n  echo \"k=v\" >> $GITHUB_OUTPUT\r\nb"
        );
        assert!(rewrite_lines("echo hi\n", &pattern, "$GITHUB_OUTPUT").is_none());
    }

    #[test]
    fn value_may_contain_separators() {
        let pattern = Regex::new(r"set-output\s+name=(?P<name>.+?)::(?P<value>.+)").unwrap();
        assert_eq!(
            rewrite_lines("echo ::set-output name=url::http://x::y", &pattern, "$GITHUB_OUTPUT")
                .unwrap(),
            "echo \"url=http://x::y\" >> $GITHUB_OUTPUT"
        );
    }
}
