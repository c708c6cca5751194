use crate::document::DocumentModel;
use crate::error::{ActionUpdaterError, Result};
use crate::github::RemoteRepository;
use crate::tags::{TagCache, TagLookup, TagOrderer};
use crate::updaters::schema::ConfigSchema;
use crate::updaters::{Updater, UpdaterContext, UpdaterMetadata};
use std::sync::Arc;
use tracing::{debug, warn};

/// Organisations trusted with major tags when no setting says otherwise.
pub const DEFAULT_MAJOR_ORGS: &[&str] = &["actions"];

static VERSION_SCHEMA: ConfigSchema = ConfigSchema::new(
    r#"{
        "type": "object",
        "properties": {
            "major_orgs": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Organisations whose actions are pinned to a major tag such as v4 instead of a commit"
            }
        },
        "additionalProperties": false
    }"#,
);

pub static VERSION: UpdaterMetadata = UpdaterMetadata {
    id: "version",
    title: "Version",
    description: "Pin actions to their latest release: a major tag for trusted organisations, a commit SHA otherwise.",
    schema: Some(&VERSION_SCHEMA),
};

pub fn create(ctx: &UpdaterContext<'_>) -> Result<Box<dyn Updater>> {
    let major_orgs = ctx
        .settings
        .string_list(VERSION.id, "major_orgs")
        .unwrap_or_else(|| DEFAULT_MAJOR_ORGS.iter().map(|s| s.to_string()).collect());
    Ok(Box::new(VersionUpdater::new(
        Arc::clone(&ctx.remote),
        Arc::clone(&ctx.cache),
        major_orgs,
    )))
}

/// The reference an action should move to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reference: String,
    pub comment: Option<String>,
}

pub struct VersionUpdater {
    remote: Arc<dyn RemoteRepository>,
    cache: Arc<TagCache>,
    major_orgs: Vec<String>,
    count: usize,
}

impl VersionUpdater {
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        cache: Arc<TagCache>,
        major_orgs: Vec<String>,
    ) -> Self {
        Self {
            remote,
            cache,
            major_orgs,
            count: 0,
        }
    }

    fn trusts(&self, owner: &str) -> bool {
        self.major_orgs
            .iter()
            .any(|org| org.eq_ignore_ascii_case(owner))
    }

    /// Major tag for trusted owners, otherwise the commit of the newest tag
    /// with the tag name as comment.
    pub fn resolve(&self, owner: &str, lookup: &TagLookup) -> Option<Resolution> {
        let names = lookup.names();

        if self.trusts(owner) {
            if let Some(latest) = TagOrderer::order_major(&names).into_iter().next() {
                return Some(Resolution {
                    reference: latest.original,
                    comment: None,
                });
            }
        }

        let mut ordered = TagOrderer::order_strict(&names);
        if ordered.is_empty() {
            ordered = TagOrderer::order_major(&names);
        }
        let latest = ordered.into_iter().next()?;
        let sha = lookup.commit_for(&latest.original)?;
        Some(Resolution {
            reference: sha.to_string(),
            comment: Some(format!("# {}", latest.original)),
        })
    }
}

impl Updater for VersionUpdater {
    fn metadata(&self) -> &'static UpdaterMetadata {
        &VERSION
    }

    fn detect(&mut self, document: &mut DocumentModel) -> Result<bool> {
        self.count = 0;

        for step in document.steps() {
            let Some(uses) = document.step_value(&step, "uses") else {
                continue;
            };
            let uses = uses.trim();
            if uses.is_empty() || uses.starts_with("./") || uses.starts_with("docker://") {
                continue;
            }

            let malformed = || ActionUpdaterError::MalformedReference {
                path: document.path_display(),
                location: step.location.to_string(),
                value: uses.to_string(),
            };
            let Some((action, reference)) = uses.split_once('@') else {
                return Err(malformed());
            };
            let mut segments = action.split('/');
            let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
                return Err(malformed());
            };
            if owner.is_empty() || repo.is_empty() {
                return Err(malformed());
            }
            let current = reference.split('#').next().unwrap_or_default().trim();

            let repository = format!("{owner}/{repo}");
            let lookup = match self
                .cache
                .get_or_fetch(&repository, || self.remote.list_tags(&repository))
            {
                Ok(lookup) => lookup,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(repository = %repository, error = %e, "leaving step unchanged");
                    continue;
                }
            };

            let Some(resolution) = self.resolve(owner, &lookup) else {
                debug!(repository = %repository, "no usable tags");
                continue;
            };

            let updated = format!("{action}@{}", resolution.reference);
            if updated == uses || !document.set_step_value(&step, "uses", &updated) {
                continue;
            }
            match &resolution.comment {
                Some(comment) => {
                    document.set_step_comment(&step, "uses", comment);
                }
                None => {
                    // A `# <tag>` left by an earlier commit pin no longer applies
                    let stale = document
                        .step_comment(&step, "uses")
                        .and_then(|c| c.strip_prefix('#').map(|t| t.trim().to_string()))
                        .is_some_and(|tag| lookup.commit_for(&tag).is_some());
                    if stale {
                        document.clear_step_comment(&step, "uses");
                    }
                }
            }

            debug!(
                step = %step.location,
                from = current,
                to = %resolution.reference,
                "updated action reference"
            );
            self.count += 1;
        }

        Ok(self.count > 0)
    }

    fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RemoteError;
    use crate::github::testing::FakeRemote;

    fn updater(remote: FakeRemote, major_orgs: &[&str]) -> (VersionUpdater, Arc<FakeRemote>) {
        let remote = Arc::new(remote);
        let updater = VersionUpdater::new(
            remote.clone(),
            Arc::new(TagCache::new()),
            major_orgs.iter().map(|s| s.to_string()).collect(),
        );
        (updater, remote)
    }

    fn workflow(uses: &[&str]) -> String {
        let mut source = String::from("on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n");
        for value in uses {
            source.push_str(&format!("      - uses: {value}\n"));
        }
        source
    }

    #[test]
    fn pins_untrusted_actions_to_a_commit() {
        let remote = FakeRemote::new().with_tags(
            "someorg/tool",
            &[("v1.0.0", "aaa"), ("v2.0.0", "ccc"), ("v1.2.0", "bbb"), ("nightly", "zzz")],
        );
        let (mut updater, _) = updater(remote, &["actions"]);
        let mut document = DocumentModel::parse(&workflow(&["someorg/tool@v1"])).unwrap();

        assert!(updater.detect(&mut document).unwrap());
        assert_eq!(updater.count(), 1);
        assert_eq!(
            document.render(),
            workflow(&["someorg/tool@ccc # v2.0.0"])
        );
    }

    #[test]
    fn moves_trusted_actions_to_the_latest_major_tag() {
        let remote = FakeRemote::new().with_tags(
            "actions/checkout",
            &[("v4.1.0", "f1"), ("v4", "f0"), ("v3", "e0"), ("v3.6.0", "e1")],
        );
        let (mut updater, _) = updater(remote, &["Actions"]);
        let mut document = DocumentModel::parse(&workflow(&["actions/checkout@v3"])).unwrap();

        assert!(updater.detect(&mut document).unwrap());
        assert_eq!(document.render(), workflow(&["actions/checkout@v4"]));
    }

    #[test]
    fn moving_to_a_major_tag_drops_the_pinned_tag_comment() {
        let remote = FakeRemote::new().with_tags(
            "actions/checkout",
            &[("v4", "f0"), ("v3.6.0", "e1"), ("v3", "e0")],
        );
        let (mut updater, _) = updater(remote, &["actions"]);
        let mut document = DocumentModel::parse(&workflow(&[
            "actions/checkout@e1 # v3.6.0",
            "actions/checkout@v3 # keep me",
        ]))
        .unwrap();

        updater.detect(&mut document).unwrap();
        assert_eq!(
            document.render(),
            workflow(&["actions/checkout@v4", "actions/checkout@v4 # keep me"])
        );
    }

    #[test]
    fn untrusted_major_only_tags_pin_the_newest_commit() {
        let remote = FakeRemote::new().with_tags("o/r", &[("v1", "s1"), ("v2", "s2")]);
        let (mut updater, _) = updater(remote, &["actions"]);
        let mut document = DocumentModel::parse(&workflow(&["o/r@v1"])).unwrap();

        assert!(updater.detect(&mut document).unwrap());
        assert_eq!(document.render(), workflow(&["o/r@s2 # v2"]));
    }

    #[test]
    fn trusted_owner_without_major_tags_falls_back_to_a_commit() {
        let remote = FakeRemote::new().with_tags("actions/cache", &[("v3.3.1", "c331")]);
        let (mut updater, _) = updater(remote, &["actions"]);
        let mut document = DocumentModel::parse(&workflow(&["actions/cache@v2"])).unwrap();

        updater.detect(&mut document).unwrap();
        assert_eq!(document.render(), workflow(&["actions/cache@c331 # v3.3.1"]));
    }

    #[test]
    fn up_to_date_references_are_left_alone() {
        let remote = FakeRemote::new().with_tags("actions/checkout", &[("v4", "f0")]);
        let (mut updater, _) = updater(remote, &["actions"]);
        let mut document = DocumentModel::parse(&workflow(&["actions/checkout@v4"])).unwrap();

        assert!(!updater.detect(&mut document).unwrap());
        assert_eq!(updater.count(), 0);
        assert!(!document.has_changes());
    }

    #[test]
    fn repositories_without_tags_are_left_alone() {
        let remote = FakeRemote::new().with_tags("someorg/empty", &[]);
        let (mut updater, _) = updater(remote, &[]);
        let mut document = DocumentModel::parse(&workflow(&["someorg/empty@main"])).unwrap();

        assert!(!updater.detect(&mut document).unwrap());
        assert_eq!(updater.count(), 0);
        assert!(!document.has_changes());
    }

    #[test]
    fn missing_repositories_are_skipped() {
        let (mut updater, _) = updater(FakeRemote::new(), &[]);
        let mut document = DocumentModel::parse(&workflow(&["gone/away@v1"])).unwrap();

        assert!(!updater.detect(&mut document).unwrap());
        assert!(!document.has_changes());
    }

    #[test]
    fn rate_limits_abort_the_run() {
        let remote = FakeRemote::new().with_failure(
            "someorg/tool",
            RemoteError::RateLimited {
                repo: "someorg/tool".to_string(),
                hint: "export GITHUB_TOKEN".to_string(),
            },
        );
        let (mut updater, _) = updater(remote, &[]);
        let mut document = DocumentModel::parse(&workflow(&["someorg/tool@v1"])).unwrap();

        let err = updater.detect(&mut document).unwrap_err();
        assert!(matches!(err, ActionUpdaterError::Remote(RemoteError::RateLimited { .. })));
    }

    #[test]
    fn local_and_docker_references_are_not_looked_up() {
        let (mut updater, remote) = updater(FakeRemote::new(), &[]);
        let mut document =
            DocumentModel::parse(&workflow(&["./.github/actions/setup", "docker://alpine:3.19"]))
                .unwrap();

        assert!(!updater.detect(&mut document).unwrap());
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn reference_without_ref_is_malformed() {
        let (mut updater, _) = updater(FakeRemote::new(), &[]);
        let mut document = DocumentModel::parse(&workflow(&["actions/checkout"])).unwrap();

        let err = updater.detect(&mut document).unwrap_err();
        match err {
            ActionUpdaterError::MalformedReference { location, value, .. } => {
                assert_eq!(location, "jobs.build.steps[0]");
                assert_eq!(value, "actions/checkout");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn subdirectory_actions_use_the_repository_tags() {
        let remote = FakeRemote::new().with_tags("github/codeql-action", &[("v3.24.0", "c0de")]);
        let (mut updater, remote) = updater(remote, &[]);
        let mut document =
            DocumentModel::parse(&workflow(&["github/codeql-action/init@v2"])).unwrap();

        updater.detect(&mut document).unwrap();
        assert_eq!(
            document.render(),
            workflow(&["github/codeql-action/init@c0de # v3.24.0"])
        );
        assert_eq!(remote.calls(), vec!["github/codeql-action"]);
    }

    #[test]
    fn each_repository_is_fetched_once() {
        let remote = FakeRemote::new().with_tags("someorg/tool", &[("v2.0.0", "ccc")]);
        let (mut updater, remote) = updater(remote, &[]);
        let mut document =
            DocumentModel::parse(&workflow(&["someorg/tool@v1", "someorg/tool@v1.5"])).unwrap();

        updater.detect(&mut document).unwrap();
        assert_eq!(updater.count(), 2);
        assert_eq!(remote.calls().len(), 1);
    }

    #[test]
    fn existing_comments_are_replaced_in_place() {
        let source = "jobs:\n  a:\n    steps:\n      - uses: someorg/tool@aaa    # v1.0.0\n";
        let remote = FakeRemote::new().with_tags("someorg/tool", &[("v1.0.0", "aaa"), ("v1.1.0", "bbb")]);
        let (mut updater, _) = updater(remote, &[]);
        let mut document = DocumentModel::parse(source).unwrap();

        updater.detect(&mut document).unwrap();
        assert_eq!(
            document.render(),
            "jobs:\n  a:\n    steps:\n      - uses: someorg/tool@bbb    # v1.1.0\n"
        );
    }
}
