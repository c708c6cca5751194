use crate::error::{ActionUpdaterError, Result};
use crate::github::GitHubClient;
use crate::github::client::DEFAULT_GITHUB_API;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod editor;

pub use editor::SettingsEditor;

pub const DEFAULT_SETTINGS_FILE: &str = ".action-updater.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTheme {
    #[default]
    Vim,
    Monochrome,
}

/// User settings, read from `.action-updater.toml` or `--settings-file`.
///
/// ```toml
/// github_api = "https://api.github.com"
/// line_length = 120
/// diff_theme = "vim"
///
/// [updaters.version]
/// major_orgs = ["actions", "github"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub github_api: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_length: Option<usize>,
    pub diff_theme: DiffTheme,
    /// Per-updater settings slots keyed by updater id.
    pub updaters: BTreeMap<String, toml::Table>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut version = toml::Table::new();
        version.insert(
            "major_orgs".to_string(),
            toml::Value::Array(vec![toml::Value::String("actions".to_string())]),
        );

        Self {
            github_api: DEFAULT_GITHUB_API.to_string(),
            line_length: None,
            diff_theme: DiffTheme::default(),
            updaters: BTreeMap::from([("version".to_string(), version)]),
        }
    }
}

impl Settings {
    /// Loads an explicit settings file, or `.action-updater.toml` from the
    /// working directory when present, or the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !candidate.is_file() {
                    debug!("no settings file found, using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };

        debug!(path = %path.display(), "loading settings");
        let content = fs::read_to_string(&path).map_err(|e| {
            ActionUpdaterError::Settings(format!("Cannot read {}: {e}", path.display()))
        })?;
        let settings = Self::from_toml_str(&content).map_err(|e| match e {
            ActionUpdaterError::Toml(inner) => {
                ActionUpdaterError::Settings(format!("{}: {inner}", path.display()))
            }
            other => other,
        })?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        GitHubClient::validate_api_url(&self.github_api)?;
        if self.line_length == Some(0) {
            return Err(ActionUpdaterError::Settings(
                "line_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The settings slot of one updater; an empty table when unset.
    pub fn updater_settings(&self, id: &str) -> toml::Table {
        self.updaters.get(id).cloned().unwrap_or_default()
    }

    /// A string-list field of an updater slot. `None` when the field is
    /// absent; non-string elements are skipped (schemas reject them earlier).
    pub fn string_list(&self, id: &str, field: &str) -> Option<Vec<String>> {
        let values = self.updaters.get(id)?.get(field)?.as_array()?;
        Some(
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ActionUpdaterError::Settings(format!("Cannot serialize settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_trust_the_actions_org() {
        let settings = Settings::default();
        assert_eq!(settings.github_api, "https://api.github.com");
        assert_eq!(
            settings.string_list("version", "major_orgs"),
            Some(vec!["actions".to_string()])
        );
        assert_eq!(settings.diff_theme, DiffTheme::Vim);
        assert!(settings.line_length.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml_str("line_length = 100\n").unwrap();
        assert_eq!(settings.line_length, Some(100));
        assert_eq!(settings.github_api, DEFAULT_GITHUB_API);
        assert!(settings.updaters.contains_key("version"));
    }

    #[test]
    fn updater_slots_replace_the_default_map() {
        let settings = Settings::from_toml_str(
            "diff_theme = \"monochrome\"\n[updaters.version]\nmajor_orgs = [\"actions\", \"github\"]\n",
        )
        .unwrap();
        assert_eq!(settings.diff_theme, DiffTheme::Monochrome);
        assert_eq!(
            settings.string_list("version", "major_orgs").unwrap(),
            vec!["actions", "github"]
        );
        assert!(settings.updater_settings("set-output").is_empty());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Settings::from_toml_str("colour = true\n").unwrap_err();
        assert!(matches!(err, ActionUpdaterError::Toml(_)));
    }

    #[test]
    fn rejects_bad_api_url_and_zero_width() {
        assert!(Settings::from_toml_str("github_api = \"ftp://example.com\"\n").is_err());
        assert!(Settings::from_toml_str("line_length = 0\n").is_err());
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "github_api = \"https://ghe.example.com/api/v3\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.github_api, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ActionUpdaterError::Settings(_)));
    }

    #[test]
    fn serializes_back_to_toml() {
        let rendered = Settings::default().to_toml_string().unwrap();
        let parsed = Settings::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
