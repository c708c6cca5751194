use crate::error::{ActionUpdaterError, Result};
use crate::settings::Settings;
use crate::utils::toml::TomlUtils;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Value};

/// Format-preserving editor behind the `config` subcommand.
///
/// Edits go through `toml_edit` so comments and layout of the user's file
/// survive; every save re-validates the result as [`Settings`].
pub struct SettingsEditor {
    path: PathBuf,
    document: DocumentMut,
}

impl SettingsEditor {
    /// Opens `path`, or starts an empty document when it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            fs::read_to_string(&path)?.parse::<DocumentMut>()?
        } else {
            DocumentMut::new()
        };
        Ok(Self { path, document })
    }

    /// Value stored in the file itself (defaults are not consulted).
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Self::check_key(key)?;
        Ok(TomlUtils::get(&self.document, key).map(TomlUtils::display))
    }

    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let (table, last) = TomlUtils::parent_table(&mut self.document, key)
            .ok_or_else(|| Self::not_a_table(key))?;
        let mut value = TomlUtils::parse_value(raw);

        // Overwrite in place so the key keeps its comments and spacing
        match table.get_mut(&last) {
            Some(Item::Value(existing)) => {
                *value.decor_mut() = existing.decor().clone();
                *existing = value;
            }
            _ => {
                table.insert(&last, Item::Value(value));
            }
        }
        Ok(())
    }

    /// Appends a string to a list setting, creating the list when missing.
    pub fn add(&mut self, key: &str, element: &str) -> Result<()> {
        let (table, last) = TomlUtils::parent_table(&mut self.document, key)
            .ok_or_else(|| Self::not_a_table(key))?;
        let item = table.entry(&last).or_insert(Item::None);
        if !TomlUtils::push_to_array(item, Value::from(element)) {
            return Err(ActionUpdaterError::Settings(format!(
                "'{key}' is not a list"
            )));
        }
        Ok(())
    }

    /// Removes one element of a list setting, or the whole key when no
    /// element is given. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str, element: Option<&str>) -> Result<bool> {
        Self::check_key(key)?;
        match element {
            Some(element) => Ok(TomlUtils::get_mut(&mut self.document, key)
                .map(|item| TomlUtils::remove_from_array(item, element))
                .unwrap_or(false)),
            None => {
                let Some((table, last)) = TomlUtils::parent_table(&mut self.document, key) else {
                    return Ok(false);
                };
                Ok(table.remove(&last).is_some())
            }
        }
    }

    /// Validates the edited document and writes it back.
    pub fn save(&self) -> Result<Settings> {
        let rendered = self.document.to_string();
        let settings = Settings::from_toml_str(&rendered)?;
        fs::write(&self.path, rendered).map_err(|source| ActionUpdaterError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(settings)
    }

    fn check_key(key: &str) -> Result<()> {
        TomlUtils::split_key(key)
            .map(|_| ())
            .ok_or_else(|| ActionUpdaterError::Settings(format!("Invalid settings key '{key}'")))
    }

    fn not_a_table(key: &str) -> ActionUpdaterError {
        ActionUpdaterError::Settings(format!(
            "Cannot address '{key}': invalid key or a parent is not a table"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn preserves_comments_when_setting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "# wrap long lines\nline_length = 80\n").unwrap();

        let mut editor = SettingsEditor::open(&path).unwrap();
        editor.set("line_length", "120").unwrap();
        let settings = editor.save().unwrap();

        assert_eq!(settings.line_length, Some(120));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# wrap long lines\n"));
        assert!(content.contains("line_length = 120"));
    }

    #[test]
    fn overwriting_keeps_surrounding_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "# theme\ndiff_theme = \"vim\"   # colours\n\n[updaters.version]\n# trusted\nmajor_orgs = [\"actions\"]\n",
        )
        .unwrap();

        let mut editor = SettingsEditor::open(&path).unwrap();
        editor.set("diff_theme", "monochrome").unwrap();
        editor.set("updaters.version.major_orgs", "[\"github\"]").unwrap();
        editor.save().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# theme\ndiff_theme = \"monochrome\"   # colours\n\n[updaters.version]\n# trusted\nmajor_orgs = [\"github\"]\n"
        );
    }

    #[test]
    fn adds_and_removes_list_elements() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut editor = SettingsEditor::open(&path).unwrap();
        editor.add("updaters.version.major_orgs", "actions").unwrap();
        editor.add("updaters.version.major_orgs", "github").unwrap();
        assert!(editor.remove("updaters.version.major_orgs", Some("actions")).unwrap());
        let settings = editor.save().unwrap();

        assert_eq!(
            settings.string_list("version", "major_orgs").unwrap(),
            vec!["github"]
        );
        assert_eq!(
            editor.get("updaters.version.major_orgs").unwrap().as_deref(),
            Some("[\"github\"]")
        );
    }

    #[test]
    fn removes_whole_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "line_length = 80\ndiff_theme = \"monochrome\"\n").unwrap();

        let mut editor = SettingsEditor::open(&path).unwrap();
        assert!(editor.remove("line_length", None).unwrap());
        assert!(!editor.remove("line_length", None).unwrap());
        editor.save().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "diff_theme = \"monochrome\"\n");
    }

    #[test]
    fn refuses_to_save_invalid_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut editor = SettingsEditor::open(&path).unwrap();
        editor.set("colour", "true").unwrap();
        assert!(editor.save().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn rejects_malformed_keys() {
        let dir = tempdir().unwrap();
        let mut editor = SettingsEditor::open(dir.path().join("s.toml")).unwrap();
        assert!(editor.get("a..b").is_err());
        assert!(editor.set("", "1").is_err());
    }
}
