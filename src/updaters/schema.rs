use crate::error::{ActionUpdaterError, Result};
use jsonschema::JSONSchema;
use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

/// JSON Schema for an updater's settings slot, kept as source text so it can
/// live in a `static`.
#[derive(Debug)]
pub struct ConfigSchema {
    pub source: &'static str,
}

impl ConfigSchema {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    fn document(&self, updater: &str) -> Result<Value> {
        serde_json::from_str(self.source).map_err(|e| ActionUpdaterError::Registration {
            id: updater.to_string(),
            message: format!("Failed to parse settings schema: {e}"),
        })
    }

    /// Declared properties and their descriptions, sorted by name.
    pub fn fields(&self) -> Vec<(String, String)> {
        let Ok(document) = serde_json::from_str::<Value>(self.source) else {
            return Vec::new();
        };
        document
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, property)| {
                        let description = property
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        (name.clone(), description.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validates `settings` and reports the first violation against the
    /// field it concerns.
    pub fn validate(&self, updater: &str, settings: &toml::Table) -> Result<()> {
        let document = self.document(updater)?;
        let schema = JSONSchema::compile(&document).map_err(|e| {
            ActionUpdaterError::Registration {
                id: updater.to_string(),
                message: format!("Failed to compile settings schema: {e}"),
            }
        })?;

        let instance = serde_json::to_value(settings).map_err(|e| {
            ActionUpdaterError::Settings(format!("Cannot read settings of '{updater}': {e}"))
        })?;

        let violation = match schema.validate(&instance) {
            Ok(()) => None,
            Err(mut errors) => errors.next().map(|error| match &error.kind {
                ValidationErrorKind::AdditionalProperties { unexpected } => (
                    unexpected.join(", "),
                    "is not a recognised setting".to_string(),
                ),
                _ => (
                    top_level_field(&error.instance_path.to_string()),
                    format!("is invalid: {error}"),
                ),
            }),
        };

        match violation {
            None => Ok(()),
            Some((field, message)) => Err(ActionUpdaterError::Configuration {
                updater: updater.to_string(),
                field,
                message,
            }),
        }
    }
}

/// `/major_orgs/0` -> `major_orgs`
fn top_level_field(pointer: &str) -> String {
    pointer
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    static SCHEMA: ConfigSchema = ConfigSchema::new(
        r#"{
            "type": "object",
            "properties": {
                "major_orgs": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "orgs"
                }
            },
            "additionalProperties": false
        }"#,
    );

    fn table(source: &str) -> toml::Table {
        source.parse().unwrap()
    }

    #[test]
    fn accepts_declared_fields() {
        assert!(SCHEMA.validate("version", &table("major_orgs = [\"actions\"]")).is_ok());
        assert!(SCHEMA.validate("version", &toml::Table::new()).is_ok());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = SCHEMA
            .validate("version", &table("trusted = [\"actions\"]"))
            .unwrap_err();
        assert!(matches!(
            err,
            ActionUpdaterError::Configuration { ref field, ref message, .. }
                if field == "trusted" && message == "is not a recognised setting"
        ));
    }

    #[test]
    fn rejects_wrong_types() {
        for source in ["major_orgs = \"actions\"", "major_orgs = [1, 2]"] {
            let err = SCHEMA.validate("version", &table(source)).unwrap_err();
            assert!(matches!(
                err,
                ActionUpdaterError::Configuration { ref field, .. } if field == "major_orgs"
            ));
        }
    }

    #[test]
    fn lists_fields_with_descriptions() {
        assert_eq!(
            SCHEMA.fields(),
            vec![("major_orgs".to_string(), "orgs".to_string())]
        );
    }

    #[test]
    fn broken_schema_is_a_registration_error() {
        let broken = ConfigSchema::new("{ not json");
        let err = broken.validate("version", &toml::Table::new()).unwrap_err();
        assert!(matches!(err, ActionUpdaterError::Registration { .. }));
    }
}
