//! Engine configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Properties whose expressions are tracked by default.
pub const DEFAULT_REFERENCE_PROPERTIES: [&str; 10] = [
    "label",
    "hintLabel",
    "constraintMsgAttr",
    "relevantAttr",
    "constraintAttr",
    "calculateAttr",
    "requiredAttr",
    "repeat_count",
    "itemsetData/nodeset",
    "itemsetData/filterRef",
];

/// Form columns of the bulk translation exchange, in order.
pub const DEFAULT_EXCHANGE_FORMS: [&str; 4] = ["default", "audio", "image", "video"];

/// Settings of one document session. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Path tails (the path without its leading `/<root>/`) that may stay
    /// unresolved without a warning.
    pub allowed_data_node_references: Vec<String>,
    pub reference_properties: Vec<String>,
    pub exchange_forms: Vec<String>,
    /// Languages accepted by the host. When set, they replace the languages
    /// found in a loaded document, the first becomes the default, and
    /// translations in any other language are skipped.
    pub languages: Vec<String>,
    pub display_language: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allowed_data_node_references: Vec::new(),
            reference_properties: DEFAULT_REFERENCE_PROPERTIES.map(String::from).to_vec(),
            exchange_forms: DEFAULT_EXCHANGE_FORMS.map(String::from).to_vec(),
            languages: Vec::new(),
            display_language: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn is_allowed_data_reference(&self, tail: &str) -> bool {
        self.allowed_data_node_references.iter().any(|a| a == tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.reference_properties.len(), 10);
        assert_eq!(config.exchange_forms[0], "default");
    }

    #[test]
    fn test_camel_case_fields() {
        let config = EngineConfig::from_json_str(
            r#"{
                "allowedDataNodeReferences": ["meta/deviceID"],
                "languages": ["en", "hin"],
                "displayLanguage": "hin"
            }"#,
        )
        .unwrap();
        assert!(config.is_allowed_data_reference("meta/deviceID"));
        assert!(!config.is_allowed_data_reference("meta/userID"));
        assert_eq!(config.languages, ["en", "hin"]);
        assert_eq!(config.display_language.as_deref(), Some("hin"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{\"languages\": 3}"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/config.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
