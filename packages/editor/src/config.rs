use crate::errors::EditorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "composer.config.json";

/// Key that identifies a node; never propagated between relation members
pub const ID_KEY: &str = "id";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Name hashed into the seed of generated node ids
    #[serde(default = "default_id_seed")]
    pub id_seed: String,

    /// Attribute/property keys that stay local to the edited node
    #[serde(default = "default_protected_keys")]
    pub protected_keys: Vec<String>,

    /// Promote a surviving instance when its template is removed
    #[serde(default = "default_promote")]
    pub promote_on_template_removal: bool,
}

fn default_id_seed() -> String {
    "composer".to_string()
}

fn default_protected_keys() -> Vec<String> {
    vec![ID_KEY.to_string()]
}

fn default_promote() -> bool {
    true
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: &Path) -> Result<Self, EditorError> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: EditorConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(EditorConfig::default())
        }
    }

    /// Whether edits to `key` must never leave the edited node
    pub fn is_protected(&self, key: &str) -> bool {
        key == ID_KEY || self.protected_keys.iter().any(|k| k == key)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            id_seed: default_id_seed(),
            protected_keys: default_protected_keys(),
            promote_on_template_removal: default_promote(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "idSeed": "landing",
            "protectedKeys": ["data-test"],
            "promoteOnTemplateRemoval": false
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.id_seed, "landing");
        assert!(config.is_protected("data-test"));
        assert!(config.is_protected("id"));
        assert!(!config.is_protected("title"));
        assert!(!config.promote_on_template_removal);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.id_seed, "composer");
        assert_eq!(config.protected_keys, vec!["id"]);
        assert!(config.promote_on_template_removal);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "idSeed": "docs" }"#).unwrap();

        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config.id_seed, "docs");
        assert!(config.promote_on_template_removal);
    }
}
