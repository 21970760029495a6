//! Application preferences plug-in
//!
//! Holds the `preferences` configuration: a flat set of named items with
//! free-form metadata (description, default value and the like), persisted
//! as a single JSON document. Values change through `set`; new preferences
//! only appear through the privileged `define` path, and defining an
//! identifier twice is rejected so one subsystem cannot silently clobber
//! another's defaults.

use luna_plugin_api::{
    ConfigurationItem, ConfigurationPlugin, PluginBundle, PluginError, PluginInstance,
    PluginManifest,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

const FILE_NAME: &str = "preferences.json";

/// On-disk shape of one preference
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredItem {
    value: Value,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

/// Configuration plug-in named `preferences`
pub struct Preferences {
    items: Mutex<BTreeMap<String, ConfigurationItem>>,
}

impl Preferences {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationPlugin for Preferences {
    fn name(&self) -> &str {
        "preferences"
    }

    fn get(&self, identifier: &str) -> Option<Value> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.get(identifier).map(|item| item.value().clone())
    }

    fn identifiers(&self) -> Vec<String> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.keys().cloned().collect()
    }

    fn set(&self, identifier: &str, value: Value) -> Result<(), PluginError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let item = items
            .get(identifier)
            .ok_or_else(|| PluginError::UnknownIdentifier(identifier.to_string()))?;
        // Metadata survives value changes.
        let replacement = ConfigurationItem::new(identifier, value, item.metadata().clone())?;
        items.insert(identifier.to_string(), replacement);
        Ok(())
    }

    fn define(&self, item: ConfigurationItem) -> Result<(), PluginError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if items.contains_key(item.identifier()) {
            return Err(PluginError::custom(format!(
                "Preference already defined: {}",
                item.identifier()
            )));
        }
        items.insert(item.identifier().to_string(), item);
        Ok(())
    }

    fn item_metadata(&self, identifier: &str) -> Option<BTreeMap<String, Value>> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.get(identifier).map(|item| item.metadata().clone())
    }

    fn load(&self, directory: &Path) -> Result<(), PluginError> {
        let path = directory.join(FILE_NAME);
        if !path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(path)?;
        let stored: BTreeMap<String, StoredItem> = serde_json::from_slice(&bytes)
            .map_err(|error| PluginError::ConfigurationFormat(error.to_string()))?;
        let mut loaded = BTreeMap::new();
        for (identifier, item) in stored {
            loaded.insert(
                identifier.clone(),
                ConfigurationItem::new(identifier, item.value, item.metadata)?,
            );
        }
        // Replace wholesale only after the whole document parsed; a
        // malformed file leaves the current preferences untouched.
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        *items = loaded;
        Ok(())
    }

    fn save(&self, directory: &Path) -> Result<(), PluginError> {
        let stored: BTreeMap<String, StoredItem> = {
            let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            items
                .iter()
                .map(|(identifier, item)| {
                    (
                        identifier.clone(),
                        StoredItem {
                            value: item.value().clone(),
                            metadata: item.metadata().clone(),
                        },
                    )
                })
                .collect()
        };
        let bytes = serde_json::to_vec_pretty(&stored)
            .map_err(|error| PluginError::serialisation(error.to_string()))?;

        // Stage in the target directory, then rename over the old file, so
        // a crash mid-write never leaves a truncated document.
        let mut staged = tempfile::NamedTempFile::new_in(directory)?;
        std::io::Write::write_all(&mut staged, &bytes)?;
        staged
            .persist(directory.join(FILE_NAME))
            .map_err(|error| PluginError::Io(error.error))?;
        Ok(())
    }
}

/// Build the plug-in bundle this library exports
pub fn bundle() -> PluginBundle {
    PluginBundle {
        manifest: PluginManifest {
            name: "Preferences".to_string(),
            description: "Holds the application preferences".to_string(),
            ..Default::default()
        },
        instances: vec![PluginInstance::Configuration(Box::new(Preferences::new()))],
    }
}

#[cfg(feature = "export")]
#[cfg(feature = "export")]
luna_plugin_api::export_plugin!(bundle);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(identifier: &str, value: Value) -> ConfigurationItem {
        ConfigurationItem::new(identifier, value, BTreeMap::new()).unwrap()
    }

    fn described(identifier: &str, value: Value, description: &str) -> ConfigurationItem {
        let mut metadata = BTreeMap::new();
        metadata.insert("description".to_string(), json!(description));
        ConfigurationItem::new(identifier, value, metadata).unwrap()
    }

    #[test]
    fn test_define_and_get() {
        let preferences = Preferences::new();
        preferences
            .define(item("language", json!("common")))
            .unwrap();
        assert_eq!(preferences.get("language"), Some(json!("common")));
        assert_eq!(preferences.get("missing"), None);
        assert_eq!(preferences.identifiers(), vec!["language"]);
    }

    #[test]
    fn test_define_existing_rejected() {
        let preferences = Preferences::new();
        preferences
            .define(item("language", json!("common")))
            .unwrap();
        let result = preferences.define(item("language", json!("elvish")));
        assert!(result.is_err());
        // The original definition stands.
        assert_eq!(preferences.get("language"), Some(json!("common")));
    }

    #[test]
    fn test_set_requires_existing_identifier() {
        let preferences = Preferences::new();
        assert!(matches!(
            preferences.set("undefined", json!(1)),
            Err(PluginError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_set_preserves_metadata() {
        let preferences = Preferences::new();
        preferences
            .define(described("volume", json!(7), "output volume"))
            .unwrap();
        preferences.set("volume", json!(11)).unwrap();
        assert_eq!(preferences.get("volume"), Some(json!(11)));
        let metadata = preferences.item_metadata("volume").unwrap();
        assert_eq!(metadata.get("description"), Some(&json!("output volume")));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let directory = tempfile::tempdir().unwrap();
        let preferences = Preferences::new();
        preferences
            .define(described("language", json!("common"), "user language"))
            .unwrap();
        preferences.define(item("volume", json!(11))).unwrap();
        preferences.save(directory.path()).unwrap();
        assert!(directory.path().join(FILE_NAME).exists());

        let restored = Preferences::new();
        restored.load(directory.path()).unwrap();
        assert_eq!(restored.get("language"), Some(json!("common")));
        assert_eq!(restored.get("volume"), Some(json!(11)));
        let metadata = restored.item_metadata("language").unwrap();
        assert_eq!(metadata.get("description"), Some(&json!("user language")));
    }

    #[test]
    fn test_load_missing_file_is_noop() {
        let directory = tempfile::tempdir().unwrap();
        let preferences = Preferences::new();
        preferences
            .define(item("language", json!("common")))
            .unwrap();
        preferences.load(directory.path()).unwrap();
        assert_eq!(preferences.get("language"), Some(json!("common")));
    }

    #[test]
    fn test_load_malformed_keeps_state() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join(FILE_NAME), b"not json at all").unwrap();

        let preferences = Preferences::new();
        preferences
            .define(item("language", json!("common")))
            .unwrap();
        let result = preferences.load(directory.path());
        assert!(matches!(result, Err(PluginError::ConfigurationFormat(_))));
        assert_eq!(preferences.get("language"), Some(json!("common")));
    }

    #[test]
    fn test_bundle_exports_configuration() {
        let bundle = bundle();
        assert_eq!(bundle.instances.len(), 1);
        assert_eq!(
            bundle.instances[0].kind(),
            luna_plugin_api::Kind::Configuration
        );
        assert_eq!(bundle.instances[0].key(), Some("preferences".to_string()));
        assert!(bundle.instances[0].validate().is_ok());
    }
}
