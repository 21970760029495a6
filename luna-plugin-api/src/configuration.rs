//! Contract for configuration plug-ins
//!
//! A configuration plug-in owns a named set of configuration items and
//! persists them to a directory the runtime hands it for its exclusive use.

use crate::error::PluginError;
use crate::manifest::is_identifier;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix reserved for the runtime; user items may not start with it
pub const RESERVED_PREFIX: &str = "_";

/// Metadata keys injected by the runtime; plug-ins may not supply them
pub const RESERVED_METADATA_KEYS: [&str; 4] = ["value", "key", "type", "data_type"];

/// One configuration entry: identifier, opaque value, and free-form
/// metadata.
///
/// Construction validates the identifier and metadata; a descriptor with an
/// invalid item never reaches the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationItem {
    identifier: String,
    value: Value,
    metadata: BTreeMap<String, Value>,
}

impl ConfigurationItem {
    /// Create an item, rejecting reserved identifiers and metadata keys
    pub fn new(
        identifier: impl Into<String>,
        value: Value,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Self, PluginError> {
        let identifier = identifier.into();
        if !is_identifier(&identifier) {
            return Err(PluginError::custom(format!(
                "Configuration identifier is not a valid identifier: {identifier}"
            )));
        }
        if identifier.starts_with(RESERVED_PREFIX) {
            return Err(PluginError::Reserved(identifier));
        }
        for key in RESERVED_METADATA_KEYS {
            if metadata.contains_key(key) {
                return Err(PluginError::Reserved(key.to_string()));
            }
        }
        Ok(Self {
            identifier,
            value,
            metadata,
        })
    }

    /// The item's identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The item's value, opaque to the runtime
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The item's user-supplied metadata
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}

/// A plug-in that holds a named configuration.
///
/// The runtime shares one instance across callers, so implementations use
/// interior mutability for their item store. Mutation happens only through
/// [`set`](ConfigurationPlugin::set) (existing identifiers) and
/// [`define`](ConfigurationPlugin::define) (privileged creation).
pub trait ConfigurationPlugin: Send + Sync {
    /// The configuration's name, in identifier syntax
    fn name(&self) -> &str;

    /// The value of an item, or `None` if no such identifier exists
    fn get(&self, identifier: &str) -> Option<Value>;

    /// All item identifiers, in a stable order
    fn identifiers(&self) -> Vec<String>;

    /// Change the value of an existing item.
    ///
    /// Creating a new identifier through `set` is forbidden; it fails with
    /// [`PluginError::UnknownIdentifier`].
    fn set(&self, identifier: &str, value: Value) -> Result<(), PluginError>;

    /// Define a new item. This is the privileged creation path.
    fn define(&self, item: ConfigurationItem) -> Result<(), PluginError>;

    /// The user-supplied metadata of an item
    fn item_metadata(&self, identifier: &str) -> Option<BTreeMap<String, Value>>;

    /// Load persisted items from the given directory.
    ///
    /// On malformed data this fails with
    /// [`PluginError::ConfigurationFormat`] and must leave the in-memory
    /// state exactly as it was — no partial application.
    fn load(&self, directory: &Path) -> Result<(), PluginError>;

    /// Persist a single consistent snapshot of all items to the directory
    fn save(&self, directory: &Path) -> Result<(), PluginError>;
}
