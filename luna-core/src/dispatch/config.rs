//! Configuration dispatch
//!
//! Configurations are addressed by name. Reads and writes are mediated by
//! the boundary; successful writes publish a change event after the new
//! value is applied, and writing the value an item already has is a no-op
//! that notifies nobody.

use super::DispatchError;
use crate::events::{ChangeEvent, ChangeHub};
use crate::gateway;
use crate::logging::LogSink;
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{ConfigurationItem, ConfigurationPlugin, Kind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Routes configuration access to named configuration plug-ins
pub struct ConfigurationApi {
    registry: Arc<Registry>,
    hub: Arc<ChangeHub>,
    sink: Arc<LogSink>,
}

impl ConfigurationApi {
    pub(crate) fn new(registry: Arc<Registry>, hub: Arc<ChangeHub>, sink: Arc<LogSink>) -> Self {
        Self {
            registry,
            hub,
            sink,
        }
    }

    fn plugin(&self, name: &str) -> Result<Arc<PluginDescriptor>, DispatchError> {
        self.registry
            .by_key(Kind::Configuration, name)
            .ok_or_else(|| DispatchError::UnknownKey {
                kind: Kind::Configuration,
                key: name.to_string(),
            })
    }

    fn with_plugin<T>(
        descriptor: &PluginDescriptor,
        call: impl FnOnce(&dyn ConfigurationPlugin) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        match descriptor.instance().as_configuration() {
            Some(plugin) => call(plugin),
            None => Err(DispatchError::NoSuitablePlugin {
                kind: Kind::Configuration,
                subject: descriptor.identity().to_string(),
            }),
        }
    }

    /// Names of all registered configurations, in registration order
    pub fn names(&self) -> Vec<String> {
        self.registry
            .by_kind(Kind::Configuration)
            .iter()
            .filter_map(|descriptor| {
                descriptor
                    .instance()
                    .as_configuration()
                    .map(|plugin| plugin.name().to_string())
            })
            .collect()
    }

    /// The value of one item, or `None` when the identifier does not exist
    pub fn get(&self, name: &str, identifier: &str) -> Result<Option<Value>, DispatchError> {
        let descriptor = self.plugin(name)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "get", || {
                Ok(plugin.get(identifier))
            })?)
        })
    }

    /// All item identifiers of one configuration
    pub fn identifiers(&self, name: &str) -> Result<Vec<String>, DispatchError> {
        let descriptor = self.plugin(name)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "identifiers", || {
                Ok(plugin.identifiers())
            })?)
        })
    }

    /// Change the value of an existing item.
    ///
    /// Publishes a change event for the configuration after the plug-in
    /// has applied the value. Setting the value an item already holds
    /// changes nothing and publishes nothing.
    ///
    /// Compare, apply and publish run under the descriptor's mutation
    /// lock, so concurrent writers see a consistent suppression decision
    /// and events arrive in apply order. Listeners must not synchronously
    /// write back to the same configuration.
    pub fn set(&self, name: &str, identifier: &str, value: Value) -> Result<(), DispatchError> {
        let descriptor = self.plugin(name)?;
        let _guard = descriptor
            .mutation_lock()
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Self::with_plugin(&descriptor, |plugin| {
            let current = gateway::recoverable(descriptor.identity(), "get", || {
                Ok(plugin.get(identifier))
            })?;
            if current.as_ref() == Some(&value) {
                return Ok(());
            }
            gateway::recoverable(descriptor.identity(), "set", || {
                plugin.set(identifier, value.clone())
            })?;
            self.hub.publish(&ChangeEvent {
                entity: name.to_string(),
                attribute: identifier.to_string(),
                value,
            });
            Ok(())
        })
    }

    /// Define a new item. Publishes a change event once the item exists.
    pub fn define(&self, name: &str, item: ConfigurationItem) -> Result<(), DispatchError> {
        let descriptor = self.plugin(name)?;
        let _guard = descriptor
            .mutation_lock()
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Self::with_plugin(&descriptor, |plugin| {
            let identifier = item.identifier().to_string();
            let value = item.value().clone();
            gateway::recoverable(descriptor.identity(), "define", || plugin.define(item))?;
            self.hub.publish(&ChangeEvent {
                entity: name.to_string(),
                attribute: identifier,
                value,
            });
            Ok(())
        })
    }

    /// The user-supplied metadata of one item
    pub fn item_metadata(
        &self,
        name: &str,
        identifier: &str,
    ) -> Result<Option<BTreeMap<String, Value>>, DispatchError> {
        let descriptor = self.plugin(name)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "item_metadata", || {
                Ok(plugin.item_metadata(identifier))
            })?)
        })
    }

    /// Identifiers of items whose metadata satisfies the predicate.
    ///
    /// The mapping the predicate sees is the item's user metadata with the
    /// reserved keys injected by the runtime: `value` (current value),
    /// `key` (the identifier), `type` (the configuration name) and
    /// `data_type` (the JSON type of the value).
    pub fn filter_items<F>(&self, name: &str, predicate: F) -> Result<Vec<String>, DispatchError>
    where
        F: Fn(&BTreeMap<String, Value>) -> bool,
    {
        let descriptor = self.plugin(name)?;
        // Every plug-in call stays inside one boundary scope; the host's
        // predicate runs outside it so a panicking predicate is not
        // misattributed to the plug-in.
        let rows = Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "filter_items", || {
                let mut rows = Vec::new();
                for identifier in plugin.identifiers() {
                    let value = plugin.get(&identifier).unwrap_or(Value::Null);
                    let mut metadata = plugin.item_metadata(&identifier).unwrap_or_default();
                    metadata.insert("key".to_string(), Value::String(identifier.clone()));
                    metadata.insert("type".to_string(), Value::String(name.to_string()));
                    metadata.insert(
                        "data_type".to_string(),
                        Value::String(json_type_name(&value).to_string()),
                    );
                    metadata.insert("value".to_string(), value);
                    rows.push((identifier, metadata));
                }
                Ok(rows)
            })?)
        })?;
        Ok(rows
            .into_iter()
            .filter(|(_, metadata)| predicate(metadata))
            .map(|(identifier, _)| identifier)
            .collect())
    }

    /// Persist every configuration under `base`, one subdirectory per
    /// configuration name.
    ///
    /// A failing configuration is logged and reported; it does not stop
    /// the others from saving.
    pub fn save_all(&self, base: &Path) -> Vec<(String, DispatchError)> {
        self.for_each_configuration(base, "save", |plugin, directory| plugin.save(directory))
    }

    /// Load every configuration from `base`, the layout `save_all` writes.
    ///
    /// A configuration whose directory does not exist is skipped; a
    /// malformed one fails without touching its in-memory state.
    pub fn load_all(&self, base: &Path) -> Vec<(String, DispatchError)> {
        self.for_each_configuration(base, "load", |plugin, directory| {
            if !directory.exists() {
                return Ok(());
            }
            plugin.load(directory)
        })
    }

    fn for_each_configuration(
        &self,
        base: &Path,
        capability: &str,
        call: impl Fn(&dyn ConfigurationPlugin, &Path) -> Result<(), luna_plugin_api::PluginError>,
    ) -> Vec<(String, DispatchError)> {
        let mut failures = Vec::new();
        for descriptor in self.registry.by_kind(Kind::Configuration) {
            let Some(plugin) = descriptor.instance().as_configuration() else {
                continue;
            };
            let name = plugin.name().to_string();
            let directory = base.join(&name);
            let result: Result<(), DispatchError> = (|| {
                if capability == "save" {
                    std::fs::create_dir_all(&directory).map_err(|error| {
                        DispatchError::Capability(gateway::CapabilityError::Failed {
                            plugin: descriptor.identity().to_string(),
                            capability: capability.to_string(),
                            source: error.into(),
                        })
                    })?;
                }
                gateway::recoverable(descriptor.identity(), capability, || {
                    call(plugin, &directory)
                })?;
                Ok(())
            })();
            if let Err(error) = result {
                self.sink.error(format!(
                    "Configuration {name} failed to {capability}: {error}"
                ));
                failures.push((name, error));
            }
        }
        failures
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
