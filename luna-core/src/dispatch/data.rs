//! Data type dispatch
//!
//! Finds the data plug-in owning a value or a serialised byte sequence and
//! routes conversions through it. Recognition is claim-based: every data
//! plug-in is asked in registration order and the first claim wins, which
//! also resolves the (discouraged) case of overlapping claims
//! deterministically.

use super::DispatchError;
use crate::gateway;
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{DataPlugin, Kind};
use serde_json::Value;
use std::sync::Arc;

/// Routes value conversions to the owning data plug-in
pub struct DataApi {
    registry: Arc<Registry>,
}

impl DataApi {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn with_plugin<T>(
        descriptor: &PluginDescriptor,
        call: impl FnOnce(&dyn DataPlugin) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        match descriptor.instance().as_data() {
            Some(plugin) => call(plugin),
            None => Err(DispatchError::NoSuitablePlugin {
                kind: Kind::Data,
                subject: descriptor.identity().to_string(),
            }),
        }
    }

    /// The plug-in whose data type the value belongs to, if any claims it
    pub fn type_of(&self, value: &Value) -> Option<Arc<PluginDescriptor>> {
        self.registry
            .by_kind(Kind::Data)
            .into_iter()
            .find(|descriptor| match descriptor.instance().as_data() {
                Some(plugin) => gateway::probe(descriptor.identity(), "is_instance", || {
                    plugin.is_instance(value)
                }),
                None => false,
            })
    }

    /// The plug-in that recognises the byte sequence as its serialised
    /// form.
    ///
    /// Each plug-in sees at most its declared magic length of the input,
    /// so recognition stays cheap on large payloads.
    pub fn type_of_serialised(&self, bytes: &[u8]) -> Option<Arc<PluginDescriptor>> {
        self.registry
            .by_kind(Kind::Data)
            .into_iter()
            .find(|descriptor| match descriptor.instance().as_data() {
                Some(plugin) => gateway::probe(descriptor.identity(), "is_serialised", || {
                    let magic = plugin.magic_len().min(bytes.len());
                    plugin.is_serialised(&bytes[..magic])
                }),
                None => false,
            })
    }

    /// Serialise a value with the plug-in that claims it
    pub fn serialise(&self, value: &Value) -> Result<Vec<u8>, DispatchError> {
        let descriptor = self
            .type_of(value)
            .ok_or_else(|| DispatchError::NoSuitablePlugin {
                kind: Kind::Data,
                subject: "unclaimed value".to_string(),
            })?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "serialise", || {
                plugin.serialise(value)
            })?)
        })
    }

    /// Serialise a value with the plug-in registered for the MIME type
    pub fn serialise_as(&self, mimetype: &str, value: &Value) -> Result<Vec<u8>, DispatchError> {
        let descriptor = self.by_type(mimetype)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "serialise", || {
                plugin.serialise(value)
            })?)
        })
    }

    /// Deserialise a byte sequence with the plug-in that recognises it
    pub fn deserialise(&self, bytes: &[u8]) -> Result<Value, DispatchError> {
        let descriptor =
            self.type_of_serialised(bytes)
                .ok_or_else(|| DispatchError::NoSuitablePlugin {
                    kind: Kind::Data,
                    subject: "unrecognised byte sequence".to_string(),
                })?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "deserialise", || {
                plugin.deserialise(bytes)
            })?)
        })
    }

    /// Deserialise a byte sequence with the plug-in registered for the
    /// MIME type
    pub fn deserialise_as(&self, mimetype: &str, bytes: &[u8]) -> Result<Value, DispatchError> {
        let descriptor = self.by_type(mimetype)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::recoverable(descriptor.identity(), "deserialise", || {
                plugin.deserialise(bytes)
            })?)
        })
    }

    /// The plug-in registered for a MIME type
    pub fn by_type(&self, mimetype: &str) -> Result<Arc<PluginDescriptor>, DispatchError> {
        self.registry
            .by_key(Kind::Data, mimetype)
            .ok_or_else(|| DispatchError::UnknownKey {
                kind: Kind::Data,
                key: mimetype.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CapabilityError;
    use crate::registry::PluginDescriptor;
    use luna_plugin_api::{DataMetadata, PluginError, PluginInstance, PluginManifest};
    use serde_json::json;

    /// Strings, serialised with a `STR:` magic prefix
    struct StringData;

    impl DataPlugin for StringData {
        fn metadata(&self) -> DataMetadata {
            DataMetadata {
                mimetype: Some("application/x-test-string".to_string()),
                name: Some("String".to_string()),
                extensions: ["str".to_string()].into_iter().collect(),
            }
        }

        fn serialise(&self, value: &Value) -> Result<Vec<u8>, PluginError> {
            let text = value
                .as_str()
                .ok_or_else(|| PluginError::serialisation("not a string"))?;
            let mut bytes = b"STR:".to_vec();
            bytes.extend_from_slice(text.as_bytes());
            Ok(bytes)
        }

        fn deserialise(&self, bytes: &[u8]) -> Result<Value, PluginError> {
            let payload = bytes
                .strip_prefix(b"STR:")
                .ok_or_else(|| PluginError::serialisation("missing magic"))?;
            let text = std::str::from_utf8(payload)
                .map_err(|e| PluginError::serialisation(e.to_string()))?;
            Ok(Value::String(text.to_string()))
        }

        fn is_instance(&self, value: &Value) -> bool {
            value.is_string()
        }

        fn magic_len(&self) -> usize {
            4
        }

        fn is_serialised(&self, prefix: &[u8]) -> bool {
            prefix.starts_with(b"STR:")
        }
    }

    /// Numbers, serialised with an `NUM:` magic prefix
    struct NumberData;

    impl DataPlugin for NumberData {
        fn metadata(&self) -> DataMetadata {
            DataMetadata {
                mimetype: Some("application/x-test-number".to_string()),
                name: Some("Number".to_string()),
                extensions: Default::default(),
            }
        }

        fn serialise(&self, value: &Value) -> Result<Vec<u8>, PluginError> {
            Ok(format!("NUM:{value}").into_bytes())
        }

        fn deserialise(&self, bytes: &[u8]) -> Result<Value, PluginError> {
            let payload = bytes
                .strip_prefix(b"NUM:")
                .ok_or_else(|| PluginError::serialisation("missing magic"))?;
            serde_json::from_slice(payload)
                .map_err(|e| PluginError::serialisation(e.to_string()))
        }

        fn is_instance(&self, value: &Value) -> bool {
            value.is_number()
        }

        fn magic_len(&self) -> usize {
            4
        }

        fn is_serialised(&self, prefix: &[u8]) -> bool {
            prefix.starts_with(b"NUM:")
        }
    }

    fn api() -> DataApi {
        let registry = Arc::new(Registry::new());
        registry
            .register(PluginDescriptor::new(
                "strings",
                PluginManifest::default(),
                PluginInstance::Data(Box::new(StringData)),
            ))
            .unwrap();
        registry
            .register(PluginDescriptor::new(
                "numbers",
                PluginManifest::default(),
                PluginInstance::Data(Box::new(NumberData)),
            ))
            .unwrap();
        DataApi::new(registry)
    }

    #[test]
    fn test_type_of_picks_claiming_plugin() {
        let api = api();
        assert_eq!(api.type_of(&json!("text")).unwrap().identity(), "strings");
        assert_eq!(api.type_of(&json!(5)).unwrap().identity(), "numbers");
        assert!(api.type_of(&json!(true)).is_none());
    }

    #[test]
    fn test_roundtrip_law() {
        let api = api();
        let value = json!("round trip me");
        let bytes = api.serialise(&value).unwrap();
        assert_eq!(api.deserialise(&bytes).unwrap(), value);
    }

    #[test]
    fn test_type_of_serialised_uses_magic_prefix() {
        let api = api();
        let bytes = api.serialise(&json!(99)).unwrap();
        assert_eq!(api.type_of_serialised(&bytes).unwrap().identity(), "numbers");
        assert!(api.type_of_serialised(b"???:opaque").is_none());
        // Shorter than any magic length still works.
        assert!(api.type_of_serialised(b"NU").is_none());
    }

    #[test]
    fn test_explicit_type_selection() {
        let api = api();
        let bytes = api
            .serialise_as("application/x-test-string", &json!("explicit"))
            .unwrap();
        let value = api
            .deserialise_as("application/x-test-string", &bytes)
            .unwrap();
        assert_eq!(value, json!("explicit"));

        assert!(matches!(
            api.serialise_as("application/x-unknown", &json!("x")),
            Err(DispatchError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_conversion_failure_is_recoverable() {
        let api = api();
        let result = api.serialise_as("application/x-test-string", &json!(42));
        assert!(matches!(
            result,
            Err(DispatchError::Capability(CapabilityError::Failed { .. }))
        ));
    }

    #[test]
    fn test_unclaimed_value_reported() {
        let api = api();
        assert!(matches!(
            api.serialise(&json!(null)),
            Err(DispatchError::NoSuitablePlugin { .. })
        ));
        assert!(matches!(
            api.deserialise(b"unknown"),
            Err(DispatchError::NoSuitablePlugin { .. })
        ));
    }
}
