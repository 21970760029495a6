//! MIME dispatch
//!
//! Resolves media types to the plug-in registered for them, by exact type,
//! by file extension, or by sniffing a resource prefix.

use super::DispatchError;
use crate::gateway;
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{Kind, MimePlugin};
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use url::Url;

/// Routes media type handling to registered MIME plug-ins
pub struct MimeApi {
    registry: Arc<Registry>,
}

impl MimeApi {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The plug-in registered for an exact media type
    pub fn by_type(&self, mimetype: &str) -> Option<Arc<PluginDescriptor>> {
        self.registry.by_key(Kind::Mime, mimetype)
    }

    /// The first registered plug-in declaring the file extension.
    ///
    /// Extensions are declared without a leading period; a leading period
    /// on the query is tolerated.
    pub fn by_extension(&self, extension: &str) -> Option<Arc<PluginDescriptor>> {
        let extension = extension.trim_start_matches('.');
        self.registry
            .by_kind(Kind::Mime)
            .into_iter()
            .find(|descriptor| match descriptor.instance().as_mime() {
                Some(plugin) => plugin.metadata().extensions.contains(extension),
                None => false,
            })
    }

    /// The first registered plug-in whose probe claims the resource.
    ///
    /// `prefix` carries the first bytes of the resource for magic number
    /// checks; a panicking probe reads as "not this type".
    pub fn detect(&self, uri: &Url, prefix: &[u8]) -> Option<Arc<PluginDescriptor>> {
        self.registry
            .by_kind(Kind::Mime)
            .into_iter()
            .find(|descriptor| match descriptor.instance().as_mime() {
                Some(plugin) => gateway::probe(descriptor.identity(), "can_read", || {
                    plugin.can_read(uri, prefix)
                }),
                None => false,
            })
    }

    /// Read a resource with the plug-in registered for the media type
    pub fn read(&self, mimetype: &str, stream: &mut dyn Read) -> Result<Value, DispatchError> {
        let descriptor = self
            .by_type(mimetype)
            .ok_or_else(|| DispatchError::UnknownKey {
                kind: Kind::Mime,
                key: mimetype.to_string(),
            })?;
        match descriptor.instance().as_mime() {
            Some(plugin) => Ok(gateway::recoverable(descriptor.identity(), "read", || {
                plugin.read(stream)
            })?),
            None => Err(DispatchError::NoSuitablePlugin {
                kind: Kind::Mime,
                subject: descriptor.identity().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginDescriptor;
    use luna_plugin_api::{MimeMetadata, PluginError, PluginInstance, PluginManifest};

    struct JsonMime;

    impl MimePlugin for JsonMime {
        fn metadata(&self) -> MimeMetadata {
            MimeMetadata {
                mimetype: "application/json".to_string(),
                name: "JSON document".to_string(),
                extensions: ["json".to_string()].into_iter().collect(),
            }
        }

        fn can_read(&self, _uri: &Url, prefix: &[u8]) -> bool {
            prefix.first().is_some_and(|b| *b == b'{' || *b == b'[')
        }

        fn read(&self, stream: &mut dyn Read) -> Result<Value, PluginError> {
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            serde_json::from_slice(&bytes).map_err(|e| PluginError::serialisation(e.to_string()))
        }
    }

    struct PanickingMime;

    impl MimePlugin for PanickingMime {
        fn metadata(&self) -> MimeMetadata {
            MimeMetadata {
                mimetype: "application/x-panics".to_string(),
                name: "Broken".to_string(),
                extensions: Default::default(),
            }
        }

        fn can_read(&self, _uri: &Url, _prefix: &[u8]) -> bool {
            panic!("probe bug")
        }

        fn read(&self, _stream: &mut dyn Read) -> Result<Value, PluginError> {
            unreachable!()
        }
    }

    fn api() -> MimeApi {
        let registry = Arc::new(Registry::new());
        registry
            .register(PluginDescriptor::new(
                "panicky",
                PluginManifest::default(),
                PluginInstance::Mime(Box::new(PanickingMime)),
            ))
            .unwrap();
        registry
            .register(PluginDescriptor::new(
                "json",
                PluginManifest::default(),
                PluginInstance::Mime(Box::new(JsonMime)),
            ))
            .unwrap();
        MimeApi::new(registry)
    }

    #[test]
    fn test_by_type_and_extension() {
        let api = api();
        assert_eq!(api.by_type("application/json").unwrap().identity(), "json");
        assert!(api.by_type("image/png").is_none());
        assert_eq!(api.by_extension("json").unwrap().identity(), "json");
        assert_eq!(api.by_extension(".json").unwrap().identity(), "json");
        assert!(api.by_extension("png").is_none());
    }

    #[test]
    fn test_detect_skips_panicking_probe() {
        let api = api();
        let uri = Url::parse("file:///data/document.unknown").unwrap();
        let detected = api.detect(&uri, b"{\"a\": 1}").unwrap();
        assert_eq!(detected.identity(), "json");
        assert!(api.detect(&uri, b"BINARY").is_none());
    }

    #[test]
    fn test_read_through_boundary() {
        let api = api();
        let mut stream: &[u8] = b"{\"a\": 1}";
        let value = api.read("application/json", &mut stream).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));

        let mut broken: &[u8] = b"not json";
        assert!(matches!(
            api.read("application/json", &mut broken),
            Err(DispatchError::Capability(_))
        ));
        let mut empty: &[u8] = b"";
        assert!(matches!(
            api.read("image/png", &mut empty),
            Err(DispatchError::UnknownKey { .. })
        ));
    }
}
