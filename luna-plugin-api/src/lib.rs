//! luna-plugin-api - Plug-in API for the luna conversion host
//!
//! This crate defines the contract between the luna runtime and its
//! plug-ins. A plug-in is a dynamic library (or a statically linked
//! module) that exports a [`PluginBundle`]: a manifest plus one or more
//! [`PluginInstance`]s, each implementing the trait of its declared
//! [`Kind`].
//!
//! # Example
//!
//! ```ignore
//! use luna_plugin_api::{export_plugin, PluginBundle, PluginInstance, PluginManifest};
//!
//! fn create() -> PluginBundle {
//!     PluginBundle {
//!         manifest: PluginManifest {
//!             name: "Local storage".to_string(),
//!             ..Default::default()
//!         },
//!         instances: vec![PluginInstance::Storage(Box::new(LocalStorage::new()))],
//!     }
//! }
//!
//! export_plugin!(create);
//! ```

pub mod configuration;
pub mod data;
pub mod error;
pub mod interface;
pub mod log;
pub mod logger;
pub mod manifest;
pub mod mime;
pub mod storage;

pub use configuration::{ConfigurationItem, ConfigurationPlugin, RESERVED_METADATA_KEYS, RESERVED_PREFIX};
pub use data::{DataPlugin, DEFAULT_MAGIC_LEN};
pub use error::PluginError;
pub use interface::UserInterfacePlugin;
pub use log::{CallFrame, LogLevel, LogRecord};
pub use logger::{default_levels, LoggerPlugin};
pub use manifest::{is_identifier, DataMetadata, MetadataError, MimeMetadata, PluginManifest};
pub use mime::MimePlugin;
pub use storage::StoragePlugin;

use serde_json::Value;
use std::collections::BTreeMap;

/// Current plug-in API version. The loader rejects plug-ins built against
/// any other version.
pub const API_VERSION: u32 = 1;

/// The fixed category a plug-in instance declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Serialises and deserialises one data type
    Data,
    /// Stores byte sequences at URIs
    Storage,
    /// Holds a named, persistable configuration
    Configuration,
    /// Records log messages
    Logger,
    /// Runs a user interface on its own thread
    UserInterface,
    /// Registers a media type the application can open
    Mime,
}

impl Kind {
    /// Stable lowercase name, used as the injected `type` metadata value
    pub fn name(self) -> &'static str {
        match self {
            Kind::Data => "data",
            Kind::Storage => "storage",
            Kind::Configuration => "configuration",
            Kind::Logger => "logger",
            Kind::UserInterface => "userinterface",
            Kind::Mime => "mime",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One capability set of a declared kind.
///
/// This is the tagged-variant rendering of the metadata contract: required
/// capabilities are trait methods, so a constructed variant always carries
/// every required entry.
pub enum PluginInstance {
    /// A data plug-in
    Data(Box<dyn DataPlugin>),
    /// A storage plug-in
    Storage(Box<dyn StoragePlugin>),
    /// A configuration plug-in
    Configuration(Box<dyn ConfigurationPlugin>),
    /// A logger plug-in
    Logger(Box<dyn LoggerPlugin>),
    /// A user interface plug-in
    UserInterface(Box<dyn UserInterfacePlugin>),
    /// A MIME plug-in
    Mime(Box<dyn MimePlugin>),
}

impl PluginInstance {
    /// The kind this instance declares
    pub fn kind(&self) -> Kind {
        match self {
            PluginInstance::Data(_) => Kind::Data,
            PluginInstance::Storage(_) => Kind::Storage,
            PluginInstance::Configuration(_) => Kind::Configuration,
            PluginInstance::Logger(_) => Kind::Logger,
            PluginInstance::UserInterface(_) => Kind::UserInterface,
            PluginInstance::Mime(_) => Kind::Mime,
        }
    }

    /// Validate the kind-specific metadata fields.
    ///
    /// A failure here excludes the whole candidate from registration.
    pub fn validate(&self) -> Result<(), MetadataError> {
        match self {
            PluginInstance::Data(plugin) => plugin.metadata().validate(),
            PluginInstance::Mime(plugin) => plugin.metadata().validate(),
            PluginInstance::Configuration(plugin) => {
                if is_identifier(plugin.name()) {
                    Ok(())
                } else {
                    Err(MetadataError::InvalidIdentifier(plugin.name().to_string()))
                }
            }
            PluginInstance::Storage(_)
            | PluginInstance::Logger(_)
            | PluginInstance::UserInterface(_) => Ok(()),
        }
    }

    /// The identifying key of this instance within its kind, if it has one.
    ///
    /// MIME type for data and MIME plug-ins, configuration name for
    /// configuration plug-ins. Storage, logger and interface plug-ins are
    /// keyed by plug-in identity alone.
    pub fn key(&self) -> Option<String> {
        match self {
            PluginInstance::Data(plugin) => plugin.metadata().mimetype,
            PluginInstance::Mime(plugin) => Some(plugin.metadata().mimetype),
            PluginInstance::Configuration(plugin) => Some(plugin.name().to_string()),
            _ => None,
        }
    }

    /// Borrow as a data plug-in, if that is this instance's kind
    pub fn as_data(&self) -> Option<&dyn DataPlugin> {
        match self {
            PluginInstance::Data(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// Borrow as a storage plug-in, if that is this instance's kind
    pub fn as_storage(&self) -> Option<&dyn StoragePlugin> {
        match self {
            PluginInstance::Storage(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// Borrow as a configuration plug-in, if that is this instance's kind
    pub fn as_configuration(&self) -> Option<&dyn ConfigurationPlugin> {
        match self {
            PluginInstance::Configuration(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// Borrow as a logger plug-in, if that is this instance's kind
    pub fn as_logger(&self) -> Option<&dyn LoggerPlugin> {
        match self {
            PluginInstance::Logger(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// Borrow as a user interface plug-in, if that is this instance's kind
    pub fn as_user_interface(&self) -> Option<&dyn UserInterfacePlugin> {
        match self {
            PluginInstance::UserInterface(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// Borrow as a MIME plug-in, if that is this instance's kind
    pub fn as_mime(&self) -> Option<&dyn MimePlugin> {
        match self {
            PluginInstance::Mime(plugin) => Some(plugin.as_ref()),
            _ => None,
        }
    }

    /// The kind-specific metadata as a plain mapping, for registry
    /// queries. Reserved keys (`key`, `type`) are injected by the
    /// registry, never here.
    pub fn query_metadata(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        match self {
            PluginInstance::Data(plugin) => {
                let metadata = plugin.metadata();
                if let Some(mimetype) = metadata.mimetype {
                    map.insert("mimetype".to_string(), Value::String(mimetype));
                }
                if let Some(name) = metadata.name {
                    map.insert("name".to_string(), Value::String(name));
                }
                map.insert(
                    "extensions".to_string(),
                    Value::Array(metadata.extensions.into_iter().map(Value::String).collect()),
                );
            }
            PluginInstance::Mime(plugin) => {
                let metadata = plugin.metadata();
                map.insert("mimetype".to_string(), Value::String(metadata.mimetype));
                map.insert("name".to_string(), Value::String(metadata.name));
                map.insert(
                    "extensions".to_string(),
                    Value::Array(metadata.extensions.into_iter().map(Value::String).collect()),
                );
            }
            PluginInstance::Configuration(plugin) => {
                map.insert(
                    "name".to_string(),
                    Value::String(plugin.name().to_string()),
                );
            }
            PluginInstance::Storage(_)
            | PluginInstance::Logger(_)
            | PluginInstance::UserInterface(_) => {}
        }
        map
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("kind", &self.kind())
            .finish()
    }
}

/// What a plug-in library hands the loader: its manifest and every
/// capability set it implements
pub struct PluginBundle {
    /// Metadata for the bundle as a whole
    pub manifest: PluginManifest,
    /// The capability sets, one per implemented kind
    pub instances: Vec<PluginInstance>,
}

/// Export a plug-in constructor for dynamic loading.
///
/// The argument is a function `fn() -> PluginBundle`. The macro generates
/// the C ABI entry points the luna loader looks up:
///
/// - `_luna_plugin_api_version()`: returns [`API_VERSION`]
/// - `_luna_plugin_create()`: builds the bundle and leaks it to the host;
///   returns null when the constructor panics, since a panic must not
///   unwind across the C ABI
/// - `_luna_plugin_destroy()`: reclaims a bundle created by this library
#[macro_export]
macro_rules! export_plugin {
    ($constructor:path) => {
        #[no_mangle]
        pub extern "C" fn _luna_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[no_mangle]
        pub extern "C" fn _luna_plugin_create() -> *mut $crate::PluginBundle {
            match ::std::panic::catch_unwind($constructor) {
                Ok(bundle) => Box::into_raw(Box::new(bundle)),
                Err(_) => ::std::ptr::null_mut(),
            }
        }

        #[no_mangle]
        pub extern "C" fn _luna_plugin_destroy(ptr: *mut $crate::PluginBundle) {
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    };
}
