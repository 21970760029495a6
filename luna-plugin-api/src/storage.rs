//! Contract for storage plug-ins
//!
//! Storage is modelled as "files" with a unique URI. A back end that is not
//! URI-based has to emulate one with a custom scheme.

use crate::error::PluginError;
use url::Url;

/// A plug-in that stores and retrieves byte sequences at URIs.
///
/// The two probes self-select applicability: the runtime keeps no fixed
/// scheme list and asks every registered storage plug-in in registration
/// order. Probes must be pure, fast, URI-only judgements — no I/O.
///
/// `write` must be atomic from the caller's perspective: a failed write may
/// not leave a partially written resource observable through subsequent
/// `read`/`exists` calls on the same URI.
pub trait StoragePlugin: Send + Sync {
    /// Whether this plug-in can read from the URI. Must not perform I/O.
    fn can_read(&self, uri: &Url) -> bool;

    /// Whether this plug-in can write to the URI. Must not perform I/O.
    fn can_write(&self, uri: &Url) -> bool;

    /// Read all data stored at the URI
    fn read(&self, uri: &Url) -> Result<Vec<u8>, PluginError>;

    /// Write data to the URI, overwriting whatever was there
    fn write(&self, uri: &Url, data: &[u8]) -> Result<(), PluginError>;

    /// Remove the entity at the URI
    fn delete(&self, uri: &Url) -> Result<(), PluginError>;

    /// Whether an entity exists at the URI
    fn exists(&self, uri: &Url) -> Result<bool, PluginError>;

    /// Move data from one URI to another, overwriting the destination
    fn move_to(&self, source: &Url, destination: &Url) -> Result<(), PluginError>;

    /// Whether the URI names a directory-like entity
    fn is_directory(&self, _uri: &Url) -> Result<bool, PluginError> {
        Err(PluginError::Unsupported("is_directory"))
    }

    /// The entries below a directory-like URI
    fn iterate_directory(&self, _uri: &Url) -> Result<Vec<Url>, PluginError> {
        Err(PluginError::Unsupported("iterate_directory"))
    }
}
