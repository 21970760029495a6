//! Contract for MIME plug-ins
//!
//! MIME plug-ins register media types the application can open and read
//! them into values.

use crate::error::PluginError;
use crate::manifest::MimeMetadata;
use serde_json::Value;
use std::io::Read;
use url::Url;

/// A plug-in that recognises and reads one media type
pub trait MimePlugin: Send + Sync {
    /// The media type this plug-in registers
    fn metadata(&self) -> MimeMetadata;

    /// Whether the resource looks like this media type.
    ///
    /// `prefix` holds the first bytes of the resource; implementations
    /// should decide from magic numbers in the prefix rather than reading
    /// the stream in full.
    fn can_read(&self, uri: &Url, prefix: &[u8]) -> bool;

    /// Read the resource into a value
    fn read(&self, stream: &mut dyn Read) -> Result<Value, PluginError>;
}
