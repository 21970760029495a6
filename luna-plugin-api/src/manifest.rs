//! Plug-in manifest and kind-specific metadata structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Manifest describing a plug-in bundle as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Human-readable plug-in name
    pub name: String,
    /// Plug-in version
    pub version: String,
    /// API version this plug-in was built against
    pub api_version: u32,
    /// Human-readable description
    pub description: String,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: "0.0.1".to_string(),
            api_version: crate::API_VERSION,
            description: String::new(),
        }
    }
}

/// Reasons a plug-in's metadata fails validation
#[derive(Error, Debug)]
pub enum MetadataError {
    /// A MIME type string that isn't `type/subtype`
    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    /// A file extension carrying a leading period
    #[error("Extension must not start with a period: {0}")]
    ExtensionWithPeriod(String),

    /// A name that does not conform to identifier syntax
    #[error("Not a valid identifier: {0}")]
    InvalidIdentifier(String),

    /// A required metadata field was empty
    #[error("Missing required metadata field: {0}")]
    MissingField(&'static str),
}

/// Whether a string conforms to identifier syntax.
///
/// Identifiers are non-empty, start with a letter or underscore, and
/// contain only letters, digits and underscores.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_mime_type(mimetype: &str) -> Result<(), MetadataError> {
    let mut parts = mimetype.splitn(2, '/');
    let main = parts.next().unwrap_or_default();
    let sub = parts.next().unwrap_or_default();
    if main.is_empty() || sub.is_empty() {
        return Err(MetadataError::InvalidMimeType(mimetype.to_string()));
    }
    Ok(())
}

fn check_extensions(extensions: &BTreeSet<String>) -> Result<(), MetadataError> {
    for extension in extensions {
        if extension.starts_with('.') {
            return Err(MetadataError::ExtensionWithPeriod(extension.clone()));
        }
    }
    Ok(())
}

/// Metadata a data plug-in exposes about the type it serialises
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataMetadata {
    /// MIME type of the serialised form, if the type has one
    pub mimetype: Option<String>,
    /// Human-readable name of the data type
    pub name: Option<String>,
    /// File extensions associated with the serialised form, without the
    /// leading period
    #[serde(default)]
    pub extensions: BTreeSet<String>,
}

impl DataMetadata {
    /// Validate the optional fields that are present
    pub fn validate(&self) -> Result<(), MetadataError> {
        if let Some(mimetype) = &self.mimetype {
            check_mime_type(mimetype)?;
        }
        check_extensions(&self.extensions)
    }
}

/// Metadata a MIME plug-in exposes about the media type it reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimeMetadata {
    /// RFC 6838 media type string
    pub mimetype: String,
    /// Human-readable name of the media type
    pub name: String,
    /// File extensions, without the leading period
    #[serde(default)]
    pub extensions: BTreeSet<String>,
}

impl MimeMetadata {
    /// Validate the required and optional fields
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.mimetype.is_empty() {
            return Err(MetadataError::MissingField("mimetype"));
        }
        check_mime_type(&self.mimetype)?;
        if self.name.is_empty() {
            return Err(MetadataError::MissingField("name"));
        }
        check_extensions(&self.extensions)
    }
}
