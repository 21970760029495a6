//! Contract for data plug-ins
//!
//! A data plug-in owns one data type: it can serialise values of that type
//! to bytes, deserialise them back, and recognise both its values and its
//! serialised form.

use crate::error::PluginError;
use crate::manifest::DataMetadata;
use serde_json::Value;

/// Default number of prefix bytes a serialisation probe receives
pub const DEFAULT_MAGIC_LEN: usize = 8;

/// A plug-in that serialises and deserialises one data type.
///
/// Values are passed as opaque [`Value`]s; what shapes a plug-in accepts is
/// its own business, reported through [`is_instance`](DataPlugin::is_instance).
pub trait DataPlugin: Send + Sync {
    /// Metadata describing the data type
    fn metadata(&self) -> DataMetadata;

    /// Serialise a value into a byte sequence.
    ///
    /// [`deserialise`](DataPlugin::deserialise) must turn the result back
    /// into an equal value.
    fn serialise(&self, value: &Value) -> Result<Vec<u8>, PluginError>;

    /// Deserialise a byte sequence produced by
    /// [`serialise`](DataPlugin::serialise)
    fn deserialise(&self, bytes: &[u8]) -> Result<Value, PluginError>;

    /// Whether the value belongs to this plug-in's data type
    fn is_instance(&self, value: &Value) -> bool;

    /// How many prefix bytes [`is_serialised`](DataPlugin::is_serialised)
    /// needs to decide. Implementations must decide from a short prefix,
    /// never a full scan.
    fn magic_len(&self) -> usize {
        DEFAULT_MAGIC_LEN
    }

    /// Whether the prefix looks like this plug-in's serialised form.
    ///
    /// `prefix` holds at most [`magic_len`](DataPlugin::magic_len) bytes;
    /// it may be shorter when the input itself is shorter.
    fn is_serialised(&self, prefix: &[u8]) -> bool;
}
