//! Capability dispatch
//!
//! The dispatch APIs are the host-facing front of the registry: they pick
//! the plug-in for a request (by probe, by key, or by metadata) and route
//! the call through the trust boundary. Host code talks to these APIs, not
//! to plug-in instances directly.

mod config;
mod data;
mod interface;
mod mime;
mod storage;

pub use config::ConfigurationApi;
pub use data::DataApi;
pub use interface::{InterfaceManager, InterfaceState};
pub use mime::MimeApi;
pub use storage::StorageApi;

use crate::gateway::CapabilityError;
use luna_plugin_api::Kind;
use thiserror::Error;

/// A dispatch request could not be served
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No registered plug-in of the kind claimed the request
    #[error("No suitable {kind} plug-in for {subject}")]
    NoSuitablePlugin { kind: Kind, subject: String },

    /// No plug-in of the kind is registered under the key
    #[error("No {kind} plug-in registered under key {key}")]
    UnknownKey { kind: Kind, key: String },

    /// The selected plug-in failed or panicked
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
