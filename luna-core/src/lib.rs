//! luna-core - plug-in discovery, registration and trusted invocation
//!
//! The runtime loads plug-in bundles (dynamic libraries or in-process
//! constructors), validates their metadata, registers them in a per-kind
//! catalogue and fronts every capability call with a trust boundary that
//! contains plug-in failures according to the call site's recovery policy.
//!
//! ```ignore
//! use luna_core::Runtime;
//!
//! let runtime = Runtime::new();
//! let report = runtime.load_plugins()?;
//! for identity in &report.registered {
//!     runtime.sink().info(format!("loaded {identity}"));
//! }
//! let data = runtime.storage().read(&uri)?;
//! ```

pub mod dispatch;
pub mod events;
pub mod gateway;
pub mod loader;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod runtime;

pub use dispatch::{
    ConfigurationApi, DataApi, DispatchError, InterfaceManager, InterfaceState, MimeApi,
    StorageApi,
};
pub use events::{ChangeEvent, ChangeHub, Subscription};
pub use gateway::CapabilityError;
pub use loader::{DiscoveryReport, LoadError, LoadFailure, Loader, PluginSource};
pub use logging::LogSink;
pub use registry::{PluginDescriptor, Registry, RegistryError};
pub use runtime::Runtime;
