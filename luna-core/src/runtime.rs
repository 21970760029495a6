//! The runtime aggregate
//!
//! One [`Runtime`] owns the registry, the change hub, the log sink and the
//! interface manager. There is no ambient global; an application creates a
//! runtime, loads plug-ins into it, and passes handles to whoever needs
//! them.

use crate::dispatch::{ConfigurationApi, DataApi, InterfaceManager, MimeApi, StorageApi};
use crate::events::ChangeHub;
use crate::loader::{DiscoveryReport, Loader, PluginSource};
use crate::logging::LogSink;
use crate::paths;
use crate::registry::Registry;
use luna_plugin_api::PluginBundle;
use std::path::PathBuf;
use std::sync::Arc;

/// The assembled plug-in runtime
pub struct Runtime {
    registry: Arc<Registry>,
    hub: Arc<ChangeHub>,
    sink: Arc<LogSink>,
    interfaces: InterfaceManager,
    plugin_locations: Vec<PathBuf>,
}

impl Runtime {
    /// Create a runtime that scans the platform plug-in directory
    pub fn new() -> Self {
        Self::with_locations(vec![paths::plugin_dir()])
    }

    /// Create a runtime scanning the given directories instead
    pub fn with_locations(plugin_locations: Vec<PathBuf>) -> Self {
        let registry = Arc::new(Registry::new());
        let hub = Arc::new(ChangeHub::new());
        let sink = Arc::new(LogSink::new(Arc::clone(&registry)));
        let interfaces = InterfaceManager::new(Arc::clone(&registry));
        Self {
            registry,
            hub,
            sink,
            interfaces,
            plugin_locations,
        }
    }

    /// Discover and load plug-ins from the configured locations.
    ///
    /// Safe to call more than once; already-registered keys make later
    /// candidates lose with a warning.
    pub fn load_plugins(&self) -> std::io::Result<DiscoveryReport> {
        let mut loader = Loader::new();
        for location in &self.plugin_locations {
            loader.add_location(location);
        }
        let sources = loader.discover()?;
        Ok(loader.run(sources, &self.registry, &self.sink))
    }

    /// Register a statically linked plug-in bundle.
    ///
    /// Goes through the same validation and containment as a dynamic
    /// candidate; the report says whether it was accepted.
    pub fn register_in_process(
        &self,
        identity: impl Into<String>,
        constructor: fn() -> PluginBundle,
    ) -> DiscoveryReport {
        Loader::new().run(
            vec![PluginSource::InProcess {
                identity: identity.into(),
                constructor,
            }],
            &self.registry,
            &self.sink,
        )
    }

    /// The plug-in registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The change notification hub
    pub fn hub(&self) -> &Arc<ChangeHub> {
        &self.hub
    }

    /// The log sink
    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Storage dispatch over this runtime's registry
    pub fn storage(&self) -> StorageApi {
        StorageApi::new(Arc::clone(&self.registry))
    }

    /// Data type dispatch over this runtime's registry
    pub fn data(&self) -> DataApi {
        DataApi::new(Arc::clone(&self.registry))
    }

    /// Configuration dispatch over this runtime's registry
    pub fn configuration(&self) -> ConfigurationApi {
        ConfigurationApi::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.hub),
            Arc::clone(&self.sink),
        )
    }

    /// MIME dispatch over this runtime's registry
    pub fn mime(&self) -> MimeApi {
        MimeApi::new(Arc::clone(&self.registry))
    }

    /// The user interface lifecycle manager
    pub fn interfaces(&self) -> &InterfaceManager {
        &self.interfaces
    }

    /// Orderly shutdown: stop every running interface, then persist all
    /// configurations to the platform configuration directory.
    pub fn shutdown(&self) {
        for (identity, error) in self.interfaces.stop_all() {
            self.sink
                .error(format!("Interface {identity} failed to stop: {error}"));
        }
        let base = paths::configuration_dir();
        for (name, error) in self.configuration().save_all(&base) {
            self.sink
                .error(format!("Configuration {name} was not persisted: {error}"));
        }
        self.sink.info("Runtime shut down.");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
