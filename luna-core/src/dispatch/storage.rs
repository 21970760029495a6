//! Storage dispatch
//!
//! A request binds to the first registered storage plug-in whose probe
//! claims the URI, and the operation then runs on that plug-in alone. A
//! failure after binding propagates to the caller; the dispatcher does not
//! retry the remaining plug-ins, so a broken back end surfaces instead of
//! being papered over by a slower one.

use super::DispatchError;
use crate::gateway::{self, CapabilityError};
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{Kind, PluginError, StoragePlugin};
use std::sync::Arc;
use url::Url;

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn probe_name(self) -> &'static str {
        match self {
            Access::Read => "can_read",
            Access::Write => "can_write",
        }
    }
}

/// Routes storage operations to the applicable storage plug-in
pub struct StorageApi {
    registry: Arc<Registry>,
}

impl StorageApi {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// First registered plug-in claiming the URI for the given access.
    ///
    /// Probes are run through the boundary: a panicking probe reads as
    /// "not applicable" and selection moves on.
    fn bind(&self, uri: &Url, access: Access) -> Result<Arc<PluginDescriptor>, DispatchError> {
        for descriptor in self.registry.by_kind(Kind::Storage) {
            if let Some(plugin) = descriptor.instance().as_storage() {
                let claimed = gateway::probe(descriptor.identity(), access.probe_name(), || {
                    match access {
                        Access::Read => plugin.can_read(uri),
                        Access::Write => plugin.can_write(uri),
                    }
                });
                if claimed {
                    return Ok(descriptor);
                }
            }
        }
        Err(DispatchError::NoSuitablePlugin {
            kind: Kind::Storage,
            subject: uri.to_string(),
        })
    }

    fn with_plugin<T>(
        descriptor: &PluginDescriptor,
        call: impl FnOnce(&dyn StoragePlugin) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        match descriptor.instance().as_storage() {
            Some(plugin) => call(plugin),
            // Registration guarantees the kind matches; this arm is for the
            // type system.
            None => Err(DispatchError::NoSuitablePlugin {
                kind: Kind::Storage,
                subject: descriptor.identity().to_string(),
            }),
        }
    }

    /// Whether any registered plug-in claims the URI for reading
    pub fn can_read(&self, uri: &Url) -> bool {
        self.bind(uri, Access::Read).is_ok()
    }

    /// Whether any registered plug-in claims the URI for writing
    pub fn can_write(&self, uri: &Url) -> bool {
        self.bind(uri, Access::Write).is_ok()
    }

    /// Read all data stored at the URI
    pub fn read(&self, uri: &Url) -> Result<Vec<u8>, DispatchError> {
        let descriptor = self.bind(uri, Access::Read)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "read", || {
                plugin.read(uri)
            })?)
        })
    }

    /// Write data to the URI, overwriting whatever was there
    pub fn write(&self, uri: &Url, data: &[u8]) -> Result<(), DispatchError> {
        let descriptor = self.bind(uri, Access::Write)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "write", || {
                plugin.write(uri, data)
            })?)
        })
    }

    /// Remove the entity at the URI
    pub fn delete(&self, uri: &Url) -> Result<(), DispatchError> {
        let descriptor = self.bind(uri, Access::Write)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "delete", || {
                plugin.delete(uri)
            })?)
        })
    }

    /// Whether an entity exists at the URI
    pub fn exists(&self, uri: &Url) -> Result<bool, DispatchError> {
        let descriptor = self.bind(uri, Access::Read)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "exists", || {
                plugin.exists(uri)
            })?)
        })
    }

    /// Whether the URI names a directory-like entity
    pub fn is_directory(&self, uri: &Url) -> Result<bool, DispatchError> {
        let descriptor = self.bind(uri, Access::Read)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "is_directory", || {
                plugin.is_directory(uri)
            })?)
        })
    }

    /// The entries below a directory-like URI
    pub fn iterate_directory(&self, uri: &Url) -> Result<Vec<Url>, DispatchError> {
        let descriptor = self.bind(uri, Access::Read)?;
        Self::with_plugin(&descriptor, |plugin| {
            Ok(gateway::fatal(descriptor.identity(), "iterate_directory", || {
                plugin.iterate_directory(uri)
            })?)
        })
    }

    /// Move data from `source` to `destination`, overwriting the
    /// destination.
    ///
    /// When one plug-in claims both URIs its own `move_to` runs; otherwise
    /// (or when the plug-in reports the pair unsupported) the move is
    /// emulated as read, write, then delete of the source.
    pub fn move_to(&self, source: &Url, destination: &Url) -> Result<(), DispatchError> {
        let reader = self.bind(source, Access::Read)?;
        let writer = self.bind(destination, Access::Write)?;

        if Arc::ptr_eq(&reader, &writer) {
            let direct = Self::with_plugin(&reader, |plugin| {
                Ok(gateway::fatal(reader.identity(), "move_to", || {
                    plugin.move_to(source, destination)
                })?)
            });
            match direct {
                Ok(()) => return Ok(()),
                Err(DispatchError::Capability(CapabilityError::Failed {
                    source: PluginError::Unsupported(_),
                    ..
                })) => {}
                Err(error) => return Err(error),
            }
        }

        let data = self.read(source)?;
        self.write(destination, &data)?;
        self.delete(source)
    }
}
