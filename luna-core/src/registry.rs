//! Plug-in registry - the catalogue of every loaded plug-in
//!
//! The registry is owned by the runtime. Plug-ins never receive a mutable
//! handle; queries hand out `Arc` clones of descriptors. Mutation only
//! happens during the discovery phase and is serialized by the interior
//! lock, while reads stay concurrent.

use luna_plugin_api::{Kind, PluginInstance, PluginManifest};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

/// Errors that can occur when registering a plug-in
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An identifying key already exists for this kind. The first
    /// registrant wins; callers log the conflict and continue.
    #[error("Duplicate {kind} plug-in key: {key} (first registration wins)")]
    DuplicateKey { kind: Kind, key: String },
}

/// The runtime's record of one validated, loaded plug-in instance.
///
/// Created once at load time and immutable afterwards. Construction
/// snapshots the instance's identifying key and query metadata, so it is
/// the only point where the plug-in's metadata code runs for this
/// descriptor; registration and registry queries read the snapshot. A
/// descriptor from a dynamic library keeps the library alive for as long
/// as the descriptor exists.
pub struct PluginDescriptor {
    identity: String,
    manifest: PluginManifest,
    /// Capability key (MIME type, configuration name) captured at
    /// construction
    key: Option<String>,
    /// Kind-specific metadata mapping captured at construction
    metadata: BTreeMap<String, Value>,
    /// Serializes read-compare-write mutations through this descriptor
    mutation: Mutex<()>,
    // Declared before the library so the instance is dropped while the
    // code backing it is still mapped.
    instance: PluginInstance,
    _library: Option<Arc<libloading::Library>>,
    source: Option<PathBuf>,
}

impl PluginDescriptor {
    /// Create a descriptor for an in-process plug-in instance
    pub fn new(
        identity: impl Into<String>,
        manifest: PluginManifest,
        instance: PluginInstance,
    ) -> Self {
        let key = instance.key();
        let metadata = instance.query_metadata();
        Self {
            identity: identity.into(),
            manifest,
            key,
            metadata,
            mutation: Mutex::new(()),
            instance,
            _library: None,
            source: None,
        }
    }

    /// Create a descriptor backed by a dynamic library
    pub fn with_library(
        identity: impl Into<String>,
        manifest: PluginManifest,
        instance: PluginInstance,
        library: Arc<libloading::Library>,
        source: PathBuf,
    ) -> Self {
        let key = instance.key();
        let metadata = instance.query_metadata();
        Self {
            identity: identity.into(),
            manifest,
            key,
            metadata,
            mutation: Mutex::new(()),
            instance,
            _library: Some(library),
            source: Some(source),
        }
    }

    /// The plug-in's identity (directory or module name)
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The bundle manifest this instance came from
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// The capability set
    pub fn instance(&self) -> &PluginInstance {
        &self.instance
    }

    /// The declared kind
    pub fn kind(&self) -> Kind {
        self.instance.kind()
    }

    /// Where the plug-in was loaded from, for dynamic plug-ins
    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// The kind-specific metadata mapping captured at construction
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Lock serializing mutating capability calls on this descriptor
    pub(crate) fn mutation_lock(&self) -> &Mutex<()> {
        &self.mutation
    }

    /// Every key that identifies this descriptor within its kind: the
    /// plug-in identity plus the capability key (MIME type or
    /// configuration name) when the kind has one.
    fn identifying_keys(&self) -> Vec<String> {
        let mut keys = vec![self.identity.clone()];
        if let Some(key) = &self.key {
            if key != &self.identity {
                keys.push(key.clone());
            }
        }
        keys
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("identity", &self.identity)
            .field("kind", &self.kind())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    /// Descriptors per kind, in registration order
    by_kind: BTreeMap<Kind, Vec<Arc<PluginDescriptor>>>,
    /// Secondary index: identity and capability key (MIME type,
    /// configuration name) to descriptor, per kind
    by_key: HashMap<(Kind, String), Arc<PluginDescriptor>>,
}

/// In-memory catalogue of all registered plug-ins
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails with [`RegistryError::DuplicateKey`] when any identifying key
    /// already exists for the descriptor's kind. The existing registrant
    /// is never overwritten.
    pub fn register(&self, descriptor: PluginDescriptor) -> Result<(), RegistryError> {
        let kind = descriptor.kind();
        let keys = descriptor.identifying_keys();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        for key in &keys {
            if inner.by_key.contains_key(&(kind, key.clone())) {
                return Err(RegistryError::DuplicateKey {
                    kind,
                    key: key.clone(),
                });
            }
        }

        let descriptor = Arc::new(descriptor);
        for key in keys {
            inner.by_key.insert((kind, key), Arc::clone(&descriptor));
        }
        inner.by_kind.entry(kind).or_default().push(descriptor);
        Ok(())
    }

    /// All descriptors of a kind, in registration order
    pub fn by_kind(&self, kind: Kind) -> Vec<Arc<PluginDescriptor>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    /// Look up a descriptor by identifying key (identity, MIME type, or
    /// configuration name)
    pub fn by_key(&self, kind: Kind, key: &str) -> Option<Arc<PluginDescriptor>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_key.get(&(kind, key.to_string())).cloned()
    }

    /// Generic metadata query: descriptors of a kind whose metadata
    /// mapping satisfies the predicate.
    ///
    /// The mapping the predicate receives is the descriptor's metadata
    /// snapshot with the reserved keys `key` (the identity) and `type`
    /// (the kind name) injected by the registry, never by the plug-in.
    /// No plug-in code runs during the query.
    pub fn filter<F>(&self, kind: Kind, predicate: F) -> Vec<Arc<PluginDescriptor>>
    where
        F: Fn(&BTreeMap<String, Value>) -> bool,
    {
        self.by_kind(kind)
            .into_iter()
            .filter(|descriptor| {
                let mut metadata = descriptor.metadata().clone();
                metadata.insert(
                    "key".to_string(),
                    Value::String(descriptor.identity().to_string()),
                );
                metadata.insert("type".to_string(), Value::String(kind.name().to_string()));
                predicate(&metadata)
            })
            .collect()
    }

    /// Total number of registered descriptors
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_kind.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
