//! Discovery and loading of plug-in candidates
//!
//! The loader is the first enforcement point of the trust boundary:
//! everything a candidate does at load time is untrusted, and any failure
//! there is inherently non-fatal to the host. A malformed candidate is
//! recorded and skipped; it never stops the scan.

use crate::logging::LogSink;
use crate::registry::{PluginDescriptor, Registry};
use luna_plugin_api::{MetadataError, PluginBundle, API_VERSION};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a candidate failed to load
#[derive(Error, Debug)]
pub enum LoadError {
    /// No library file found in the candidate directory
    #[error("Plug-in library not found in {}", .dir.display())]
    LibraryNotFound { dir: PathBuf },

    /// The dynamic library could not be loaded
    #[error("Failed to load plug-in library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// The plug-in was built against a different API version
    #[error("API version mismatch: host expects {expected}, plug-in has {found}")]
    ApiVersionMismatch { expected: u32, found: u32 },

    /// The plug-in's constructor panicked
    #[error("Plug-in constructor panicked")]
    ConstructorPanicked,

    /// The plug-in panicked while reporting its metadata
    #[error("Plug-in panicked while reporting metadata")]
    MetadataPanicked,

    /// The identity is empty or contains a period
    #[error("Invalid plug-in identity: {0:?}")]
    InvalidIdentity(String),

    /// Kind-specific metadata failed validation
    #[error("Invalid plug-in metadata: {0}")]
    Metadata(#[from] MetadataError),

    /// The bundle declares no capability sets at all
    #[error("Plug-in bundle contains no instances")]
    EmptyBundle,

    /// Filesystem error while scanning
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One candidate that failed, kept so callers can inspect the scan outcome
#[derive(Debug)]
pub struct LoadFailure {
    /// The candidate's identity (directory name)
    pub identity: String,
    /// What went wrong
    pub error: LoadError,
}

/// Outcome of a discovery run
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Identities of candidates whose instances were registered
    pub registered: Vec<String>,
    /// Candidates that were skipped, with the reason
    pub failures: Vec<LoadFailure>,
}

/// A candidate plug-in to load
pub enum PluginSource {
    /// A directory holding a dynamic library named after the directory
    Library(PathBuf),
    /// A statically linked plug-in
    InProcess {
        /// Identity to register the bundle under
        identity: String,
        /// Builds the bundle; a panic here is contained like any other
        /// load failure
        constructor: fn() -> PluginBundle,
    },
}

impl PluginSource {
    fn identity(&self) -> String {
        match self {
            PluginSource::Library(dir) => dir
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string(),
            PluginSource::InProcess { identity, .. } => identity.clone(),
        }
    }
}

/// Scans plug-in locations and loads candidates into a registry
#[derive(Default)]
pub struct Loader {
    locations: Vec<PathBuf>,
}

impl Loader {
    /// Create a loader with no locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory whose subdirectories are plug-in candidates
    pub fn add_location(&mut self, location: impl Into<PathBuf>) -> &mut Self {
        self.locations.push(location.into());
        self
    }

    /// Enumerate candidate sources under the configured locations.
    ///
    /// A candidate is an immediate subdirectory of a location; locations
    /// that do not exist are skipped.
    pub fn discover(&self) -> std::io::Result<Vec<PluginSource>> {
        let mut sources = Vec::new();
        for location in &self.locations {
            if !location.exists() {
                tracing::debug!(dir = %location.display(), "Plug-in location does not exist");
                continue;
            }
            for entry in std::fs::read_dir(location)? {
                let path = entry?.path();
                if path.is_dir() {
                    sources.push(PluginSource::Library(path));
                }
            }
        }
        Ok(sources)
    }

    /// Load every source, registering valid candidates.
    ///
    /// Failures are logged and collected; they never abort the run.
    /// Registry key conflicts are demoted to warnings: the first
    /// registrant wins and the scan continues.
    pub fn run(
        &self,
        sources: Vec<PluginSource>,
        registry: &Registry,
        sink: &LogSink,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for source in sources {
            let identity = source.identity();
            match load_source(source) {
                Ok(loaded) => {
                    register_bundle(loaded, registry, sink, &mut report);
                }
                Err(error) => {
                    sink.warning(format!("Failed to load plug-in {identity}: {error}"));
                    report.failures.push(LoadFailure { identity, error });
                }
            }
        }

        report
    }
}

struct LoadedCandidate {
    identity: String,
    descriptors: Vec<PluginDescriptor>,
}

fn load_source(source: PluginSource) -> Result<LoadedCandidate, LoadError> {
    match source {
        PluginSource::Library(dir) => load_library_candidate(&dir),
        PluginSource::InProcess {
            identity,
            constructor,
        } => {
            validate_identity(&identity)?;
            let bundle =
                catch_unwind(constructor).map_err(|_| LoadError::ConstructorPanicked)?;
            let descriptors = build_descriptors(&identity, bundle, None)?;
            Ok(LoadedCandidate {
                identity,
                descriptors,
            })
        }
    }
}

fn load_library_candidate(dir: &Path) -> Result<LoadedCandidate, LoadError> {
    let identity = dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    validate_identity(&identity)?;

    let library_path = find_library(dir, &identity)?;

    // SAFETY: loading a candidate the deployment placed in a plug-in
    // location. The library is expected to follow the luna-plugin-api
    // contract; everything it does at load time is contained below.
    let library = unsafe { libloading::Library::new(&library_path)? };

    // SAFETY: C entry points generated by export_plugin!.
    let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
        unsafe { library.get(b"_luna_plugin_api_version")? };
    let found = api_version_fn();
    if found != API_VERSION {
        return Err(LoadError::ApiVersionMismatch {
            expected: API_VERSION,
            found,
        });
    }

    let create_fn: libloading::Symbol<extern "C" fn() -> *mut PluginBundle> =
        unsafe { library.get(b"_luna_plugin_create")? };
    // The entry point catches its constructor's panics and signals them
    // as null; a panic must not cross the C ABI.
    let raw = create_fn();
    if raw.is_null() {
        return Err(LoadError::ConstructorPanicked);
    }
    // SAFETY: a non-null pointer from _luna_plugin_create is a leaked
    // bundle this side reclaims exactly once.
    let bundle = unsafe { Box::from_raw(raw) };

    let descriptors =
        build_descriptors(&identity, *bundle, Some((Arc::new(library), library_path)))?;
    Ok(LoadedCandidate {
        identity,
        descriptors,
    })
}

/// Validate the bundle and snapshot each instance into a descriptor.
///
/// Everything in here calls into plug-in metadata code, so the whole
/// block runs under `catch_unwind`: a candidate whose metadata panics is
/// excluded like any other malformed candidate, without ending the scan.
fn build_descriptors(
    identity: &str,
    bundle: PluginBundle,
    library: Option<(Arc<libloading::Library>, PathBuf)>,
) -> Result<Vec<PluginDescriptor>, LoadError> {
    catch_unwind(AssertUnwindSafe(
        move || -> Result<Vec<PluginDescriptor>, LoadError> {
            validate_bundle(&bundle)?;
            let manifest = bundle.manifest;
            Ok(bundle
                .instances
                .into_iter()
                .map(|instance| match &library {
                    Some((lib, path)) => PluginDescriptor::with_library(
                        identity,
                        manifest.clone(),
                        instance,
                        Arc::clone(lib),
                        path.clone(),
                    ),
                    None => PluginDescriptor::new(identity, manifest.clone(), instance),
                })
                .collect())
        },
    ))
    .map_err(|_| LoadError::MetadataPanicked)?
}

fn validate_identity(identity: &str) -> Result<(), LoadError> {
    // Periods are forbidden so identities stay unambiguous as keys.
    if identity.is_empty() || identity.contains('.') {
        return Err(LoadError::InvalidIdentity(identity.to_string()));
    }
    Ok(())
}

fn validate_bundle(bundle: &PluginBundle) -> Result<(), LoadError> {
    if bundle.manifest.api_version != API_VERSION {
        return Err(LoadError::ApiVersionMismatch {
            expected: API_VERSION,
            found: bundle.manifest.api_version,
        });
    }
    if bundle.instances.is_empty() {
        return Err(LoadError::EmptyBundle);
    }
    // One invalid capability set excludes the whole candidate. Partially
    // registering a bundle could hand out a plug-in whose sibling
    // contract is broken.
    for instance in &bundle.instances {
        instance.validate()?;
    }
    Ok(())
}

fn register_bundle(
    loaded: LoadedCandidate,
    registry: &Registry,
    sink: &LogSink,
    report: &mut DiscoveryReport,
) {
    let LoadedCandidate {
        identity,
        descriptors,
    } = loaded;

    let mut registered_any = false;
    for descriptor in descriptors {
        match registry.register(descriptor) {
            Ok(()) => registered_any = true,
            Err(conflict) => {
                sink.warning(format!("Skipping registration for {identity}: {conflict}"));
            }
        }
    }

    if registered_any {
        sink.info(format!("Loaded plug-in {identity}."));
        report.registered.push(identity);
    }
}

/// Find the library file in a candidate directory, trying the platform
/// extensions and the `lib` prefix
fn find_library(dir: &Path, name: &str) -> Result<PathBuf, LoadError> {
    let extensions: &[&str] = if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else if cfg!(target_os = "windows") {
        &["dll"]
    } else {
        &["so"]
    };

    for extension in extensions {
        for file_name in [
            format!("{name}.{extension}"),
            format!("lib{name}.{extension}"),
        ] {
            let path = dir.join(file_name);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(LoadError::LibraryNotFound {
        dir: dir.to_path_buf(),
    })
}
