//! Local filesystem storage plug-in
//!
//! Claims `file:` URIs and maps them onto the local filesystem. Writes go
//! through a temporary file in the destination directory and are persisted
//! with an atomic rename, so a failed write never leaves a half-written
//! resource at the destination.

use luna_plugin_api::{
    PluginBundle, PluginError, PluginInstance, PluginManifest, StoragePlugin,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// Storage over the local filesystem
#[derive(Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn path_of(uri: &Url) -> Result<PathBuf, PluginError> {
        uri.to_file_path()
            .map_err(|()| PluginError::custom(format!("Not a local file URI: {uri}")))
    }

    fn parent_of(path: &Path) -> Result<&Path, PluginError> {
        path.parent()
            .ok_or_else(|| PluginError::custom(format!("No parent directory: {}", path.display())))
    }
}

impl StoragePlugin for LocalStorage {
    fn can_read(&self, uri: &Url) -> bool {
        // URI-shape judgement only; existence is checked at read time.
        uri.scheme() == "file" && uri.to_file_path().is_ok()
    }

    fn can_write(&self, uri: &Url) -> bool {
        uri.scheme() == "file" && uri.to_file_path().is_ok()
    }

    fn read(&self, uri: &Url) -> Result<Vec<u8>, PluginError> {
        Ok(std::fs::read(Self::path_of(uri)?)?)
    }

    fn write(&self, uri: &Url, data: &[u8]) -> Result<(), PluginError> {
        let path = Self::path_of(uri)?;
        let parent = Self::parent_of(&path)?;
        std::fs::create_dir_all(parent)?;
        // Same-directory temporary so the final rename stays on one
        // filesystem and is atomic.
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(data)?;
        staged.flush()?;
        staged
            .persist(&path)
            .map_err(|error| PluginError::Io(error.error))?;
        Ok(())
    }

    fn delete(&self, uri: &Url) -> Result<(), PluginError> {
        let path = Self::path_of(uri)?;
        if std::fs::metadata(&path)?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn exists(&self, uri: &Url) -> Result<bool, PluginError> {
        Ok(Self::path_of(uri)?.exists())
    }

    fn move_to(&self, source: &Url, destination: &Url) -> Result<(), PluginError> {
        let from = Self::path_of(source)?;
        let to = Self::path_of(destination)?;
        std::fs::create_dir_all(Self::parent_of(&to)?)?;
        match std::fs::rename(&from, &to) {
            Ok(()) => Ok(()),
            // Rename fails across filesystems; fall back to copy+delete.
            Err(_) => {
                std::fs::copy(&from, &to)?;
                std::fs::remove_file(&from)?;
                Ok(())
            }
        }
    }

    fn is_directory(&self, uri: &Url) -> Result<bool, PluginError> {
        Ok(std::fs::metadata(Self::path_of(uri)?)?.is_dir())
    }

    fn iterate_directory(&self, uri: &Url) -> Result<Vec<Url>, PluginError> {
        let path = Self::path_of(uri)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            let entry_uri = Url::from_file_path(&entry_path).map_err(|()| {
                PluginError::custom(format!("Unrepresentable path: {}", entry_path.display()))
            })?;
            entries.push(entry_uri);
        }
        entries.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(entries)
    }
}

/// Build the plug-in bundle this library exports
pub fn bundle() -> PluginBundle {
    PluginBundle {
        manifest: PluginManifest {
            name: "Local storage".to_string(),
            description: "Stores data on the local filesystem under file: URIs".to_string(),
            ..Default::default()
        },
        instances: vec![PluginInstance::Storage(Box::new(LocalStorage::new()))],
    }
}

#[cfg(feature = "export")]
#[cfg(feature = "export")]
luna_plugin_api::export_plugin!(bundle);
