//! Hot-reloadable configuration holder
//!
//! The store keeps the last good configuration. A reload is attempted only
//! when the file's modification signature changes, and a document that fails
//! to parse or validate leaves the previous configuration in effect.

use crate::config::parser::load_config_with_hash;
use crate::config::types::Config;
use crate::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Cheap change detector for the config file
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileSignature {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileSignature {
    fn read(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Holds the active configuration and reloads it from disk on change
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: Arc<Config>,
    signature: Option<FileSignature>,
    hash: Option<String>,
    generation: u64,
}

impl ConfigStore {
    /// Loads the configuration file at `path`
    ///
    /// Unlike a reload, a failure here has no previous configuration to fall
    /// back on and is returned to the caller.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let signature = FileSignature::read(&path)?;
        let (config, hash) = load_config_with_hash(&path)?;

        Ok(Self {
            path: Some(path),
            current: Arc::new(config),
            signature: Some(signature),
            hash: Some(hash),
            generation: 1,
        })
    }

    /// Wraps an in-memory configuration; reloads are no-ops
    pub fn from_config(config: Config) -> Self {
        Self {
            path: None,
            current: Arc::new(config),
            signature: None,
            hash: None,
            generation: 1,
        }
    }

    /// Returns a snapshot of the active configuration
    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.current)
    }

    /// SHA-256 of the active configuration file, if loaded from disk
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Incremented every time a new configuration is swapped in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reloads the configuration if the file changed since the last load
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new configuration is now active
    /// * `Ok(false)` - Nothing changed (or the store is not file-backed)
    /// * `Err(ConfigError)` - The file changed but could not be loaded; the
    ///   previous configuration stays active
    pub fn reload_if_changed(&mut self) -> Result<bool, ConfigError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };

        let signature = FileSignature::read(&path)?;
        if self.signature.as_ref() == Some(&signature) {
            return Ok(false);
        }

        let (config, hash) = match load_config_with_hash(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(
                    "Config reload from {} failed, keeping previous configuration: {}",
                    path.display(),
                    e
                );
                return Err(e);
            }
        };

        self.signature = Some(signature);
        if self.hash.as_deref() == Some(hash.as_str()) {
            tracing::debug!("Config file {} touched but content unchanged", path.display());
            return Ok(false);
        }

        self.current = Arc::new(config);
        self.hash = Some(hash);
        self.generation += 1;
        tracing::info!(
            "Reloaded configuration from {} (generation {})",
            path.display(),
            self.generation
        );
        Ok(true)
    }
}
