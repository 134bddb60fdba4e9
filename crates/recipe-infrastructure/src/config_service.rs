//! Configuration service implementation.
//!
//! Loads [`SyncConfig`] from `config.toml` (see [`RecipePaths::config_file`]),
//! writing the defaults on first run.

use crate::paths::RecipePaths;
use crate::storage::AtomicTomlFile;
use recipe_core::config::SyncConfig;
use recipe_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Explicit config file; `None` resolves the platform location lazily.
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<SyncConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the platform config file.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service reading `path` instead of the platform location.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the config file this service reads.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(RecipePaths::config_file()?),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A missing file is created with defaults. A file that cannot be parsed
    /// is reported, not overwritten.
    pub fn get_config(&self) -> Result<SyncConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let path = self.config_path()?;
        let loaded = Self::load_or_create(&path)?;

        {
            let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }

    /// Persists `config` and replaces the cached copy.
    pub fn save_config(&self, config: &SyncConfig) -> Result<()> {
        let path = self.config_path()?;
        AtomicTomlFile::new(path).save(config)?;

        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = Some(config.clone());
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    fn load_or_create(path: &Path) -> Result<SyncConfig> {
        let file = AtomicTomlFile::<SyncConfig>::new(path.to_path_buf());
        match file.load()? {
            Some(config) => Ok(config),
            None => {
                let default_config = SyncConfig::default();
                file.save(&default_config)?;
                tracing::info!("[ConfigService] Created default config at {:?}", path);
                Ok(default_config)
            }
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
