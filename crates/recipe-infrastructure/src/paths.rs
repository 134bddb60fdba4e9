//! Unified path management for recipe-sync files.
//!
//! All configuration and locally persisted recipes are resolved through
//! [`RecipePaths`] so every component agrees on the same platform
//! directories (Linux, macOS, Windows).

use recipe_core::RecipeError;
use std::path::PathBuf;

/// Application directory name under the platform config/data roots.
pub const APP_NAME: &str = "recipe-sync";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "RECIPE_SYNC_CONFIG";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for RecipeError {
    fn from(err: PathError) -> Self {
        RecipeError::config(err.to_string())
    }
}

/// Unified path management for recipe-sync.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/recipe-sync/        # Config directory
/// └── config.toml               # Application configuration
///
/// ~/.local/share/recipe-sync/   # Data directory
/// └── recipes/                  # One <id>.json per saved recipe
/// ```
pub struct RecipePaths;

impl RecipePaths {
    /// Returns the recipe-sync configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the recipe-sync data directory.
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    ///
    /// `RECIPE_SYNC_CONFIG`, when set and non-empty, takes precedence over
    /// the platform location.
    pub fn config_file() -> Result<PathBuf, PathError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the default directory for the directory-backed repository.
    pub fn recipes_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("recipes"))
    }
}
