pub mod config;
pub mod recipes;

use anyhow::{Context as _, Result};
use recipe_application::RecipeUseCase;
use recipe_core::config::SyncConfig;
use recipe_core::store::StateStore;
use recipe_infrastructure::{ConfigService, repository_from_config};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Config service for `path`, or for the platform location.
pub fn config_service(path: Option<&Path>) -> ConfigService {
    match path {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    }
}

/// Logs to stderr. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A recipe session over the configured backend.
pub struct Context {
    pub usecase: RecipeUseCase,
}

impl Context {
    pub async fn bootstrap(config: &SyncConfig) -> Result<Self> {
        tracing::debug!("[Cli] Using backend {:?}", config.backend);
        let repository = repository_from_config(&config.backend)
            .await
            .context("Failed to open the recipe backend")?;
        let usecase = RecipeUseCase::new(StateStore::new(), repository)
            .with_compression_level(config.export.compression_level);
        Ok(Self { usecase })
    }
}
