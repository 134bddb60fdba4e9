pub mod config_service;
pub mod dir_recipe_repository;
pub mod http_recipe_repository;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::dir_recipe_repository::DirRecipeRepository;
pub use crate::http_recipe_repository::HttpRecipeRepository;

use recipe_core::config::BackendConfig;
use recipe_core::error::Result;
use recipe_core::recipe::RecipeRepository;
use std::sync::Arc;
use std::time::Duration;

/// Builds the repository selected by `backend`.
pub async fn repository_from_config(backend: &BackendConfig) -> Result<Arc<dyn RecipeRepository>> {
    match backend {
        BackendConfig::Directory { path: Some(path) } => {
            Ok(Arc::new(DirRecipeRepository::new(path).await?))
        }
        BackendConfig::Directory { path: None } => {
            Ok(Arc::new(DirRecipeRepository::default_location().await?))
        }
        BackendConfig::Http {
            base_url,
            api_key,
            timeout_secs,
        } => {
            let repository = HttpRecipeRepository::new(base_url, api_key.clone())?
                .with_timeout(Duration::from_secs(*timeout_secs));
            Ok(Arc::new(repository))
        }
    }
}
