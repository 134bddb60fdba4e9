//! Directory-backed [`RecipeRepository`] implementation.

use crate::paths::RecipePaths;
use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recipe_core::error::{RecipeError, Result};
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use std::path::{Path, PathBuf};
use tokio::fs;

const EXTENSION: &str = "json";

/// Stores every recipe as a pretty-printed JSON file.
///
/// Directory structure:
/// ```text
/// base_dir/
/// ├── recipe-id-1.json
/// └── recipe-id-2.json
/// ```
///
/// The file modification time is reported as the recipe's update time.
pub struct DirRecipeRepository {
    base_dir: PathBuf,
}

impl DirRecipeRepository {
    /// Creates a repository at the default location (`<data_dir>/recipe-sync/recipes`).
    pub async fn default_location() -> Result<Self> {
        let base_dir = RecipePaths::recipes_dir()?;
        Self::new(base_dir).await
    }

    /// Creates a repository rooted at `base_dir`, creating the directory.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_for(&self, id: &str) -> Result<AtomicJsonFile<Recipe>> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(&['/', '\\'][..])
            && id != "..";
        if !valid {
            return Err(RecipeError::validation(format!(
                "Invalid recipe id for file storage: '{}'",
                id
            )));
        }
        Ok(AtomicJsonFile::new(
            self.base_dir.join(format!("{}.{}", id, EXTENSION)),
        ))
    }

    async fn summary_of(path: &Path) -> Result<Option<RecipeSummary>> {
        let Some(recipe) = AtomicJsonFile::<Recipe>::new(path.to_path_buf())
            .load()
            .await?
        else {
            return Ok(None);
        };
        let modified = fs::metadata(path).await?.modified().ok();
        Ok(RecipeSummary::of(
            &recipe,
            modified.map(DateTime::<Utc>::from),
        ))
    }
}

#[async_trait]
impl RecipeRepository for DirRecipeRepository {
    async fn load_all(&self) -> Result<Vec<RecipeSummary>> {
        let mut entries = fs::read_dir(&self.base_dir).await?;
        let mut summaries = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_recipe_file = path.extension().is_some_and(|ext| ext == EXTENSION)
                && !path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if !is_recipe_file {
                continue;
            }

            match Self::summary_of(&path).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("[DirRecipeRepository] Skipping {:?}: {}", path, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.update_time.cmp(&a.update_time));
        tracing::debug!(
            "[DirRecipeRepository] Listed {} recipes in {:?}",
            summaries.len(),
            self.base_dir
        );
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<Option<Recipe>> {
        self.file_for(id)?.load().await
    }

    async fn save(&self, recipe: &Recipe) -> Result<()> {
        let file = self.file_for(&recipe.id)?;
        file.save(&recipe.without_ui()).await?;
        tracing::debug!("[DirRecipeRepository] Saved recipe {}", recipe.id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.file_for(id)?.remove().await? {
            tracing::debug!("[DirRecipeRepository] Deleted recipe {}", id);
            Ok(())
        } else {
            Err(RecipeError::not_found("Recipe", id))
        }
    }
}
