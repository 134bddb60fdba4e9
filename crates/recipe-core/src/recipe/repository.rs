//! Recipe repository trait.
//!
//! Defines the backend persistence surface the sync engine talks to.

use super::model::{Recipe, RecipeSummary};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract backend for recipe persistence.
///
/// This trait decouples the engine from the specific storage mechanism
/// (a directory of JSON files, a remote HTTP API, an in-memory mock).
///
/// # Implementation Notes
///
/// Implementations receive recipes with the `ui` field already stripped and
/// are never called concurrently for the same recipe id by the sync engine.
/// Every method may fail; failures should be reported as
/// [`RecipeError::Backend`](crate::error::RecipeError::Backend) where no more
/// specific variant applies.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Lists the summaries of all persisted recipes.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<RecipeSummary>)`: The complete listing
    /// - `Err(_)`: Error occurred during listing
    async fn load_all(&self) -> Result<Vec<RecipeSummary>>;

    /// Loads a full recipe by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Recipe))`: Recipe found
    /// - `Ok(None)`: Recipe not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn load(&self, recipe_id: &str) -> Result<Option<Recipe>>;

    /// Creates or replaces a recipe.
    async fn save(&self, recipe: &Recipe) -> Result<()>;

    /// Deletes a recipe.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Recipe deleted
    /// - `Err(_)`: Error occurred during deletion
    async fn delete(&self, recipe_id: &str) -> Result<()>;
}
