//! Application layer for recipe-sync.
//!
//! Composes the state store, session registry and a [`RecipeRepository`]
//! into the recipe lifecycle: the persistence index, background change
//! sync, and the open/save/duplicate/delete/export use cases.
//!
//! [`RecipeRepository`]: recipe_core::recipe::RecipeRepository

pub mod export;
pub mod index;
pub mod listing;
pub mod recipe_usecase;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use export::{ExportArtifact, ExportFormat};
pub use index::PersistenceIndex;
pub use listing::{RecipeQuery, SortKey, SortOrder};
pub use recipe_usecase::RecipeUseCase;
pub use sync::{ChangeSyncPipeline, SaveQueue, SaveState, SyncEvent, SyncWorker};
