//! Recipe lifecycle use cases.
//!
//! This module provides the `RecipeUseCase`, which composes the session
//! registry, the Persistence Index and the save queue into the operations
//! a recipe editor offers: open, select, close, save, duplicate, delete,
//! export and list.

use crate::export::{self, ExportArtifact, ExportFormat};
use crate::index::PersistenceIndex;
use crate::listing::RecipeQuery;
use crate::sync::{ChangeSyncPipeline, SaveQueue, SyncEvent, SyncWorker};
use recipe_core::config::DEFAULT_COMPRESSION_LEVEL;
use recipe_core::error::{RecipeError, Result};
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use recipe_core::session::SessionRegistry;
use recipe_core::state_paths::{SELECTED_TAB_ID, TABS};
use recipe_core::store::{ActionBuilder, StatePath, StateStore};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Use case for managing recipes across open tabs and the backend.
///
/// All operations dispatch their state changes to the shared
/// [`StateStore`] themselves. Background saves of edited tabs start with
/// [`start_sync`](Self::start_sync).
///
/// # Thread Safety
///
/// Every component is shared through `Arc`/cheap clones; the use case can
/// be wrapped in an `Arc` and called from any task.
pub struct RecipeUseCase {
    store: StateStore,
    registry: SessionRegistry,
    repository: Arc<dyn RecipeRepository>,
    queue: SaveQueue,
    index: PersistenceIndex,
    compression_level: i64,
    worker: Mutex<Option<SyncWorker>>,
}

impl RecipeUseCase {
    /// Creates a new `RecipeUseCase` over `store`, persisting through
    /// `repository`.
    pub fn new(store: StateStore, repository: Arc<dyn RecipeRepository>) -> Self {
        let queue = SaveQueue::new(repository.clone(), store.clone());
        let index = PersistenceIndex::new(store.clone(), repository.clone(), queue.clone());
        Self {
            registry: SessionRegistry::new(store.clone()),
            store,
            repository,
            queue,
            index,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            worker: Mutex::new(None),
        }
    }

    /// Sets the deflate level used by zipped exports.
    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn index(&self) -> &PersistenceIndex {
        &self.index
    }

    pub fn queue(&self) -> &SaveQueue {
        &self.queue
    }

    /// Receives the outcome of every background save.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.queue.subscribe()
    }

    /// Starts watching the open tabs and saving edits of saved recipes.
    ///
    /// Returns `false` if sync was already running.
    pub fn start_sync(&self) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            tracing::warn!("[RecipeUseCase] Sync already running, skipping");
            return false;
        }
        let pipeline = ChangeSyncPipeline::new(self.store.clone(), self.queue.clone());
        *worker = Some(SyncWorker::spawn(pipeline));
        tracing::info!("[RecipeUseCase] Sync started");
        true
    }

    /// Stops the sync worker and waits for it to exit. Saves already
    /// queued still complete.
    pub async fn stop_sync(&self) {
        if let Some(worker) = self.take_worker() {
            worker.shutdown().await;
            tracing::info!("[RecipeUseCase] Sync stopped");
        }
    }

    fn take_worker(&self) -> Option<SyncWorker> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Waits until the sync worker has processed `count` tab observations.
    /// Returns immediately when sync is not running.
    pub async fn wait_for_observations(&self, count: u64) {
        let observed = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(SyncWorker::observed);
        if let Some(mut observed) = observed {
            let _ = observed.wait_for(|seen| *seen >= count).await;
        }
    }

    /// Opens an empty, unsaved tab named `placeholder` and selects it.
    pub fn new_tab(&self, placeholder: &str) -> Result<String> {
        let recipe = Recipe::new(Uuid::new_v4().to_string()).with_placeholder(placeholder);
        let id = recipe.id.clone();
        let tab = serde_json::to_value(&recipe)?;

        self.store.dispatch(
            ActionBuilder::new("NEW_RECIPE")
                .payload(json!({"id": id}))
                .update(TABS, move |tabs| {
                    let mut tabs = tabs.and_then(Value::as_array).cloned().unwrap_or_default();
                    tabs.push(tab);
                    Ok(Value::Array(tabs))
                })
                .set(SELECTED_TAB_ID, json!(id))
                .build(),
        )?;
        tracing::debug!("[RecipeUseCase] Opened new tab {}", id);
        Ok(id)
    }

    /// Makes the open tab `id` the active one.
    pub fn select(&self, id: &str) -> Result<()> {
        self.store.dispatch_with(|root| {
            if SessionRegistry::position_in(root, id).is_none() {
                return Err(RecipeError::not_found("Recipe", id));
            }
            Ok(ActionBuilder::new("SELECT_RECIPE")
                .set(SELECTED_TAB_ID, json!(id))
                .build())
        })
    }

    /// Writes `value` into the open tab `id` at `subpath` (e.g. `"model.dates"`).
    pub fn edit(&self, id: &str, subpath: impl Into<StatePath>, value: Value) -> Result<()> {
        let subpath = subpath.into();
        self.store.dispatch_with(|root| {
            let path = SessionRegistry::path_in(root, id, Some(&subpath))?;
            Ok(ActionBuilder::new("EDIT_RECIPE")
                .payload(json!({"id": id, "path": subpath.to_string()}))
                .set(path, value)
                .build())
        })
    }

    /// Closes the tab `id`. If it was selected, the tab that takes its
    /// place (or else the new last tab) becomes selected.
    pub fn close_tab(&self, id: &str) -> Result<()> {
        self.store.dispatch_with(|root| {
            let mut tabs = SessionRegistry::tabs_in(root);
            let position = tabs
                .iter()
                .position(|tab| tab_id(tab) == Some(id))
                .ok_or_else(|| RecipeError::not_found("Recipe", id))?;
            tabs.remove(position);

            let mut action = ActionBuilder::new("CLOSE_RECIPE").payload(json!({"id": id}));
            if SessionRegistry::selected_in(root) == Some(id) {
                let next = tabs
                    .get(position)
                    .or_else(|| tabs.last())
                    .and_then(tab_id)
                    .map_or(Value::Null, |next| json!(next));
                action = action.set(SELECTED_TAB_ID, next);
            }
            Ok(action.set(TABS, Value::Array(tabs)).build())
        })
    }

    /// Opens recipe `id`.
    ///
    /// An already open recipe is only selected, without a backend call.
    /// Otherwise the recipe is fetched and replaces the selected tab (or is
    /// appended when no tab is selected), then selected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the backend has no such recipe.
    pub async fn load(&self, id: &str) -> Result<()> {
        if self.registry.is_open(id) {
            tracing::debug!("[RecipeUseCase] Recipe {} already open, selecting", id);
            return self.select(id);
        }

        let recipe = self
            .repository
            .load(id)
            .await?
            .ok_or_else(|| RecipeError::not_found("Recipe", id))?;
        self.place_in_selected_slot("OPEN_RECIPE", &recipe)?;
        tracing::info!("[RecipeUseCase] Loaded recipe {}", id);
        Ok(())
    }

    /// Saves `recipe`: updates its index entry and queues the backend write.
    ///
    /// Returns `false` without doing anything for a recipe without a type.
    pub fn save(&self, recipe: &Recipe) -> Result<bool> {
        match self.index.upsert(recipe)? {
            Some(action) => {
                self.store.dispatch(action)?;
                tracing::debug!("[RecipeUseCase] Saving recipe {}", recipe.id);
                Ok(true)
            }
            None => {
                tracing::debug!("[RecipeUseCase] Recipe {} has no type, not saving", recipe.id);
                Ok(false)
            }
        }
    }

    /// Copies the persisted recipe `source_id` into the selected tab.
    ///
    /// The copy takes the selected tab's id and the source's display name
    /// with `_copy` appended; it is saved, written into the selected slot,
    /// and selected. The source recipe is not modified.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no tab is selected or the backend has no
    /// recipe `source_id`, and `Validation` if the selected tab is the
    /// source itself.
    pub async fn duplicate(&self, source_id: &str) -> Result<Recipe> {
        let target_id = self
            .registry
            .selected_tab_id()
            .filter(|id| self.registry.is_open(id))
            .ok_or_else(|| RecipeError::not_found("Tab", "selected"))?;
        if target_id == source_id {
            return Err(RecipeError::validation(format!(
                "cannot duplicate recipe '{}' into its own tab",
                source_id
            )));
        }

        let source = self
            .repository
            .load(source_id)
            .await?
            .ok_or_else(|| RecipeError::not_found("Recipe", source_id))?;
        let copy = source.duplicate_as(target_id);

        self.save(&copy)?;
        self.place_in_selected_slot("DUPLICATE_RECIPE", &copy)?;
        tracing::info!(
            "[RecipeUseCase] Duplicated recipe {} as {}",
            source_id,
            copy.id
        );
        Ok(copy)
    }

    /// Deletes recipe `id` from the backend and the index.
    ///
    /// Pending saves of `id` are discarded and an in-flight one is awaited
    /// first. The index entry is removed only once the backend delete has
    /// succeeded. An open tab for `id` stays open.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _hold = self.queue.hold(id);
        self.queue.wait_settled(id).await;

        if let Err(e) = self.repository.delete(id).await {
            tracing::error!("[RecipeUseCase] Failed to delete recipe {}: {}", id, e);
            return Err(e);
        }

        self.store.dispatch(self.index.remove(id)?)?;
        self.queue.forget(id);
        tracing::info!("[RecipeUseCase] Deleted recipe {}", id);
        Ok(())
    }

    /// Exports `recipe` (without `ui`) in `format`.
    pub fn export(&self, recipe: &Recipe, format: ExportFormat) -> Result<ExportArtifact> {
        export::export_recipe(recipe, format, self.compression_level)
    }

    /// Reloads the whole index from the backend.
    pub async fn list_all(&self) -> Result<Vec<RecipeSummary>> {
        let action = self.index.list_all().await?;
        self.store.dispatch(action)?;
        self.index.entries()
    }

    /// The current index, sorted and filtered by `query`.
    pub fn recipes(&self, query: &RecipeQuery) -> Result<Vec<RecipeSummary>> {
        Ok(query.apply(&self.index.entries()?))
    }

    /// Writes `recipe` into its own tab if open, else over the selected
    /// tab, else appends it; then selects it. The slot is resolved at
    /// dispatch time.
    fn place_in_selected_slot(&self, name: &str, recipe: &Recipe) -> Result<()> {
        let tab = serde_json::to_value(recipe)?;
        self.store.dispatch_with(|root| {
            let slot = SessionRegistry::position_in(root, &recipe.id)
                .or_else(|| {
                    SessionRegistry::selected_in(root)
                        .and_then(|selected| SessionRegistry::position_in(root, selected))
                })
                .unwrap_or_else(|| SessionRegistry::tabs_in(root).len());

            Ok(ActionBuilder::new(name)
                .payload(json!({"id": recipe.id}))
                .set(StatePath::from(TABS).index(slot), tab)
                .set(SELECTED_TAB_ID, json!(recipe.id))
                .build())
        })
    }
}

impl Drop for RecipeUseCase {
    fn drop(&mut self) {
        // Dropping the worker aborts its task.
        drop(self.take_worker());
    }
}

fn tab_id(tab: &Value) -> Option<&str> {
    tab.get("id").and_then(Value::as_str)
}

#[cfg(test)]
#[path = "recipe_usecase_test.rs"]
mod tests;
