//! Change detection over the open tab sequence.

use super::SaveQueue;
use crate::index;
use recipe_core::recipe::Recipe;
use recipe_core::state_paths::{RECIPES, TABS};
use recipe_core::store::StateStore;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Diffs successive observations of `process.tabs` and turns meaningful
/// model edits into save intents.
///
/// A tab is saved when it is already in the Persistence Index and its
/// `model` was non-null in the previous observation and differs from the
/// current one. Newly opened tabs, never-saved tabs and edits outside
/// `model` do not trigger a save.
pub struct ChangeSyncPipeline {
    store: StateStore,
    queue: SaveQueue,
    /// Models of the previous observation, keyed by recipe id.
    previous: HashMap<String, Value>,
}

impl ChangeSyncPipeline {
    pub fn new(store: StateStore, queue: SaveQueue) -> Self {
        Self {
            store,
            queue,
            previous: HashMap::new(),
        }
    }

    /// Replaces the baseline without enqueuing anything.
    pub fn prime(&mut self, tabs: &Value) {
        self.previous = models_by_id(tabs);
    }

    /// Processes one observation of the tab sequence and returns the ids
    /// for which a save was scheduled.
    ///
    /// A tab without a type is saved with the type of its index entry.
    pub fn observe(&mut self, tabs: &Value) -> Vec<String> {
        let indexed: HashMap<String, Option<String>> = self
            .store
            .with(RECIPES, |entries| entries.map(index::entry_types).unwrap_or_default());
        let current = models_by_id(tabs);
        let mut scheduled = Vec::new();

        for tab in tabs.as_array().into_iter().flatten() {
            let Some(id) = tab.get("id").and_then(Value::as_str) else {
                continue;
            };
            let Some(indexed_type) = indexed.get(id) else {
                continue;
            };
            let model = current.get(id).unwrap_or(&Value::Null);
            let changed = self
                .previous
                .get(id)
                .is_some_and(|previous| !previous.is_null() && previous != model);
            if !changed {
                continue;
            }

            match serde_json::from_value::<Recipe>(tab.clone()) {
                Ok(mut recipe) => {
                    tracing::debug!("[ChangeSyncPipeline] Model of recipe {} changed", id);
                    if recipe.recipe_type.is_none() {
                        recipe.recipe_type = indexed_type.clone();
                    }
                    if self.queue.enqueue(recipe) {
                        scheduled.push(id.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!("[ChangeSyncPipeline] Skipping malformed tab {}: {}", id, e);
                }
            }
        }

        self.previous = current;
        scheduled
    }
}

fn models_by_id(tabs: &Value) -> HashMap<String, Value> {
    tabs.as_array()
        .into_iter()
        .flatten()
        .filter_map(|tab| {
            let id = tab.get("id")?.as_str()?;
            let model = tab.get("model").cloned().unwrap_or(Value::Null);
            Some((id.to_string(), model))
        })
        .collect()
}

/// Background task feeding a [`ChangeSyncPipeline`] from the store.
///
/// Observations are processed one at a time, in dispatch order. The task
/// is aborted when the worker is dropped.
pub struct SyncWorker {
    handle: JoinHandle<()>,
    observed: watch::Receiver<u64>,
}

impl SyncWorker {
    /// Subscribes to `process.tabs` and spawns the observation loop.
    ///
    /// The current tab sequence becomes the initial baseline.
    pub fn spawn(mut pipeline: ChangeSyncPipeline) -> Self {
        let (current, mut subscription) = pipeline.store.subscribe_with_current(TABS);
        pipeline.prime(&current.unwrap_or(Value::Null));

        let (observed_tx, observed) = watch::channel(0u64);
        let handle = tokio::spawn(async move {
            tracing::debug!("[SyncWorker] Watching {}", subscription.path());
            while let Some(tabs) = subscription.recv().await {
                pipeline.observe(&tabs);
                observed_tx.send_modify(|count| *count += 1);
            }
            tracing::debug!("[SyncWorker] Store closed, stopping");
        });

        Self { handle, observed }
    }

    /// Number of tab-sequence observations processed so far.
    pub fn observations(&self) -> u64 {
        *self.observed.borrow()
    }

    /// Waits until at least `count` observations have been processed.
    pub async fn wait_for_observations(&self, count: u64) {
        let _ = self.observed().wait_for(|seen| *seen >= count).await;
    }

    /// A receiver of the running observation count.
    pub fn observed(&self) -> watch::Receiver<u64> {
        self.observed.clone()
    }

    /// Aborts the observation loop and waits for the task to finish.
    ///
    /// Once this returns no further dispatch is observed.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        match (&mut self.handle).await {
            Err(e) if !e.is_cancelled() => {
                tracing::error!("[SyncWorker] Observation loop failed: {}", e);
            }
            _ => {}
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRecipeRepository;
    use recipe_core::store::ActionBuilder;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(indexed: &[&str]) -> (StateStore, Arc<MockRecipeRepository>, ChangeSyncPipeline) {
        let entries: Vec<Value> = indexed
            .iter()
            .map(|id| json!({"id": id, "name": id, "type": "MOSAIC"}))
            .collect();
        let store = StateStore::with_state(json!({"process": {"recipes": entries}}));
        let repo = Arc::new(MockRecipeRepository::new());
        let queue = SaveQueue::new(repo.clone(), store.clone());
        let pipeline = ChangeSyncPipeline::new(store.clone(), queue);
        (store, repo, pipeline)
    }

    fn tab(id: &str, model: Value) -> Value {
        json!({"id": id, "type": "MOSAIC", "title": id, "model": model})
    }

    #[tokio::test]
    async fn test_model_change_of_indexed_tab_is_saved() {
        let (_store, repo, mut pipeline) = setup(&["a"]);

        assert!(pipeline.observe(&json!([tab("a", json!({"x": 1}))])).is_empty());
        assert_eq!(
            pipeline.observe(&json!([tab("a", json!({"x": 2}))])),
            vec!["a".to_string()]
        );
        assert!(pipeline.observe(&json!([tab("a", json!({"x": 2}))])).is_empty());

        pipeline.queue.wait_idle().await;
        assert_eq!(repo.save_count("a"), 1);
    }

    #[tokio::test]
    async fn test_unindexed_and_null_baseline_tabs_are_not_saved() {
        let (_store, repo, mut pipeline) = setup(&["a"]);

        pipeline.observe(&json!([
            {"id": "a", "type": "MOSAIC"},
            tab("b", json!({"x": 1}))
        ]));
        let scheduled = pipeline.observe(&json!([
            tab("a", json!({"x": 1})),
            tab("b", json!({"x": 2}))
        ]));

        assert!(scheduled.is_empty());
        pipeline.queue.wait_idle().await;
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ui_only_change_is_not_saved() {
        let (_store, repo, mut pipeline) = setup(&["a"]);

        pipeline.observe(&json!([tab("a", json!({"x": 1}))]));
        let mut with_ui = tab("a", json!({"x": 1}));
        with_ui["ui"] = json!({"panel": "dates"});
        assert!(pipeline.observe(&json!([with_ui])).is_empty());

        pipeline.queue.wait_idle().await;
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_worker_processes_dispatches_in_order() {
        let (store, repo, pipeline) = setup(&["a"]);
        store
            .dispatch(
                ActionBuilder::new("OPEN")
                    .set(TABS, json!([tab("a", json!({"x": 0}))]))
                    .build(),
            )
            .unwrap();
        let queue = pipeline.queue.clone();
        let worker = SyncWorker::spawn(pipeline);

        for x in 1..=3 {
            store
                .dispatch(
                    ActionBuilder::new("EDIT")
                        .set("process.tabs.0.model.x", json!(x))
                        .build(),
                )
                .unwrap();
            worker.wait_for_observations(x).await;
            queue.wait_idle().await;
        }

        assert_eq!(worker.observations(), 3);
        let xs: Vec<_> = repo.saved().iter().map(|r| r.model["x"].clone()).collect();
        assert_eq!(xs, vec![json!(1), json!(2), json!(3)]);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_observing() {
        let (store, repo, pipeline) = setup(&["a"]);
        store
            .dispatch(
                ActionBuilder::new("OPEN")
                    .set(TABS, json!([tab("a", json!({"x": 0}))]))
                    .build(),
            )
            .unwrap();
        let queue = pipeline.queue.clone();
        let worker = SyncWorker::spawn(pipeline);
        let observed = worker.observed();
        worker.shutdown().await;

        store
            .dispatch(
                ActionBuilder::new("EDIT")
                    .set("process.tabs.0.model.x", json!(1))
                    .build(),
            )
            .unwrap();
        tokio::task::yield_now().await;
        queue.wait_idle().await;

        assert_eq!(*observed.borrow(), 0);
        assert_eq!(repo.save_count("a"), 0);
    }

    #[tokio::test]
    async fn test_untyped_tab_takes_type_from_index() {
        let store = StateStore::with_state(json!({
            "process": {"recipes": [{"id": "a", "type": "T"}]}
        }));
        let repo = Arc::new(MockRecipeRepository::new());
        let queue = SaveQueue::new(repo.clone(), store.clone());
        let mut pipeline = ChangeSyncPipeline::new(store, queue.clone());

        pipeline.observe(&json!([{"id": "a", "model": {"x": 1}}]));
        pipeline.observe(&json!([{"id": "a", "model": {"x": 2}}]));
        queue.wait_idle().await;

        let saved = repo.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].recipe_type.as_deref(), Some("T"));
    }
}
