//! Per-recipe serialization of backend saves.

use super::{SaveState, SyncEvent};
use crate::index;
use chrono::Utc;
use recipe_core::RecipeError;
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use recipe_core::state_paths::RECIPES;
use recipe_core::store::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{Notify, broadcast};

const EVENT_CAPACITY: usize = 64;

/// Runs save intents against a [`RecipeRepository`].
///
/// For every recipe id at most one `save` is in flight. While one is, a
/// newer intent for the same id is parked as *pending* and replaces any
/// intent parked before it; it runs once the in-flight save completes.
/// Intents equal to what is already in flight, pending or last saved are
/// dropped. Different ids save concurrently.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct SaveQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    repository: Arc<dyn RecipeRepository>,
    store: StateStore,
    state: Mutex<QueueState>,
    events: broadcast::Sender<SyncEvent>,
    settled: Notify,
}

#[derive(Default)]
struct QueueState {
    slots: HashMap<String, Slot>,
    last_saved: HashMap<String, Recipe>,
    held: HashMap<String, usize>,
}

struct Slot {
    in_flight: Recipe,
    pending: Option<Recipe>,
}

impl SaveQueue {
    /// Creates a queue saving through `repository`. Successful saves
    /// refresh the matching entry of the Persistence Index in `store`.
    pub fn new(repository: Arc<dyn RecipeRepository>, store: StateStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(QueueInner {
                repository,
                store,
                state: Mutex::new(QueueState::default()),
                events,
                settled: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Receives a [`SyncEvent`] for every completed save.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn state_of(&self, id: &str) -> SaveState {
        match self.lock().slots.get(id) {
            None => SaveState::Idle,
            Some(Slot { pending: None, .. }) => SaveState::Saving,
            Some(Slot {
                pending: Some(_), ..
            }) => SaveState::PendingSave,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// The recipe most recently saved successfully under `id`.
    pub fn last_saved(&self, id: &str) -> Option<Recipe> {
        self.lock().last_saved.get(id).cloned()
    }

    /// Submits a save intent. The `ui` field is stripped before saving.
    ///
    /// Returns `true` if a backend save was scheduled for this intent.
    pub fn enqueue(&self, recipe: Recipe) -> bool {
        let recipe = recipe.without_ui();
        if !recipe.is_persistable() {
            tracing::debug!("[SaveQueue] Ignoring untyped recipe {}", recipe.id);
            return false;
        }
        let id = recipe.id.clone();

        let mut state = self.lock();
        if state.held.contains_key(&id) {
            tracing::debug!("[SaveQueue] Recipe {} is held, dropping intent", id);
            return false;
        }

        if let Some(slot) = state.slots.get_mut(&id) {
            if slot.in_flight == recipe {
                // The in-flight save already carries the latest content.
                slot.pending = None;
                tracing::debug!("[SaveQueue] Recipe {} already saving, dropping intent", id);
                return false;
            }
            if slot.pending.as_ref() == Some(&recipe) {
                return false;
            }
            if slot.pending.replace(recipe).is_some() {
                tracing::debug!("[SaveQueue] Superseded pending save of recipe {}", id);
            }
            return true;
        }

        if state.last_saved.get(&id) == Some(&recipe) {
            tracing::debug!("[SaveQueue] Recipe {} unchanged since last save", id);
            return false;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                drop(state);
                tracing::error!("[SaveQueue] Cannot save recipe {} outside a runtime: {}", id, e);
                let _ = self.inner.events.send(SyncEvent::SaveFailed {
                    id,
                    error: RecipeError::internal("no async runtime available for save"),
                });
                return false;
            }
        };
        state.slots.insert(
            id.clone(),
            Slot {
                in_flight: recipe,
                pending: None,
            },
        );
        drop(state);

        handle.spawn(self.clone().run(id));
        true
    }

    /// Drops the pending intent for `id`, if any. An in-flight save is not
    /// affected.
    pub fn cancel_pending(&self, id: &str) -> bool {
        self.lock()
            .slots
            .get_mut(id)
            .and_then(|slot| slot.pending.take())
            .is_some()
    }

    /// Cancels the pending intent for `id` and drops every new intent for
    /// it until the returned guard is dropped.
    pub fn hold(&self, id: &str) -> SaveHold {
        {
            let mut state = self.lock();
            *state.held.entry(id.to_string()).or_default() += 1;
            if let Some(slot) = state.slots.get_mut(id) {
                slot.pending = None;
            }
        }
        SaveHold {
            queue: self.clone(),
            id: id.to_string(),
        }
    }

    /// Forgets the last saved snapshot of `id` (after it was deleted).
    pub fn forget(&self, id: &str) {
        self.lock().last_saved.remove(id);
    }

    /// Waits until nothing is in flight or pending for `id`.
    pub async fn wait_settled(&self, id: &str) {
        loop {
            let mut notified = std::pin::pin!(self.inner.settled.notified());
            notified.as_mut().enable();
            if self.state_of(id) == SaveState::Idle {
                return;
            }
            notified.await;
        }
    }

    /// Waits until no save is in flight or pending for any id.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.inner.settled.notified());
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    async fn run(self, id: String) {
        loop {
            let Some(recipe) = self.lock().slots.get(&id).map(|slot| slot.in_flight.clone()) else {
                break;
            };

            tracing::debug!("[SaveQueue] Saving recipe {}", id);
            match self.inner.repository.save(&recipe).await {
                Ok(()) => {
                    self.refresh_index_entry(&recipe);
                    self.lock().last_saved.insert(id.clone(), recipe);
                    tracing::info!("[SaveQueue] Saved recipe {}", id);
                    let _ = self.inner.events.send(SyncEvent::Saved { id: id.clone() });
                }
                Err(error) => {
                    tracing::error!("[SaveQueue] Failed to save recipe {}: {}", id, error);
                    let _ = self.inner.events.send(SyncEvent::SaveFailed {
                        id: id.clone(),
                        error,
                    });
                }
            }

            let finished = {
                let mut state = self.lock();
                let next = state
                    .slots
                    .get_mut(&id)
                    .and_then(|slot| slot.pending.take());
                match next {
                    Some(next) => {
                        if let Some(slot) = state.slots.get_mut(&id) {
                            slot.in_flight = next;
                        }
                        false
                    }
                    None => {
                        state.slots.remove(&id);
                        true
                    }
                }
            };
            self.inner.settled.notify_waiters();
            if finished {
                break;
            }
        }
    }

    /// Refreshes name, type and update time of an existing index entry.
    /// A recipe removed from the index meanwhile is not re-added.
    fn refresh_index_entry(&self, recipe: &Recipe) {
        let Some(summary) = RecipeSummary::of(recipe, Some(Utc::now())) else {
            return;
        };
        let result = self.inner.store.update("RECIPE_SAVED", RECIPES, |entries| {
            index::with_entry_refreshed(entries?, &summary)
        });
        if let Err(e) = result {
            tracing::warn!(
                "[SaveQueue] Failed to refresh index entry of {}: {}",
                recipe.id,
                e
            );
        }
    }
}

/// Guard returned by [`SaveQueue::hold`].
pub struct SaveHold {
    queue: SaveQueue,
    id: String,
}

impl Drop for SaveHold {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        if let Some(count) = state.held.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                state.held.remove(&self.id);
            }
        }
    }
}
