//! Background persistence of edited recipes.
//!
//! [`ChangeSyncPipeline`] turns tab-sequence observations into save intents,
//! [`SaveQueue`] runs them with at most one backend save in flight per
//! recipe id, and [`SyncWorker`] drives the pipeline from a store
//! subscription.

mod pipeline;
mod queue;

pub use pipeline::{ChangeSyncPipeline, SyncWorker};
pub use queue::{SaveHold, SaveQueue};

use recipe_core::RecipeError;

/// Per-recipe save state as seen by [`SaveQueue::state_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing in flight or queued.
    Idle,
    /// A save is in flight and a newer intent is queued behind it.
    PendingSave,
    /// A save is in flight and nothing is queued behind it.
    Saving,
}

/// Outcome of a background save, broadcast to [`SaveQueue::subscribe`]rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Saved { id: String },
    SaveFailed { id: String, error: RecipeError },
}

impl SyncEvent {
    pub fn recipe_id(&self) -> &str {
        match self {
            SyncEvent::Saved { id } | SyncEvent::SaveFailed { id, .. } => id,
        }
    }
}
