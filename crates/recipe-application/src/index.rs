//! The Persistence Index: summaries of every persisted recipe, kept at
//! `process.recipes`.

use crate::sync::SaveQueue;
use chrono::Utc;
use recipe_core::error::Result;
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use recipe_core::state_paths::RECIPES;
use recipe_core::store::{Action, ActionBuilder, StateStore};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builds the actions that keep `process.recipes` in step with the backend.
///
/// Operations return [`Action`]s rather than dispatching them, so the
/// caller decides when they are committed.
#[derive(Clone)]
pub struct PersistenceIndex {
    store: StateStore,
    repository: Arc<dyn RecipeRepository>,
    queue: SaveQueue,
}

impl PersistenceIndex {
    pub fn new(store: StateStore, repository: Arc<dyn RecipeRepository>, queue: SaveQueue) -> Self {
        Self {
            store,
            repository,
            queue,
        }
    }

    /// Loads all summaries from the backend and returns an action replacing
    /// the whole index with them.
    pub async fn list_all(&self) -> Result<Action> {
        let summaries = self.repository.load_all().await?;
        tracing::debug!("[PersistenceIndex] Loaded {} summaries", summaries.len());
        Ok(ActionBuilder::new("SET_RECIPES")
            .payload(json!({"count": summaries.len()}))
            .set(RECIPES, serde_json::to_value(&summaries)?)
            .build())
    }

    /// Returns an action that inserts or replaces the entry for `recipe`
    /// and, once committed, queues the backend save.
    ///
    /// The entry list is rewritten from its value at commit time, so
    /// concurrent index writes are kept.
    ///
    /// Returns `None` for a recipe without a type.
    pub fn upsert(&self, recipe: &Recipe) -> Result<Option<Action>> {
        let Some(summary) = RecipeSummary::of(recipe, Some(Utc::now())) else {
            return Ok(None);
        };

        let queue = self.queue.clone();
        let intent = recipe.clone();
        Ok(Some(
            ActionBuilder::new("SAVE_RECIPE")
                .payload(json!({"id": recipe.id}))
                .update(RECIPES, move |entries| {
                    Ok(serde_json::to_value(upserted(entries_of(entries)?, summary))?)
                })
                .side_effect(move || {
                    queue.enqueue(intent);
                })
                .build(),
        ))
    }

    /// Returns an action that removes the entry with `id`.
    pub fn remove(&self, id: &str) -> Result<Action> {
        let id = id.to_string();
        Ok(ActionBuilder::new("REMOVE_RECIPE")
            .payload(json!({"id": id}))
            .update(RECIPES, move |entries| {
                Ok(serde_json::to_value(without(entries_of(entries)?, &id))?)
            })
            .build())
    }

    /// Current index entries in stored order.
    pub fn entries(&self) -> Result<Vec<RecipeSummary>> {
        Ok(self.store.select_as(RECIPES)?.unwrap_or_default())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store
            .with(RECIPES, |entries| entries.is_some_and(|e| ids(e).contains(id)))
    }

    pub fn get(&self, id: &str) -> Result<Option<RecipeSummary>> {
        Ok(self.entries()?.into_iter().find(|entry| entry.id == id))
    }
}

fn entries_of(entries: Option<&Value>) -> Result<Vec<RecipeSummary>> {
    match entries {
        Some(entries) => Ok(Vec::<RecipeSummary>::deserialize(entries)?),
        None => Ok(Vec::new()),
    }
}

/// Replaces the entry with the same id, or appends.
pub fn upserted(mut entries: Vec<RecipeSummary>, summary: RecipeSummary) -> Vec<RecipeSummary> {
    match entries.iter_mut().find(|entry| entry.id == summary.id) {
        Some(entry) => *entry = summary,
        None => entries.push(summary),
    }
    entries
}

pub fn without(mut entries: Vec<RecipeSummary>, id: &str) -> Vec<RecipeSummary> {
    entries.retain(|entry| entry.id != id);
    entries
}

/// Ids of a raw `process.recipes` node.
pub(crate) fn ids(entries: &Value) -> HashSet<String> {
    entries
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("id")?.as_str().map(str::to_string))
        .collect()
}

/// Id to type of every entry of a raw `process.recipes` node.
pub(crate) fn entry_types(entries: &Value) -> HashMap<String, Option<String>> {
    entries
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.to_string();
            let recipe_type = entry.get("type").and_then(Value::as_str).map(str::to_string);
            Some((id, recipe_type))
        })
        .collect()
}

/// Raw `process.recipes` node with the entry for `summary.id` replaced, or
/// `None` when there is no such entry.
pub(crate) fn with_entry_refreshed(entries: &Value, summary: &RecipeSummary) -> Option<Value> {
    let mut entries = entries.as_array()?.clone();
    let entry = entries
        .iter_mut()
        .find(|entry| entry.get("id").and_then(Value::as_str) == Some(summary.id.as_str()))?;
    *entry = serde_json::to_value(summary).ok()?;
    Some(Value::Array(entries))
}
