//! Instrumented in-memory repository shared by the application tests.

use async_trait::async_trait;
use recipe_core::error::{RecipeError, Result};
use recipe_core::recipe::{Recipe, RecipeRepository, RecipeSummary};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LoadAll,
    Load(String),
    Save(String),
    Delete(String),
}

pub struct MockRecipeRepository {
    recipes: Mutex<HashMap<String, Recipe>>,
    calls: Mutex<Vec<Call>>,
    saved: Mutex<Vec<Recipe>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
    paused: watch::Sender<bool>,
    save_delay: Mutex<Option<Duration>>,
}

impl MockRecipeRepository {
    pub fn new() -> Self {
        Self {
            recipes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight: Mutex::new(HashMap::new()),
            fail_saves: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            paused: watch::channel(false).0,
            save_delay: Mutex::new(None),
        }
    }

    pub fn with_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let repo = Self::new();
        repo.recipes
            .lock()
            .unwrap()
            .extend(recipes.into_iter().map(|r| (r.id.clone(), r)));
        repo
    }

    pub fn stored(&self, id: &str) -> Option<Recipe> {
        self.recipes.lock().unwrap().get(id).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recipes passed to `save`, in call order.
    pub fn saved(&self) -> Vec<Recipe> {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_count(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::Save(id.to_string()))
            .count()
    }

    pub fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Load(_)))
            .count()
    }

    pub fn delete_count(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::Delete(id.to_string()))
            .count()
    }

    /// Highest number of overlapping `save` calls seen for `id`.
    pub fn max_concurrent_saves(&self, id: &str) -> usize {
        self.max_in_flight
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_save_delay(&self, delay: Duration) {
        *self.save_delay.lock().unwrap() = Some(delay);
    }

    /// Makes every `save` wait until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RecipeRepository for MockRecipeRepository {
    async fn load_all(&self) -> Result<Vec<RecipeSummary>> {
        self.record(Call::LoadAll);
        Ok(self
            .recipes
            .lock()
            .unwrap()
            .values()
            .filter_map(|recipe| RecipeSummary::of(recipe, None))
            .collect())
    }

    async fn load(&self, id: &str) -> Result<Option<Recipe>> {
        self.record(Call::Load(id.to_string()));
        Ok(self.stored(id))
    }

    async fn save(&self, recipe: &Recipe) -> Result<()> {
        self.record(Call::Save(recipe.id.clone()));
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(recipe.id.clone()).or_default();
            *count += 1;
            let mut max_in_flight = self.max_in_flight.lock().unwrap();
            let max = max_in_flight.entry(recipe.id.clone()).or_default();
            *max = (*max).max(*count);
        }

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|paused| !paused).await;
        let delay = *self.save_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        *self
            .in_flight
            .lock()
            .unwrap()
            .entry(recipe.id.clone())
            .or_default() -= 1;

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RecipeError::backend("save rejected"));
        }
        self.saved.lock().unwrap().push(recipe.clone());
        self.recipes
            .lock()
            .unwrap()
            .insert(recipe.id.clone(), recipe.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record(Call::Delete(id.to_string()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RecipeError::backend("delete rejected"));
        }
        self.recipes.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Yields to the runtime until `condition` holds, failing after a while.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
