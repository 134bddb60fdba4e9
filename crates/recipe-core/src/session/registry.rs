use crate::error::{RecipeError, Result};
use crate::recipe::Recipe;
use crate::state_paths::{SELECTED_TAB_ID, TABS};
use crate::store::{StatePath, StateStore};
use serde_json::Value;

/// Tracks which recipes are open as tabs and which tab is active.
///
/// The registry owns no state of its own; every answer is read from the
/// store at call time, so positions are always current even after tabs
/// are opened or closed.
#[derive(Clone)]
pub struct SessionRegistry {
    store: StateStore,
}

impl SessionRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn tab_index(&self, recipe_id: &str) -> Option<usize> {
        self.store
            .with(StatePath::root(), |root| Self::position_in(root?, recipe_id))
    }

    /// Position of the tab `recipe_id` in the state tree `root`.
    pub fn position_in(root: &Value, recipe_id: &str) -> Option<usize> {
        StatePath::from(TABS)
            .lookup(root)?
            .as_array()?
            .iter()
            .position(|tab| tab.get("id").and_then(Value::as_str) == Some(recipe_id))
    }

    /// The selected tab id recorded in the state tree `root`.
    pub fn selected_in(root: &Value) -> Option<&str> {
        StatePath::from(SELECTED_TAB_ID).lookup(root)?.as_str()
    }

    /// Open tabs of the state tree `root`, as raw values.
    pub fn tabs_in(root: &Value) -> Vec<Value> {
        StatePath::from(TABS)
            .lookup(root)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true iff a tab with this id is open.
    pub fn is_open(&self, recipe_id: &str) -> bool {
        self.tab_index(recipe_id).is_some()
    }

    /// Resolves the state path of a tab, or of a field inside it.
    ///
    /// The path is only valid until the next change of the tab sequence;
    /// writers resolve it with [`path_in`](Self::path_in) inside
    /// [`StateStore::dispatch_with`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no tab has this id. Callers are expected to
    /// have checked [`is_open`](Self::is_open) first.
    pub fn path_for(&self, recipe_id: &str, subpath: Option<&StatePath>) -> Result<StatePath> {
        self.store.with(StatePath::root(), |root| {
            Self::path_in(root.unwrap_or(&Value::Null), recipe_id, subpath)
        })
    }

    /// [`path_for`](Self::path_for) against the state tree `root`.
    pub fn path_in(root: &Value, recipe_id: &str, subpath: Option<&StatePath>) -> Result<StatePath> {
        let index = Self::position_in(root, recipe_id)
            .ok_or_else(|| RecipeError::not_found("Recipe", recipe_id))?;
        let path = StatePath::from(TABS).index(index);
        Ok(match subpath {
            Some(subpath) => path.join(subpath),
            None => path,
        })
    }

    /// Returns a bound accessor for an open tab, or `None` if it is not open.
    pub fn select(&self, recipe_id: &str) -> Option<RecipeState> {
        self.is_open(recipe_id).then(|| RecipeState {
            registry: self.clone(),
            recipe_id: recipe_id.to_string(),
        })
    }

    /// All open tabs in display order.
    pub fn tabs(&self) -> Result<Vec<Recipe>> {
        Ok(self.store.select_as(TABS)?.unwrap_or_default())
    }

    /// The open tab with this id, if any.
    pub fn tab(&self, recipe_id: &str) -> Result<Option<Recipe>> {
        match self.tab_index(recipe_id) {
            Some(index) => self.store.select_as(StatePath::from(TABS).index(index)),
            None => Ok(None),
        }
    }

    pub fn selected_tab_id(&self) -> Option<String> {
        self.store.with(SELECTED_TAB_ID, |id| {
            id.and_then(Value::as_str).map(str::to_string)
        })
    }
}

/// Accessor bound to one open recipe.
///
/// The tab position is re-resolved on every read; once the tab is closed
/// all reads return `None`.
#[derive(Clone)]
pub struct RecipeState {
    registry: SessionRegistry,
    recipe_id: String,
}

impl RecipeState {
    pub fn recipe_id(&self) -> &str {
        &self.recipe_id
    }

    /// Reads a field of the recipe, e.g. `"model.dates.year"`.
    pub fn get(&self, subpath: impl Into<StatePath>) -> Option<Value> {
        let subpath = subpath.into();
        self.registry.store.with(StatePath::root(), |root| {
            let root = root?;
            let path = SessionRegistry::path_in(root, &self.recipe_id, Some(&subpath)).ok()?;
            path.lookup(root).filter(|v| !v.is_null()).cloned()
        })
    }

    /// Reads the whole recipe.
    pub fn recipe(&self) -> Option<Recipe> {
        self.registry.tab(&self.recipe_id).ok().flatten()
    }
}
