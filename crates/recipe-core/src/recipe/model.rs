//! Recipe domain model.
//!
//! A recipe is a saved processing configuration. The same document shape is
//! used for open tabs (possibly unsaved) and for what the backend persists,
//! except that the `ui` field never leaves the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix appended to the display name of a duplicated recipe.
pub const COPY_SUFFIX: &str = "_copy";

/// A recipe document.
///
/// `model` is an opaque, arbitrarily nested payload compared structurally.
/// Fields this crate does not know about are kept in `extra` so that a
/// load/save round trip through the engine does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Stable unique identifier
    pub id: String,
    /// Recipe kind; a recipe without a type is never persisted
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub recipe_type: Option<String>,
    /// User supplied title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Generated name used while no title is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Processing configuration payload
    #[serde(default)]
    pub model: Value,
    /// Client-only presentation state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    /// Creates an untyped, untitled recipe with an empty model.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            recipe_type: None,
            title: None,
            placeholder: None,
            model: Value::Null,
            ui: None,
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, recipe_type: impl Into<String>) -> Self {
        self.recipe_type = Some(recipe_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_model(mut self, model: Value) -> Self {
        self.model = model;
        self
    }

    /// Display name: the title when non-empty, otherwise the placeholder.
    pub fn display_name(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .or(self.placeholder.as_deref())
    }

    /// Whether this recipe may be indexed and saved at all.
    pub fn is_persistable(&self) -> bool {
        self.recipe_type.is_some()
    }

    /// Returns a copy without client-only state, as sent to the backend
    /// and written on export.
    pub fn without_ui(&self) -> Recipe {
        Recipe {
            ui: None,
            ..self.clone()
        }
    }

    /// Builds the duplicate of this recipe that will live under `new_id`.
    pub fn duplicate_as(&self, new_id: impl Into<String>) -> Recipe {
        let name = self.display_name().unwrap_or_default();
        Recipe {
            id: new_id.into(),
            title: Some(format!("{}{}", name, COPY_SUFFIX)),
            ..self.clone()
        }
    }
}

/// A Persistence Index entry: the lightweight listing projection of a
/// persisted recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub recipe_type: String,
    /// Last time the entry was written by a save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl RecipeSummary {
    /// Projects a recipe into an index entry.
    ///
    /// Returns `None` for a recipe without a type.
    pub fn of(recipe: &Recipe, update_time: Option<DateTime<Utc>>) -> Option<Self> {
        let recipe_type = recipe.recipe_type.clone()?;
        Some(Self {
            id: recipe.id.clone(),
            name: recipe.display_name().unwrap_or_default().to_string(),
            recipe_type,
            update_time,
        })
    }
}
