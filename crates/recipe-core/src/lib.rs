//! Core domain of the recipe sync engine.
//!
//! This crate holds the recipe model, the backend repository seam, the keyed
//! state store that open recipe tabs live in, and the session registry that
//! answers "which recipes are open, and where".

pub mod config;
pub mod error;
pub mod recipe;
pub mod session;
pub mod store;

// Re-export common error type
pub use error::RecipeError;

/// Well-known locations in the state tree.
pub mod state_paths {
    /// Ordered array of open recipe tabs.
    pub const TABS: &str = "process.tabs";
    /// Id of the active tab.
    pub const SELECTED_TAB_ID: &str = "process.selectedTabId";
    /// The Persistence Index.
    pub const RECIPES: &str = "process.recipes";
}
