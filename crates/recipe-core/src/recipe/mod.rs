//! Recipe domain module.
//!
//! # Module Structure
//!
//! - `model`: `Recipe` documents and `RecipeSummary` index entries
//! - `repository`: Repository trait for recipe persistence

mod model;
mod repository;

pub use model::{COPY_SUFFIX, Recipe, RecipeSummary};
pub use repository::RecipeRepository;
