//! Session (tab) domain module.
//!
//! Open recipes live as tabs in the state tree under
//! [`state_paths::TABS`](crate::state_paths::TABS). The registry resolves
//! recipe ids to their tab positions.

mod registry;

pub use registry::{RecipeState, SessionRegistry};
