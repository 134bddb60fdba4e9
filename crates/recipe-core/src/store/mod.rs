//! Keyed state store.
//!
//! The store is a JSON tree addressed by dotted paths. Reads are point reads,
//! subscriptions deliver ordered change notifications per path, and all
//! writes go through [`StateStore::dispatch`] as [`Action`]s.

mod action;
mod path;
mod state_store;

pub use action::{Action, ActionBuilder, SideEffect, Updater, Write};
pub use path::{Segment, StatePath};
pub use state_store::{StateStore, StoreSubscription};
