//! Named, inspectable store mutations.
//!
//! An [`Action`] carries a synchronous state transition (a list of path
//! writes applied atomically by [`StateStore::dispatch`](super::StateStore::dispatch))
//! and, separately, an optional deferred effect that runs once the writes
//! are committed.

use super::path::StatePath;
use crate::error::Result;
use serde_json::Value;
use std::fmt;

/// Deferred effect run after an action's writes are committed.
pub type SideEffect = Box<dyn FnOnce() + Send + 'static>;

/// Computes a node from its value at commit time (`None` when absent).
pub type Updater = Box<dyn FnOnce(Option<&Value>) -> Result<Value> + Send + 'static>;

/// One write of an [`Action`].
pub enum Write {
    /// Replaces the node.
    Set(Value),
    /// Replaces the node with a value derived from it, evaluated under the
    /// store lock.
    Update(Updater),
}

impl fmt::Debug for Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Write::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Write::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// A mutation record produced by [`ActionBuilder`].
pub struct Action {
    name: String,
    payload: Option<Value>,
    writes: Vec<(StatePath, Write)>,
    side_effect: Option<SideEffect>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn writes(&self) -> &[(StatePath, Write)] {
        &self.writes
    }

    /// Returns the value this action sets at `path`, if it is a plain set.
    pub fn write_for(&self, path: &StatePath) -> Option<&Value> {
        match self.writes.iter().rev().find(|(target, _)| target == path)? {
            (_, Write::Set(value)) => Some(value),
            (_, Write::Update(_)) => None,
        }
    }

    pub fn has_side_effect(&self) -> bool {
        self.side_effect.is_some()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<(StatePath, Write)>, Option<SideEffect>) {
        (self.name, self.writes, self.side_effect)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("writes", &self.writes)
            .field("side_effect", &self.side_effect.is_some())
            .finish()
    }
}

/// Builder for [`Action`].
///
/// ```ignore
/// let action = ActionBuilder::new("SELECT_RECIPE")
///     .set("process.selectedTabId", json!("a"))
///     .build();
/// store.dispatch(action)?;
/// ```
pub struct ActionBuilder {
    action: Action,
}

impl ActionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            action: Action {
                name: name.into(),
                payload: None,
                writes: Vec::new(),
                side_effect: None,
            },
        }
    }

    /// Attaches a descriptive payload (not applied to the store).
    pub fn payload(mut self, payload: Value) -> Self {
        self.action.payload = Some(payload);
        self
    }

    /// Adds a write of `value` at `path`. Writes apply in insertion order.
    pub fn set(mut self, path: impl Into<StatePath>, value: Value) -> Self {
        self.action.writes.push((path.into(), Write::Set(value)));
        self
    }

    /// Adds a write whose value is derived from the node's current value
    /// when the action is committed.
    pub fn update(
        mut self,
        path: impl Into<StatePath>,
        update: impl FnOnce(Option<&Value>) -> Result<Value> + Send + 'static,
    ) -> Self {
        self.action
            .writes
            .push((path.into(), Write::Update(Box::new(update))));
        self
    }

    /// Sets the effect to run after the writes are committed.
    pub fn side_effect(mut self, effect: impl FnOnce() + Send + 'static) -> Self {
        self.action.side_effect = Some(Box::new(effect));
        self
    }

    pub fn build(self) -> Action {
        self.action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_records_writes_in_order() {
        let action = ActionBuilder::new("OPEN_RECIPE")
            .payload(json!({"id": "a"}))
            .set("process.tabs.0", json!({"id": "a"}))
            .set("process.selectedTabId", json!("a"))
            .build();

        assert_eq!(action.name(), "OPEN_RECIPE");
        assert_eq!(action.writes().len(), 2);
        assert_eq!(
            action.write_for(&StatePath::from("process.selectedTabId")),
            Some(&json!("a"))
        );
        assert!(!action.has_side_effect());
        assert!(format!("{:?}", action).contains("OPEN_RECIPE"));
    }

    #[test]
    fn test_update_write_has_no_static_value() {
        let action = ActionBuilder::new("APPEND_TAB")
            .update("process.tabs", |_| Ok(json!([])))
            .build();

        assert!(matches!(action.writes()[0].1, Write::Update(_)));
        assert!(action
            .write_for(&StatePath::from("process.tabs"))
            .is_none());
    }
}
