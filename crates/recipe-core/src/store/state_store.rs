//! Path-addressable application state.

use super::action::{Action, Write};
use super::path::StatePath;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// A JSON state tree with point reads, ordered point subscriptions and
/// atomic multi-path writes.
///
/// Cloning is cheap; all clones share the same tree.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    root: Value,
    subscribers: Vec<Subscriber>,
    dispatched: u64,
}

struct Subscriber {
    path: StatePath,
    sender: mpsc::UnboundedSender<Value>,
}

/// Receiving end of [`StateStore::subscribe`].
///
/// Yields the value at the subscribed path after every dispatch that wrote
/// an overlapping path, in dispatch order. Absent nodes are reported as
/// `Value::Null`.
pub struct StoreSubscription {
    path: StatePath,
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl StoreSubscription {
    pub fn path(&self) -> &StatePath {
        &self.path
    }

    /// Waits for the next change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Returns a change if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `root` as its initial tree.
    pub fn with_state(root: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                root,
                ..StoreInner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the value at `path`.
    pub fn select(&self, path: impl Into<StatePath>) -> Option<Value> {
        let path = path.into();
        let inner = self.lock();
        path.lookup(&inner.root).filter(|v| !v.is_null()).cloned()
    }

    /// Runs `read` against the node at `path` without copying it.
    pub fn with<R>(&self, path: impl Into<StatePath>, read: impl FnOnce(Option<&Value>) -> R) -> R {
        let path = path.into();
        let inner = self.lock();
        read(path.lookup(&inner.root).filter(|v| !v.is_null()))
    }

    /// Reads and deserializes the value at `path`.
    pub fn select_as<T: DeserializeOwned>(&self, path: impl Into<StatePath>) -> Result<Option<T>> {
        match self.select(path) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns a copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.lock().root.clone()
    }

    /// Number of actions committed so far.
    pub fn dispatched(&self) -> u64 {
        self.lock().dispatched
    }

    /// Subscribes to changes of the node at `path`.
    pub fn subscribe(&self, path: impl Into<StatePath>) -> StoreSubscription {
        self.subscribe_with_current(path).1
    }

    /// Subscribes to `path` and returns its current value in the same
    /// critical section, so no dispatch falls between the two.
    pub fn subscribe_with_current(
        &self,
        path: impl Into<StatePath>,
    ) -> (Option<Value>, StoreSubscription) {
        let path = path.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let current = path.lookup(&inner.root).filter(|v| !v.is_null()).cloned();
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        (current, StoreSubscription { path, receiver })
    }

    /// Applies all writes of `action` atomically, notifies subscribers, then
    /// runs the action's side effect.
    ///
    /// If any write fails the tree is left untouched and the side effect
    /// does not run.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.dispatch_with(|_| Ok(action))
    }

    /// Builds an action from the current tree and commits it in the same
    /// critical section, so no other dispatch can land between the read and
    /// the write.
    ///
    /// `build` runs under the store lock and must not touch the store. An
    /// error from `build` is returned without committing anything.
    pub fn dispatch_with(&self, build: impl FnOnce(&Value) -> Result<Action>) -> Result<()> {
        let mut inner = self.lock();
        let action = build(&inner.root)?;
        let (name, writes, side_effect) = action.into_parts();
        let count = writes.len();
        inner.commit(writes)?;
        drop(inner);
        tracing::trace!("[StateStore] Dispatched {} ({} writes)", name, count);

        if let Some(effect) = side_effect {
            effect();
        }
        Ok(())
    }

    /// Replaces the node at `path` with `update(current)` as one atomic
    /// read-modify-write. Returns `false` without committing when `update`
    /// yields `None`.
    pub fn update(
        &self,
        name: &str,
        path: impl Into<StatePath>,
        update: impl FnOnce(Option<&Value>) -> Option<Value>,
    ) -> Result<bool> {
        let path = path.into();
        let mut inner = self.lock();
        let Some(next) = update(path.lookup(&inner.root).filter(|v| !v.is_null())) else {
            return Ok(false);
        };
        inner.commit(vec![(path, Write::Set(next))])?;
        drop(inner);
        tracing::trace!("[StateStore] Updated {}", name);
        Ok(true)
    }
}

impl StoreInner {
    fn commit(&mut self, writes: Vec<(StatePath, Write)>) -> Result<()> {
        let mut next = self.root.clone();
        let mut written = Vec::with_capacity(writes.len());
        for (path, write) in writes {
            let value = match write {
                Write::Set(value) => value,
                Write::Update(update) => update(path.lookup(&next).filter(|v| !v.is_null()))?,
            };
            path.assign(&mut next, value)?;
            written.push(path);
        }
        self.root = next;
        self.dispatched += 1;

        let root = &self.root;
        self.subscribers.retain(|subscriber| {
            let touched = written.iter().any(|path| path.overlaps(&subscriber.path));
            if !touched {
                return !subscriber.sender.is_closed();
            }
            let current = subscriber.path.lookup(root).cloned().unwrap_or(Value::Null);
            subscriber.sender.send(current).is_ok()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecipeError;
    use crate::store::ActionBuilder;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_select_and_dispatch() {
        let store = StateStore::new();
        assert!(store.select("process.tabs").is_none());

        store
            .dispatch(
                ActionBuilder::new("INIT")
                    .set("process.tabs", json!([{"id": "a"}]))
                    .set("process.selectedTabId", json!("a"))
                    .build(),
            )
            .unwrap();

        assert_eq!(store.select("process.selectedTabId"), Some(json!("a")));
        assert_eq!(store.select("process.tabs.0.id"), Some(json!("a")));
        assert_eq!(store.dispatched(), 1);
    }

    #[test]
    fn test_failed_dispatch_is_atomic() {
        let store = StateStore::with_state(json!({"process": {"tabs": []}}));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let result = store.dispatch(
            ActionBuilder::new("BROKEN")
                .set("process.selectedTabId", json!("a"))
                .set("process.tabs.4", json!({}))
                .side_effect(move || flag.store(true, Ordering::SeqCst))
                .build(),
        );

        assert!(result.is_err());
        assert!(store.select("process.selectedTabId").is_none());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_side_effect_runs_after_commit() {
        let store = StateStore::new();
        let observed = Arc::new(Mutex::new(None));
        let (probe, slot) = (store.clone(), observed.clone());

        store
            .dispatch(
                ActionBuilder::new("SET")
                    .set("process.recipes", json!([]))
                    .side_effect(move || {
                        *slot.lock().unwrap() = probe.select("process.recipes");
                    })
                    .build(),
            )
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_subscription_sees_overlapping_writes_in_order() {
        let store = StateStore::new();
        let mut tabs = store.subscribe("process.tabs");

        store
            .dispatch(
                ActionBuilder::new("OPEN")
                    .set("process.tabs.0", json!({"id": "a"}))
                    .build(),
            )
            .unwrap();
        store
            .dispatch(
                ActionBuilder::new("SELECT")
                    .set("process.selectedTabId", json!("a"))
                    .build(),
            )
            .unwrap();
        store
            .dispatch(
                ActionBuilder::new("EDIT")
                    .set("process.tabs.0.model", json!({"x": 1}))
                    .build(),
            )
            .unwrap();

        assert_eq!(tabs.recv().await, Some(json!([{"id": "a"}])));
        assert_eq!(
            tabs.recv().await,
            Some(json!([{"id": "a", "model": {"x": 1}}]))
        );
        assert!(tabs.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_update_is_read_modify_write() {
        let store = StateStore::with_state(json!({"process": {"recipes": [{"id": "a"}]}}));
        let mut recipes = store.subscribe("process.recipes");

        let changed = store
            .update("APPEND", "process.recipes", |current| {
                let mut list = current?.as_array()?.clone();
                list.push(json!({"id": "b"}));
                Some(Value::Array(list))
            })
            .unwrap();
        let skipped = store.update("NOOP", "process.missing", |_| None).unwrap();

        assert!(changed);
        assert!(!skipped);
        assert_eq!(recipes.recv().await, Some(json!([{"id": "a"}, {"id": "b"}])));
        assert_eq!(store.dispatched(), 1);
    }

    #[test]
    fn test_update_write_sees_earlier_writes_of_same_action() {
        let store = StateStore::with_state(json!({"process": {"tabs": [{"id": "a"}]}}));

        store
            .dispatch(
                ActionBuilder::new("APPEND")
                    .set("process.selectedTabId", json!("b"))
                    .update("process.tabs", |tabs| {
                        let mut tabs = tabs.and_then(Value::as_array).cloned().unwrap_or_default();
                        tabs.push(json!({"id": "b"}));
                        Ok(Value::Array(tabs))
                    })
                    .build(),
            )
            .unwrap();

        assert_eq!(
            store.select("process.tabs"),
            Some(json!([{"id": "a"}, {"id": "b"}]))
        );
    }

    #[test]
    fn test_failed_update_write_commits_nothing() {
        let store = StateStore::with_state(json!({"process": {"tabs": []}}));

        let result = store.dispatch(
            ActionBuilder::new("BROKEN")
                .set("process.selectedTabId", json!("a"))
                .update("process.tabs", |_| Err(RecipeError::validation("rejected")))
                .build(),
        );

        assert!(result.unwrap_err().is_validation());
        assert!(store.select("process.selectedTabId").is_none());
        assert_eq!(store.dispatched(), 0);
    }

    #[test]
    fn test_dispatch_with_reads_current_tree() {
        let store = StateStore::with_state(json!({"process": {"selectedTabId": "a"}}));

        store
            .dispatch_with(|root| {
                let selected = root["process"]["selectedTabId"].clone();
                Ok(ActionBuilder::new("COPY").set("process.previous", selected).build())
            })
            .unwrap();
        let err = store
            .dispatch_with(|_| Err(RecipeError::not_found("Recipe", "x")))
            .unwrap_err();

        assert_eq!(store.select("process.previous"), Some(json!("a")));
        assert!(err.is_not_found());
        assert_eq!(store.dispatched(), 1);
    }

    #[test]
    fn test_concurrent_update_writes_are_not_lost() {
        let store = StateStore::new();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .dispatch(
                                ActionBuilder::new("APPEND")
                                    .update("process.tabs", move |tabs| {
                                        let mut tabs =
                                            tabs.and_then(Value::as_array).cloned().unwrap_or_default();
                                        tabs.push(json!({"id": format!("{}-{}", t, i)}));
                                        Ok(Value::Array(tabs))
                                    })
                                    .build(),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let tabs = store.select("process.tabs").unwrap();
        assert_eq!(tabs.as_array().unwrap().len(), 400);
    }

    #[test]
    fn test_subscribe_with_current() {
        let store = StateStore::with_state(json!({"process": {"tabs": [{"id": "a"}]}}));
        let (current, mut tabs) = store.subscribe_with_current("process.tabs");

        assert_eq!(current, Some(json!([{"id": "a"}])));
        assert!(tabs.try_recv().is_none());
    }
}
