//! Dotted paths into the state tree.

use crate::error::{RecipeError, Result};
use serde_json::{Map, Value};
use std::fmt;

/// One step of a [`StatePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Address of a node in the state tree, e.g. `process.tabs.2.model`.
///
/// Parsed from dotted strings; all-digit segments address array elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatePath(Vec<Segment>);

impl StatePath {
    /// The path of the whole tree.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends an object key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(Segment::Key(key.into()));
        self
    }

    /// Appends an array index.
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    /// Concatenates two paths.
    pub fn join(&self, other: &StatePath) -> StatePath {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        StatePath(segments)
    }

    pub fn starts_with(&self, prefix: &StatePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True when a write to one path can change the value at the other.
    pub fn overlaps(&self, other: &StatePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Reads the node at this path.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |node, segment| match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        })
    }

    /// Writes `value` at this path, creating intermediate objects.
    ///
    /// An index may address an existing element or the slot one past the end
    /// (append); anything further is rejected.
    pub(crate) fn assign(&self, root: &mut Value, value: Value) -> Result<()> {
        assign_at(root, &self.0, value, self)
    }
}

fn assign_at(target: &mut Value, segments: &[Segment], value: Value, path: &StatePath) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    match head {
        Segment::Key(key) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let map = target
                .as_object_mut()
                .ok_or_else(|| RecipeError::internal(format!("cannot write '{}'", path)))?;
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            assign_at(slot, rest, value, path)
        }
        Segment::Index(index) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            let Value::Array(items) = target else {
                return Err(RecipeError::internal(format!(
                    "path '{}' does not address an array",
                    path
                )));
            };
            if *index < items.len() {
                assign_at(&mut items[*index], rest, value, path)
            } else if *index == items.len() {
                let mut slot = Value::Null;
                assign_at(&mut slot, rest, value, path)?;
                items.push(slot);
                Ok(())
            } else {
                Err(RecipeError::internal(format!(
                    "index {} out of bounds in '{}' (len {})",
                    index,
                    path,
                    items.len()
                )))
            }
        }
    }
}

impl From<&str> for StatePath {
    fn from(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<usize>() {
                Ok(index) if part.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(index),
                _ => Segment::Key(part.to_string()),
            })
            .collect();
        StatePath(segments)
    }
}

impl From<String> for StatePath {
    fn from(raw: String) -> Self {
        StatePath::from(raw.as_str())
    }
}

impl From<&StatePath> for StatePath {
    fn from(path: &StatePath) -> Self {
        path.clone()
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Key(key) => f.write_str(key)?,
                Segment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let path = StatePath::from("process.tabs.2.model");
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("process".into()),
                Segment::Key("tabs".into()),
                Segment::Index(2),
                Segment::Key("model".into()),
            ]
        );
        assert_eq!(path.to_string(), "process.tabs.2.model");
        assert!(StatePath::from("").is_root());
    }

    #[test]
    fn test_lookup() {
        let tree = json!({"process": {"tabs": [{"id": "a"}, {"id": "b"}]}});
        assert_eq!(
            StatePath::from("process.tabs.1.id").lookup(&tree),
            Some(&json!("b"))
        );
        assert_eq!(StatePath::from("process.tabs.5").lookup(&tree), None);
        assert_eq!(StatePath::root().lookup(&tree), Some(&tree));
    }

    #[test]
    fn test_assign_creates_parents_and_appends() {
        let mut tree = Value::Null;
        StatePath::from("process.selectedTabId")
            .assign(&mut tree, json!("a"))
            .unwrap();
        StatePath::from("process.tabs.0")
            .assign(&mut tree, json!({"id": "a"}))
            .unwrap();
        StatePath::from("process.tabs.0.model.x")
            .assign(&mut tree, json!(1))
            .unwrap();
        assert_eq!(
            tree,
            json!({"process": {"selectedTabId": "a", "tabs": [{"id": "a", "model": {"x": 1}}]}})
        );

        let err = StatePath::from("process.tabs.3")
            .assign(&mut tree, json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_overlaps() {
        let tabs = StatePath::from("process.tabs");
        assert!(tabs.overlaps(&StatePath::from("process.tabs.0.model")));
        assert!(tabs.overlaps(&StatePath::from("process")));
        assert!(!tabs.overlaps(&StatePath::from("process.selectedTabId")));
    }
}
