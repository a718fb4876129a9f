//! The configuration tree shared by merge sources and the merge target.
//!
//! A [`ConfigNode`] is either a [`Scalar`] leaf or a [`Container`] of named
//! children. Containers preserve insertion order, so a merged tree lists its
//! keys in the order they were first declared.

use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::NodeError;

/// Insertion-ordered mapping from key to child node. Keys are unique.
pub type Container = IndexMap<String, ConfigNode>;

static NULL: ConfigNode = ConfigNode::Scalar(Scalar::Null);

/// A leaf value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Returns `true` for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as `f64`; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn to_json_at(&self, path: &str) -> Result<Value, NodeError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => {
                let number = serde_json::Number::from_f64(*f).ok_or_else(|| {
                    NodeError::NonFiniteFloat {
                        path: path.to_string(),
                        value: *f,
                    }
                })?;
                Value::Number(number)
            }
            Self::String(s) => Value::String(s.clone()),
        })
    }
}

/// A configuration tree.
///
/// The default node is an empty container, which is also the state of a
/// freshly created merge target.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigNode {
    Scalar(Scalar),
    Container(Container),
}

impl Default for ConfigNode {
    fn default() -> Self {
        Self::container()
    }
}

impl ConfigNode {
    /// An empty container.
    pub fn container() -> Self {
        Self::Container(Container::new())
    }

    /// The null scalar.
    pub const fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Returns `true` only for the null scalar. An empty container is not null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(map) => Some(map),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Self::Container(map) => Some(map),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Container(_) => None,
        }
    }

    /// Look up a direct child by key.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_container()?.get(key)
    }

    /// Look up a direct child by key, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigNode> {
        self.as_container_mut()?.get_mut(key)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar()?.as_str()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar()?.as_i64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar()?.as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar()?.as_bool()
    }

    /// Number of direct children. Scalars have none.
    pub fn len(&self) -> usize {
        self.as_container().map_or(0, IndexMap::len)
    }

    /// Returns `true` if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as a JSON value.
    ///
    /// Non-empty containers whose keys are exactly `"0"`, `"1"`, ... in order
    /// are rendered as arrays, since that is the shape list-mode merges build.
    /// Fails if the tree holds a NaN or infinite float.
    pub fn to_json(&self) -> Result<Value, NodeError> {
        self.to_json_at("")
    }

    /// Deserialize the tree into a typed value via its JSON rendering.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        serde_json::from_value(self.to_json()?).map_err(|e| NodeError::Deserialize(e.to_string()))
    }

    fn to_json_at(&self, path: &str) -> Result<Value, NodeError> {
        match self {
            Self::Scalar(s) => s.to_json_at(path),
            Self::Container(map) if is_sequence(map) => map
                .iter()
                .map(|(key, child)| child.to_json_at(&child_path(path, key)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Self::Container(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    out.insert(key.clone(), child.to_json_at(&child_path(path, key))?);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

fn is_sequence(map: &Container) -> bool {
    !map.is_empty()
        && map
            .keys()
            .enumerate()
            .all(|(i, key)| *key == i.to_string())
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

impl Drop for ConfigNode {
    /// Tears nested containers down with an explicit stack, so dropping a
    /// deep tree does not grow the call stack.
    fn drop(&mut self) {
        let Self::Container(map) = self else {
            return;
        };
        if map.values().all(ConfigNode::is_scalar) {
            return;
        }

        let mut pending = vec![std::mem::take(map)];
        while let Some(mut map) = pending.pop() {
            for (_, mut child) in map.drain(..) {
                if let Self::Container(inner) = &mut child {
                    if !inner.is_empty() {
                        pending.push(std::mem::take(inner));
                    }
                }
            }
        }
    }
}

impl Index<&str> for ConfigNode {
    type Output = ConfigNode;

    /// Missing keys (and indexing into a scalar) yield the null scalar.
    fn index(&self, key: &str) -> &ConfigNode {
        self.get(key).unwrap_or(&NULL)
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl From<Value> for ConfigNode {
    /// Objects keep their key order; arrays become containers keyed by index.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => b.into(),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i.into(),
                None => n.as_f64().map_or_else(Self::null, Self::from),
            },
            Value::String(s) => s.into(),
            Value::Array(items) => Self::Container(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), item.into()))
                    .collect(),
            ),
            Value::Object(map) => {
                Self::Container(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<Scalar> for ConfigNode {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<Container> for ConfigNode {
    fn from(map: Container) -> Self {
        Self::Container(map)
    }
}

impl From<bool> for ConfigNode {
    fn from(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for ConfigNode {
    fn from(i: i64) -> Self {
        Self::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for ConfigNode {
    fn from(i: i32) -> Self {
        Self::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<u32> for ConfigNode {
    fn from(i: u32) -> Self {
        Self::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<f64> for ConfigNode {
    fn from(f: f64) -> Self {
        Self::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for ConfigNode {
    fn from(s: &str) -> Self {
        Self::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for ConfigNode {
    fn from(s: String) -> Self {
        Self::Scalar(Scalar::String(s))
    }
}
