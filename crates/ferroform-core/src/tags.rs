use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Tag keys with this prefix are reserved by AWS and never managed.
pub const SYSTEM_TAG_PREFIX: &str = "aws:";

/// Key/value labels attached to a resource.
///
/// Backed by a `BTreeMap` so iteration (and therefore API request order and
/// serialized state) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Resource tags layered over provider default tags. Resource values win.
    pub fn merge_defaults(&self, defaults: &TagMap) -> TagMap {
        let mut all = defaults.clone();
        for (k, v) in &self.0 {
            all.0.insert(k.clone(), v.clone());
        }
        all
    }

    /// Inverse of [`merge_defaults`](Self::merge_defaults): drop entries
    /// that are exactly the provider default for that key.
    pub fn without_defaults(&self, defaults: &TagMap) -> TagMap {
        TagMap(
            self.0
                .iter()
                .filter(|(k, v)| defaults.get(k) != Some(v.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Remove system tags and anything matched by `ignore`.
    pub fn ignoring(&self, ignore: &IgnoreConfig) -> TagMap {
        TagMap(
            self.0
                .iter()
                .filter(|(k, _)| !ignore.ignores(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Read a tag map out of an attribute value. `null` is the empty map.
    pub fn from_value(name: &str, value: &Value) -> Result<TagMap, CoreError> {
        match value {
            Value::Null => Ok(TagMap::new()),
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(CoreError::TypeMismatch {
                        name: format!("{name}.{k}"),
                        expected: "string".into(),
                        actual: crate::attrs::type_name(other).into(),
                    }),
                })
                .collect::<Result<_, _>>()
                .map(TagMap),
            other => Err(CoreError::TypeMismatch {
                name: name.to_string(),
                expected: "map of string".into(),
                actual: crate::attrs::type_name(other).into(),
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TagMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for TagMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        TagMap(map)
    }
}

impl IntoIterator for TagMap {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Provider-level tag filtering, applied to remote tags before comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

impl IgnoreConfig {
    pub fn ignores(&self, key: &str) -> bool {
        key.starts_with(SYSTEM_TAG_PREFIX)
            || self.keys.iter().any(|k| k == key)
            || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// The calls needed to move a remote tag set to a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Keys absent remotely.
    pub add: TagMap,
    /// Keys present on both sides with a different value.
    pub update: TagMap,
    /// Keys present remotely but not desired.
    pub remove: Vec<String>,
}

impl TagDiff {
    /// Compare `remote` (what the resource has) against `desired`.
    ///
    /// System tags are never scheduled for removal.
    pub fn between(remote: &TagMap, desired: &TagMap) -> TagDiff {
        let mut diff = TagDiff::default();

        for (k, v) in desired.iter() {
            match remote.get(k) {
                None => diff.add.insert(k, v),
                Some(current) if current != v => diff.update.insert(k, v),
                Some(_) => {}
            }
        }

        diff.remove = remote
            .keys()
            .filter(|k| !desired.contains_key(k) && !k.starts_with(SYSTEM_TAG_PREFIX))
            .map(String::from)
            .collect();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Adds and updates combined; both go out in one tag call.
    pub fn upserts(&self) -> TagMap {
        self.update.merge_defaults(&self.add)
    }

    /// The tag set that results from applying this diff to `remote`,
    /// removals first.
    pub fn apply_to(&self, remote: &TagMap) -> TagMap {
        let mut out = remote.clone();
        for k in &self.remove {
            out.remove(k);
        }
        for (k, v) in self.upserts().iter() {
            out.insert(k, v);
        }
        out
    }
}
