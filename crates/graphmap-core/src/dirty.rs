//! Observed property container recording uncommitted changes.
//!
//! A [`DirtyMap`] starts in construction mode: writes populate values
//! without touching the dirty set. Once [`DirtyMap::seal`] is called the map
//! is live and every write records the value the key held before the current
//! change cycle. [`DirtyMap::clear`] ends the cycle after a successful flush.

use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtyMap {
    entries: Vec<(String, Value)>,
    dirty: Vec<(String, Option<Value>)>,
    live: bool,
}

impl DirtyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from initial values; the result is not yet live.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        for (k, v) in entries {
            map.set(k, v);
        }
        map
    }

    /// Mark construction as complete. Later writes are tracked.
    pub fn seal(&mut self) {
        self.live = true;
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Write a value, recording the prior one when the map is live.
    ///
    /// Only the first prior value of a change cycle is kept: mutating
    /// `"A" -> "B" -> "C"` leaves `"A"` in the dirty set. Keys that did not
    /// exist before are recorded with `None`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let slot = self.entries.iter().position(|(k, _)| *k == key);
        let previous = slot.map(|i| self.entries[i].1.clone());

        if self.live && !self.dirty.iter().any(|(k, _)| *k == key) {
            self.dirty.push((key.clone(), previous));
        }

        match slot {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior values of every key written since the last [`clear`](Self::clear).
    pub fn dirty(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.dirty.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Current values of the dirty keys, in the order they were first changed.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.dirty
            .iter()
            .filter_map(|(k, _)| self.get(k).map(|v| (k.as_str(), v)))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn clear(&mut self) {
        self.dirty.clear();
    }
}
