//! Per-agent blackboard
//!
//! A typed key→value store actions use to talk to each other and to the
//! decisions that read their results. Values are a fixed set of kinds so a
//! lookup can report a type mismatch instead of guessing.

use std::fmt;

use hecs::Entity;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Effects to play when an observer list is invoked.
///
/// Lists live on the agent's blackboard, so they die with the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverList(SmallVec<[String; 4]>);

impl ObserverList {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; duplicates are ignored
    pub fn subscribe(&mut self, effect: impl Into<String>) {
        let effect = effect.into();
        if !self.0.contains(&effect) {
            self.0.push(effect);
        }
    }

    /// Remove an observer
    pub fn unsubscribe(&mut self, effect: &str) -> bool {
        if let Some(pos) = self.0.iter().position(|e| e == effect) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    /// Iterate over subscribed effects
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Remove every observer
    pub fn drain(&mut self) -> Vec<String> {
        self.0.drain(..).collect()
    }

    /// Number of observers
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no observers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A blackboard value
#[derive(Debug, Clone, PartialEq)]
pub enum BlackboardValue {
    /// Integer counter or setting
    Int(i64),
    /// Flag
    Bool(bool),
    /// Reference to another entity
    Entity(Entity),
    /// Effects to play on invocation
    Observers(ObserverList),
}

impl BlackboardValue {
    /// Kind name used in diagnostics
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Entity(_) => ValueKind::Entity,
            Self::Observers(_) => ValueKind::Observers,
        }
    }
}

/// Kind of a blackboard value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Bool,
    Entity,
    Observers,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Entity => "entity",
            Self::Observers => "observers",
        };
        f.write_str(name)
    }
}

/// A blackboard entry held a value of the wrong kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackboardError {
    /// Key that was read
    pub key: String,
    /// Kind the caller expected
    pub expected: ValueKind,
    /// Kind that was stored
    pub found: ValueKind,
}

impl fmt::Display for BlackboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blackboard key '{}' holds {} but {} was expected",
            self.key, self.found, self.expected
        )
    }
}

impl std::error::Error for BlackboardError {}

/// Typed key→value store owned by one agent.
///
/// Reads return `Ok(None)` for a missing key and `Err` when the key holds a
/// different kind.
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    entries: FxHashMap<String, BlackboardValue>,
}

impl Blackboard {
    /// Create an empty blackboard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing whatever was there
    pub fn set(&mut self, key: impl Into<String>, value: BlackboardValue) {
        self.entries.insert(key.into(), value);
    }

    /// Raw access to an entry
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BlackboardValue> {
        self.entries.get(key)
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &str) -> Option<BlackboardValue> {
        self.entries.remove(key)
    }

    /// Whether an entry exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read an integer
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds another kind
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, BlackboardError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(BlackboardValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, ValueKind::Int, other)),
        }
    }

    /// Read a flag
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds another kind
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, BlackboardError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(BlackboardValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, ValueKind::Bool, other)),
        }
    }

    /// Read an entity reference
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds another kind
    pub fn get_entity(&self, key: &str) -> Result<Option<Entity>, BlackboardError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(BlackboardValue::Entity(e)) => Ok(Some(*e)),
            Some(other) => Err(mismatch(key, ValueKind::Entity, other)),
        }
    }

    /// Add `delta` to an integer entry, creating it at zero first
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds another kind
    pub fn add_int(&mut self, key: &str, delta: i64) -> Result<i64, BlackboardError> {
        let current = self.get_int(key)?.unwrap_or(0);
        let next = current.saturating_add(delta);
        self.set(key, BlackboardValue::Int(next));
        Ok(next)
    }

    /// Mutable access to an observer list, creating it if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds another kind
    pub fn observers_mut(&mut self, key: &str) -> Result<&mut ObserverList, BlackboardError> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| BlackboardValue::Observers(ObserverList::new()));
        match entry {
            BlackboardValue::Observers(list) => Ok(list),
            other => Err(mismatch(key, ValueKind::Observers, other)),
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the blackboard is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mismatch(key: &str, expected: ValueKind, found: &BlackboardValue) -> BlackboardError {
    BlackboardError {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let board = Blackboard::new();
        assert_eq!(board.get_int("hits"), Ok(None));
        assert_eq!(board.get_bool("enraged"), Ok(None));
    }

    #[test]
    fn test_type_mismatch_reported() {
        let mut board = Blackboard::new();
        board.set("hits", BlackboardValue::Bool(true));

        let err = board.get_int("hits").unwrap_err();
        assert_eq!(err.expected, ValueKind::Int);
        assert_eq!(err.found, ValueKind::Bool);
        assert!(err.to_string().contains("hits"));
    }

    #[test]
    fn test_add_int_creates_and_accumulates() {
        let mut board = Blackboard::new();
        assert_eq!(board.add_int("hits", 2), Ok(2));
        assert_eq!(board.add_int("hits", 3), Ok(5));

        board.set("flag", BlackboardValue::Bool(false));
        assert!(board.add_int("flag", 1).is_err());
    }

    #[test]
    fn test_observer_list() {
        let mut board = Blackboard::new();
        {
            let list = board.observers_mut("on_hit").unwrap();
            list.subscribe("spark");
            list.subscribe("spark");
            list.subscribe("shake");
        }
        assert_eq!(board.observers_mut("on_hit").unwrap().len(), 2);

        let drained = board.observers_mut("on_hit").unwrap().drain();
        assert_eq!(drained, vec!["spark".to_string(), "shake".to_string()]);
        assert!(board.observers_mut("on_hit").unwrap().is_empty());

        board.set("count", BlackboardValue::Int(1));
        assert!(board.observers_mut("count").is_err());
    }
}
