//! Ordered, key-unique container shared by every model entity.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{ModelError, Result};

/// An entity that is stored in a [`Container`] under its own key.
pub trait Keyed {
    /// The key type; unique within one container.
    type Key: Clone + Eq + Hash + Display + Debug;

    /// Entity kind used in error messages.
    const KIND: &'static str;

    /// The key this entity is stored under.
    fn key(&self) -> Self::Key;
}

/// Insertion-ordered collection of entities keyed by [`Keyed::key`].
#[derive(Debug, Clone, PartialEq)]
pub struct Container<T: Keyed> {
    items: IndexMap<T::Key, T>,
}

impl<T: Keyed> Container<T> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }

    /// Add an entity; fails if its key is already present.
    pub fn add(&mut self, item: T) -> Result<()> {
        let key = item.key();
        if self.items.contains_key(&key) {
            return Err(ModelError::Duplicate {
                kind: T::KIND,
                key: key.to_string(),
            });
        }
        self.items.insert(key, item);
        Ok(())
    }

    /// Look up an entity by key.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.get(key)
    }

    /// Look up an entity by key for modification.
    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    /// Look up an entity by key, failing with [`ModelError::NotFound`].
    pub fn require(&self, key: &T::Key) -> Result<&T> {
        self.items.get(key).ok_or_else(|| ModelError::NotFound {
            kind: T::KIND,
            key: key.to_string(),
        })
    }

    /// Mutable variant of [`Container::require`].
    pub fn require_mut(&mut self, key: &T::Key) -> Result<&mut T> {
        self.items.get_mut(key).ok_or_else(|| ModelError::NotFound {
            kind: T::KIND,
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The most recently added entity.
    pub fn last(&self) -> Option<&T> {
        self.items.last().map(|(_, v)| v)
    }

    /// The most recently added entity, mutably.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut().map(|(_, v)| v)
    }

    /// Iterate entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &T::Key> {
        self.items.keys()
    }
}

impl<T: Keyed> Default for Container<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Keyed> IntoIterator for &'a Container<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Values<'a, T::Key, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

impl<T> Serialize for Container<T>
where
    T: Keyed + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.values())
    }
}
