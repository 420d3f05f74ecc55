//! Ordered record collections with an identifier index.
//!
//! Records keep insertion order (the order they appear in the document
//! file) and can also be found by identifier without a scan.

use std::collections::BTreeMap;

use capivara_types::{Game, GameId, User, UserId};

use crate::error::StoreError;

/// A record stored in a [`Collection`].
pub trait Record {
    /// Identifier type.
    type Id: Copy + Ord + core::fmt::Display;

    /// Collection name used in errors and logs.
    const COLLECTION: &'static str;

    /// This record's identifier.
    fn id(&self) -> Self::Id;
}

impl Record for User {
    type Id = UserId;
    const COLLECTION: &'static str = "usuarios";

    fn id(&self) -> UserId {
        self.id
    }
}

impl Record for Game {
    type Id = GameId;
    const COLLECTION: &'static str = "jogos";

    fn id(&self) -> GameId {
        self.id
    }
}

/// Records in insertion order plus an identifier-to-position index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T: Record> {
    items: Vec<T>,
    index: BTreeMap<T::Id, usize>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Build a collection, rejecting repeated identifiers.
    pub fn from_vec(items: Vec<T>) -> Result<Self, StoreError> {
        let mut collection = Self::default();
        collection.items.reserve(items.len());
        for item in items {
            collection.push(item)?;
        }
        Ok(collection)
    }

    /// Append a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the identifier is taken.
    pub fn push(&mut self, item: T) -> Result<(), StoreError> {
        let id = item.id();
        if self.index.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: T::COLLECTION,
                id: id.to_string(),
            });
        }
        self.index.insert(id, self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Remove and return the most recently appended record.
    pub fn pop(&mut self) -> Option<T> {
        let item = self.items.pop()?;
        self.index.remove(&item.id());
        Some(item)
    }

    /// Look up a record by identifier.
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.index.get(&id).and_then(|&pos| self.items.get(pos))
    }

    /// Look up a record by identifier for mutation.
    pub fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        let pos = *self.index.get(&id)?;
        self.items.get_mut(pos)
    }

    /// Whether a record with this identifier exists.
    pub fn contains(&self, id: T::Id) -> bool {
        self.index.contains_key(&id)
    }

    /// The largest identifier present.
    pub fn max_id(&self) -> Option<T::Id> {
        self.index.keys().next_back().copied()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Records in insertion order, as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Number of records.
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

impl<'a, T: Record> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
