//! Insertion-ordered, name-keyed collection.

use super::error::DefinitionError;
use std::collections::HashMap;

/// Anything addressable by a unique name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Ordered map from name to item.
///
/// Lookups go through a name index; iteration follows insertion order so
/// tooling sees a deterministic sequence.
#[derive(Clone, Debug)]
pub struct NamedCollection<T: Named> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Named> Default for NamedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Named> NamedCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a collection, rejecting duplicate names.
    pub fn try_from_iter<I>(kind: &'static str, items: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut collection = Self::new();
        for item in items {
            collection.try_insert(kind, item)?;
        }
        Ok(collection)
    }

    /// Insert a new item. Fails if the name is already taken.
    pub fn try_insert(&mut self, kind: &'static str, item: T) -> Result<(), DefinitionError> {
        if self.index.contains_key(item.name()) {
            return Err(DefinitionError::DuplicateName {
                kind,
                name: item.name().to_string(),
            });
        }
        self.index.insert(item.name().to_string(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Insert or replace an item, keeping the original position on replace.
    pub fn upsert(&mut self, item: T) -> Option<T> {
        match self.index.get(item.name()) {
            Some(&position) => Some(std::mem::replace(&mut self.items[position], item)),
            None => {
                self.index.insert(item.name().to_string(), self.items.len());
                self.items.push(item);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&position| &self.items[position])
    }

    /// Insertion position of the named item.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T: Named> IntoIterator for &'a NamedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
