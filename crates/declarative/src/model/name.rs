//! Name normalization and the insertion-ordered collection every scope uses.

use std::collections::HashMap;
use std::slice;

/// Normalize an entity name for comparison.
///
/// Every declare and lookup goes through this function so the two can never
/// disagree about identity.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An entity identified by its normalized name within a scope.
pub trait Keyed {
    /// The normalized key
    fn key(&self) -> &str;
}

/// Insertion-ordered entities with a name index.
///
/// Iteration order is declaration order, which keeps plans reproducible.
#[derive(Debug, Clone)]
pub struct Named<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Keyed> Named<T> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Return the entity named `name`, constructing it with `build` if absent.
    ///
    /// `build` receives the normalized name. An existing entity is returned
    /// untouched, so the first declaration wins.
    pub fn declare_with(&mut self, name: &str, build: impl FnOnce(String) -> T) -> &mut T {
        let key = normalize(name);
        let existing = self.index.get(&key).copied();
        let position = match existing {
            Some(position) => position,
            None => {
                let item = build(key.clone());
                debug_assert_eq!(item.key(), key);
                self.items.push(item);
                self.index.insert(key, self.items.len() - 1);
                self.items.len() - 1
            }
        };
        &mut self.items[position]
    }

    /// Look up an entity by name
    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(&normalize(name)).map(|&i| &self.items[i])
    }

    /// Look up an entity by name for mutation
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let position = self.index.get(&normalize(name)).copied()?;
        self.items.get_mut(position)
    }

    /// Whether an entity with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize(name))
    }

    /// Entities in declaration order
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Keyed> Default for Named<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Keyed> IntoIterator for &'a Named<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
