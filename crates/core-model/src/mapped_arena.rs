// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A wrapper around a `typed_generational_arena::Arena` that also provides lookup by name.
//!
//! Each type kind (enum, input, object, interface) has its own arena. Fields refer to their types
//! through arena indices; the name map is what the graph builder uses to back-patch a reference
//! recorded before its target existed.

use std::{collections::HashMap, ops};

use typed_generational_arena::{Arena, IgnoreGeneration, Index};

pub type Slab<T> = Arena<T, usize, IgnoreGeneration>;
pub type SlabIndex<T> = Index<T, usize, IgnoreGeneration>;

#[derive(Debug, Clone)]
pub struct MappedArena<V> {
    values: Slab<V>,
    map: HashMap<String, SlabIndex<V>>,
}

impl<V> MappedArena<V> {
    pub fn values_ref(&self) -> &Slab<V> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get_id(&self, key: &str) -> Option<SlabIndex<V>> {
        self.map.get(key).copied()
    }

    pub fn get_by_key(&self, key: &str) -> Option<&V> {
        self.get_id(key).map(|id| &self[id])
    }

    pub fn get_by_key_mut(&mut self, key: &str) -> Option<&mut V> {
        self.get_id(key).map(|id| &mut self.values[id])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert a value under `key`, returning the existing id if the key is already taken.
    pub fn add(&mut self, key: &str, typ: V) -> SlabIndex<V> {
        if let Some(existing) = self.get_id(key) {
            return existing;
        }

        let id = self.values.insert(typ);
        self.map.insert(key.to_string(), id);
        id
    }

    /// Insert a value under a key that must not already be taken. On conflict the value is handed
    /// back untouched.
    pub fn try_add(&mut self, key: &str, typ: V) -> Result<SlabIndex<V>, V> {
        if self.contains_key(key) {
            return Err(typ);
        }
        Ok(self.add(key, typ))
    }

    /// Drop the value under `key`. Ids of the removed value must no longer be dereferenced.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let id = self.map.remove(key)?;
        self.values.remove(id)
    }

    /// Values in insertion order
    pub fn iter(&self) -> typed_generational_arena::Iter<'_, V, usize, IgnoreGeneration> {
        self.values.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> typed_generational_arena::IterMut<'_, V, usize, IgnoreGeneration> {
        self.values.iter_mut()
    }
}

impl<V> Default for MappedArena<V> {
    fn default() -> Self {
        MappedArena {
            values: Slab::new(),
            map: HashMap::default(),
        }
    }
}

impl<V> ops::Index<SlabIndex<V>> for MappedArena<V> {
    type Output = V;

    #[inline]
    fn index(&self, id: SlabIndex<V>) -> &V {
        &self.values[id]
    }
}

impl<V> ops::IndexMut<SlabIndex<V>> for MappedArena<V> {
    #[inline]
    fn index_mut(&mut self, id: SlabIndex<V>) -> &mut V {
        &mut self.values[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut arena = MappedArena::default();
        let first = arena.try_add("User", 1).unwrap();

        assert_eq!(arena.try_add("User", 2), Err(2));
        assert_eq!(arena.add("User", 3), first);
        assert_eq!(arena.get_by_key("User"), Some(&1));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn removed_keys_are_forgotten() {
        let mut arena = MappedArena::default();
        arena.add("User", 1);
        let post = arena.add("Post", 2);

        assert_eq!(arena.remove("User"), Some(1));
        assert_eq!(arena.remove("User"), None);
        assert!(!arena.contains_key("User"));
        assert_eq!(arena[post], 2);
        assert_eq!(arena.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut arena = MappedArena::default();
        arena.add("b", "second");
        arena.add("a", "first");
        arena.add("c", "third");

        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["second", "first", "third"]);
    }
}
