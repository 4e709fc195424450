use std::{fmt, hash::Hash};

use shared::domain::{ImageKey, Kpi, KpiId, ProgressImage, Unit, UnitId};

/// A record that lives in a [`Collection`], identified by a stable key.
pub trait Record: Clone {
    type Id: Clone + Eq + Hash + fmt::Display;

    fn record_id(&self) -> &Self::Id;
}

impl Record for Kpi {
    type Id = KpiId;

    fn record_id(&self) -> &KpiId {
        &self.id
    }
}

impl Record for Unit {
    type Id = UnitId;

    fn record_id(&self) -> &UnitId {
        &self.id
    }
}

impl Record for ProgressImage {
    type Id = ImageKey;

    fn record_id(&self) -> &ImageKey {
        &self.id
    }
}

/// Ordered records with at most one entry per id.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T: Record> {
    items: Vec<T>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from rows in backend order. A repeated id keeps the
    /// position of its first occurrence and the contents of its last.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::new();
        for record in records {
            collection.upsert(record);
        }
        collection
    }

    pub fn replace_all(&mut self, records: impl IntoIterator<Item = T>) {
        *self = Self::from_records(records);
    }

    /// Replaces the entry with the same id, or appends. Returns true on replace.
    pub fn upsert(&mut self, record: T) -> bool {
        match self.position(record.record_id()) {
            Some(index) => {
                self.items[index] = record;
                true
            }
            None => {
                self.items.push(record);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        self.position(id).map(|index| self.items.remove(index))
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.record_id() == id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.record_id() == id)
    }
}

impl<'a, T: Record> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
