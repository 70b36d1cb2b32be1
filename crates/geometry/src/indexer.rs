//! Content-addressed vertex deduplication.

use std::collections::HashMap;

/// A value the [`Indexer`] can compare structurally.
///
/// Floats are keyed by value, so `-0.0` and `0.0` are the same key.
pub trait Record: Clone {
    fn write_key(&self, key: &mut Vec<u32>);
}

fn float_key(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl<const N: usize> Record for [f32; N] {
    fn write_key(&self, key: &mut Vec<u32>) {
        key.extend(self.iter().map(|&v| float_key(v)));
    }
}

impl<const N: usize> Record for [u32; N] {
    fn write_key(&self, key: &mut Vec<u32>) {
        key.extend_from_slice(self);
    }
}

impl<A: Record, B: Record> Record for (A, B) {
    fn write_key(&self, key: &mut Vec<u32>) {
        self.0.write_key(key);
        self.1.write_key(key);
    }
}

impl<A: Record> Record for Option<A> {
    fn write_key(&self, key: &mut Vec<u32>) {
        match self {
            Some(inner) => {
                key.push(1);
                inner.write_key(key);
            }
            None => key.push(0),
        }
    }
}

/// Hands out one stable index per distinct record.
#[derive(Debug, Clone)]
pub struct Indexer<T> {
    unique: Vec<T>,
    indices: HashMap<Vec<u32>, u32>,
}

impl<T> Default for Indexer<T> {
    fn default() -> Self {
        Self {
            unique: Vec::new(),
            indices: HashMap::new(),
        }
    }
}

impl<T: Record> Indexer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `record`, appending it if no equal record was added before.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, record: T) -> u32 {
        let mut key = Vec::new();
        record.write_key(&mut key);
        let next = self.unique.len() as u32;
        *self.indices.entry(key).or_insert_with(|| {
            self.unique.push(record);
            next
        })
    }

    #[must_use]
    pub fn unique(&self) -> &[T] {
        &self.unique
    }

    #[must_use]
    pub fn into_unique(self) -> Vec<T> {
        self.unique
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_records_share_an_index() {
        let mut indexer = Indexer::new();
        let a = indexer.add([1.0_f32, 2.0, 3.0]);
        let b = indexer.add([4.0_f32, 5.0, 6.0]);
        let c = indexer.add([1.0_f32, 2.0, 3.0]);
        assert_eq!((a, b, c), (0, 1, 0));
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn signed_zero_is_one_key() {
        let mut indexer = Indexer::new();
        assert_eq!(indexer.add([0.0_f32, 1.0]), indexer.add([-0.0_f32, 1.0]));
    }

    #[test]
    fn optional_parts_are_part_of_the_key() {
        let mut indexer: Indexer<([f32; 3], Option<[f32; 2]>)> = Indexer::new();
        let bare = indexer.add(([0.0, 1.0, 0.0], None));
        let textured = indexer.add(([0.0, 1.0, 0.0], Some([0.5, 0.5])));
        assert_ne!(bare, textured);
    }
}
