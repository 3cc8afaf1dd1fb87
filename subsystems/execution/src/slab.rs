//! # Slab
//!
//! Fixed-capacity table of optional entries addressed by slot index. Vacant
//! slots are found lowest-first, so freed slots are reused.

/// Fixed-capacity slot table
#[derive(Debug)]
pub struct Slab<T, const N: usize> {
    slots: [Option<T>; N],
    len: usize,
}

impl<T, const N: usize> Slab<T, N> {
    /// Create an empty slab
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            len: 0,
        }
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Lowest vacant slot
    pub fn vacant_key(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Store `value` in the lowest vacant slot
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        match self.vacant_key() {
            Some(key) => {
                self.slots[key] = Some(value);
                self.len += 1;
                Ok(key)
            }
            None => Err(value),
        }
    }

    /// Store `value` in a specific vacant slot
    pub fn insert_at(&mut self, key: usize, value: T) -> Result<(), T> {
        let Some(slot) = self.slots.get_mut(key) else {
            return Err(value);
        };
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Take the entry out of a slot
    pub fn remove(&mut self, key: usize) -> Option<T> {
        let value = self.slots.get_mut(key)?.take()?;
        self.len -= 1;
        Some(value)
    }

    /// Get an entry
    pub fn get(&self, key: usize) -> Option<&T> {
        self.slots.get(key)?.as_ref()
    }

    /// Get an entry mutably
    pub fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        self.slots.get_mut(key)?.as_mut()
    }

    /// Iterate over occupied slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(key, slot)| slot.as_ref().map(|value| (key, value)))
    }
}

impl<T, const N: usize> Default for Slab<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_uses_lowest_slot() {
        let mut slab: Slab<&str, 3> = Slab::new();
        assert_eq!(slab.insert("a"), Ok(0));
        assert_eq!(slab.insert("b"), Ok(1));
        assert_eq!(slab.remove(0), Some("a"));
        assert_eq!(slab.insert("c"), Ok(0));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn test_full_slab_rejects() {
        let mut slab: Slab<u32, 2> = Slab::new();
        slab.insert(1).unwrap();
        slab.insert(2).unwrap();
        assert!(slab.is_full());
        assert_eq!(slab.insert(3), Err(3));
        assert_eq!(slab.vacant_key(), None);
    }

    #[test]
    fn test_insert_at() {
        let mut slab: Slab<u32, 4> = Slab::new();
        assert_eq!(slab.insert_at(2, 7), Ok(()));
        assert_eq!(slab.insert_at(2, 8), Err(8));
        assert_eq!(slab.insert_at(9, 8), Err(8));
        assert_eq!(slab.get(2), Some(&7));
        assert_eq!(slab.vacant_key(), Some(0));
    }

    #[test]
    fn test_iter_in_slot_order() {
        let mut slab: Slab<char, 4> = Slab::new();
        slab.insert_at(3, 'd').unwrap();
        slab.insert_at(1, 'b').unwrap();
        let keys: Vec<usize> = slab.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![1, 3]);
        assert_eq!(slab.remove(2), None);
    }
}
