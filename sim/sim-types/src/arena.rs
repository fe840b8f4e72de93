//! Generation-checked slot storage behind the id newtypes.
//!
//! A handle packs a slot index in its low 32 bits and the slot's generation
//! in the high 32 bits:
//!
//! ```text
//! raw = generation << 32 | index
//! ```
//!
//! Removing a value bumps the slot's generation and puts the slot on a free
//! list. The next insert reuses the slot under the new generation, so storage
//! stays bounded under churn while old handles keep failing lookups.

/// Slot storage addressed by raw `u64` handles.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

const fn pack(index: u32, generation: u32) -> u64 {
    ((generation as u64) << 32) | index as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn unpack(handle: u64) -> (usize, u32) {
    ((handle & 0xFFFF_FFFF) as usize, (handle >> 32) as u32)
}

impl<T> Arena<T> {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and return its handle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, value: T) -> u64 {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return pack(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        pack(index, 0)
    }

    /// Take a value out, freeing its slot.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (index, generation) = unpack(handle);
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        #[allow(clippy::cast_possible_truncation)]
        self.free.push(index as u32);
        self.len -= 1;
        Some(value)
    }

    /// Get a value.
    #[must_use]
    pub fn get(&self, handle: u64) -> Option<&T> {
        let (index, generation) = unpack(handle);
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a value mutably.
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        let (index, generation) = unpack(handle);
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated slots, live or free.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over live values in slot order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (pack(index as u32, slot.generation), value))
        })
    }

    /// Iterate mutably over live values in slot order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (pack(index as u32, generation), value))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_slots_are_reused_under_new_handles() {
        let mut arena = Arena::new();
        let first = arena.insert(1);
        let mut previous = first;
        for value in 2..100 {
            arena.remove(previous).unwrap();
            previous = arena.insert(value);
            assert_ne!(previous, first);
        }
        assert_eq!(arena.capacity(), 1);
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(previous), Some(&99));
    }

    #[test]
    fn test_iteration_skips_free_slots() {
        let mut arena = Arena::new();
        let handles: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(handles[1]).unwrap();

        let seen: Vec<_> = arena.iter().map(|(handle, &value)| (handle, value)).collect();
        assert_eq!(seen, vec![(handles[0], 0), (handles[2], 2), (handles[3], 3)]);

        for (_, value) in arena.iter_mut() {
            *value *= 10;
        }
        assert_eq!(arena.get(handles[3]), Some(&30));
    }

    #[test]
    fn test_unknown_handles_fail() {
        let mut arena: Arena<u8> = Arena::new();
        assert_eq!(arena.get(7), None);
        assert_eq!(arena.get_mut(1 << 40), None);
        assert_eq!(arena.remove(3), None);
    }
}
