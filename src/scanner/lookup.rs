// src/scanner/lookup.rs
// Fixed-capacity open-addressing index of glued state pairs.

use super::error::{Result, ScanError};

/// Slots in the lookup table used by glue.
pub const GLUE_LOOKUP_CAPACITY: usize = 256 * 1024;

const EMPTY: u64 = u64::MAX;

#[derive(Clone, Copy)]
struct Slot {
    key: u64,
    value: u32,
}

/// Maps `(lhs, rhs)` state indices to dense output indices. `N` must be a
/// power of two; one slot always stays empty so probing terminates.
pub struct GluedStateLookupTable<const N: usize> {
    slots: Vec<Slot>,
    len: usize,
}

impl<const N: usize> Default for GluedStateLookupTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> GluedStateLookupTable<N> {
    pub fn new() -> Self {
        const { assert!(N.is_power_of_two(), "capacity must be a power of two") };
        Self {
            slots: vec![
                Slot {
                    key: EMPTY,
                    value: 0,
                };
                N
            ],
            len: 0,
        }
    }

    pub const fn capacity() -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn key(pair: (u32, u32)) -> u64 {
        ((pair.0 as u64) << 32) | pair.1 as u64
    }

    #[inline]
    fn hash(key: u64) -> usize {
        // splitmix64 finalizer
        let mut x = key.wrapping_add(0x9E37_79B9_7F4A_7C15);
        x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        (x ^ (x >> 31)) as usize
    }

    /// Slot holding `key`, or the empty slot where it would go.
    fn probe(&self, key: u64) -> usize {
        let mask = N - 1;
        let mut i = Self::hash(key) & mask;
        loop {
            let k = self.slots[i].key;
            if k == key || k == EMPTY {
                return i;
            }
            i = (i + 1) & mask;
        }
    }

    pub fn get(&self, pair: (u32, u32)) -> Option<u32> {
        let key = Self::key(pair);
        if key == EMPTY {
            return None;
        }
        let slot = self.slots[self.probe(key)];
        (slot.key == key).then_some(slot.value)
    }

    /// Returns the index stored for `pair`, inserting `value` first if the
    /// pair is new. The flag tells whether an insertion happened.
    pub fn get_or_insert(&mut self, pair: (u32, u32), value: u32) -> Result<(u32, bool)> {
        let key = Self::key(pair);
        if key == EMPTY {
            return Err(ScanError::Precondition(
                "state pair (u32::MAX, u32::MAX) is reserved".into(),
            ));
        }
        let i = self.probe(key);
        if self.slots[i].key == key {
            return Ok((self.slots[i].value, false));
        }
        if self.len + 1 >= N {
            return Err(ScanError::LookupTableFull { capacity: N });
        }
        self.slots[i] = Slot { key, value };
        self.len += 1;
        Ok((value, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut t = GluedStateLookupTable::<16>::new();
        assert_eq!(t.get_or_insert((1, 2), 0).unwrap(), (0, true));
        assert_eq!(t.get_or_insert((2, 1), 1).unwrap(), (1, true));
        assert_eq!(t.get_or_insert((1, 2), 7).unwrap(), (0, false));
        assert_eq!(t.get((2, 1)), Some(1));
        assert_eq!(t.get((3, 3)), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn full_table_is_an_error() {
        let mut t = GluedStateLookupTable::<8>::new();
        for i in 0..7 {
            t.get_or_insert((i, i), i).unwrap();
        }
        // existing keys still resolve once the table is full
        assert_eq!(t.get_or_insert((3, 3), 99).unwrap(), (3, false));
        assert!(matches!(
            t.get_or_insert((100, 0), 7),
            Err(ScanError::LookupTableFull { capacity: 8 })
        ));
    }
}
