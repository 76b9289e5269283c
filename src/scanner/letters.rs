// src/scanner/letters.rs
// Byte -> letter class partition.

/// Partition of the 256 byte values into letter classes. Class ids are dense
/// and numbered in order of their smallest byte.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Letters {
    map: [u16; 256],
    count: u16,
}

impl Default for Letters {
    fn default() -> Self {
        Self::identity()
    }
}

impl Letters {
    /// Every byte is its own class.
    pub fn identity() -> Self {
        let mut map = [0u16; 256];
        for (b, slot) in map.iter_mut().enumerate() {
            *slot = b as u16;
        }
        Self { map, count: 256 }
    }

    /// All bytes in one class.
    pub fn single() -> Self {
        Self {
            map: [0u16; 256],
            count: 1,
        }
    }

    /// Splits the byte range into classes of the equivalence `eq`.
    /// `eq` must be reflexive, symmetric and transitive.
    pub fn partition<F>(eq: F) -> Self
    where
        F: Fn(u8, u8) -> bool,
    {
        let mut map = [0u16; 256];
        let mut reps: Vec<u8> = Vec::new();
        for b in 0u8..=255 {
            let class = match reps.iter().position(|&r| eq(r, b)) {
                Some(c) => c,
                None => {
                    reps.push(b);
                    reps.len() - 1
                }
            };
            map[b as usize] = class as u16;
        }
        Self {
            map,
            count: reps.len() as u16,
        }
    }

    /// Rebuilds a partition from a raw map (as stored on disk). Class ids must
    /// be dense, i.e. every id below the maximum is used.
    pub fn from_map(map: [u16; 256]) -> Option<Self> {
        let count = map.iter().copied().max().map_or(0, |m| m as usize + 1);
        let mut seen = vec![false; count];
        for &c in &map {
            seen[c as usize] = true;
        }
        if seen.iter().all(|&s| s) {
            Some(Self {
                map,
                count: count as u16,
            })
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn get(&self, byte: u8) -> usize {
        self.map[byte as usize] as usize
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn map(&self) -> &[u16; 256] {
        &self.map
    }

    /// Smallest byte of `class`.
    pub fn representative(&self, class: usize) -> Option<u8> {
        (0u8..=255).find(|&b| self.get(b) == class)
    }

    /// One representative byte per class, indexed by class id.
    pub fn representatives(&self) -> Vec<u8> {
        let mut reps = vec![0u8; self.count()];
        let mut seen = vec![false; self.count()];
        for b in 0u8..=255 {
            let c = self.get(b);
            if !seen[c] {
                seen[c] = true;
                reps[c] = b;
            }
        }
        reps
    }

    pub fn bytes_of(&self, class: usize) -> Vec<u8> {
        (0u8..=255).filter(|&b| self.get(b) == class).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_groups_equivalent_bytes() {
        let l = Letters::partition(|a, b| a.is_ascii_digit() == b.is_ascii_digit());
        assert_eq!(l.count(), 2);
        assert_eq!(l.get(b'0'), l.get(b'9'));
        assert_ne!(l.get(b'0'), l.get(b'a'));
        // class 0 holds byte 0, which is not a digit
        assert_eq!(l.get(0), 0);
        assert_eq!(l.representatives(), vec![0, b'0']);
        assert_eq!(l.bytes_of(1).len(), 10);
    }

    #[test]
    fn from_map_rejects_holes() {
        let mut map = [0u16; 256];
        map[7] = 2;
        assert!(Letters::from_map(map).is_none());
        map[8] = 1;
        let l = Letters::from_map(map).unwrap();
        assert_eq!(l.count(), 3);
    }
}
