/// A fixed 256-bit set of dense small-integer ids, used wherever the store
/// needs to track membership over the (fixed-once-a-phase) universe of
/// property kind ids: `computedKinds`, `delayedKinds`, and similar per-phase
/// configuration sets. Kind ids are assigned densely starting at zero, so a
/// bitset beats a `HashSet<KindId>` for both memory and cache locality.
#[derive(Clone, Default, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct KindSet {
    bits: [u64; 4],
}

impl KindSet {
    pub fn new() -> Self {
        KindSet { bits: [0; 4] }
    }

    pub fn set(&mut self, i: u8, val: bool) {
        let i = i as usize;
        if val {
            self.bits[i / 64] |= 1 << (i % 64);
        } else {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }

    pub fn get(&self, i: u8) -> bool {
        let i = i as usize;
        (self.bits[i / 64] & (1 << (i % 64))) != 0
    }

    pub fn clear_all(&mut self) {
        self.bits = [0; 4];
    }

    pub fn count(&self) -> u32 {
        self.bits.iter().map(|x| x.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|x| *x == 0)
    }

    pub fn union(&mut self, other: &Self) {
        for i in 0..4 {
            self.bits[i] |= other.bits[i];
        }
    }

    pub fn intersect(&mut self, other: &Self) {
        for i in 0..4 {
            self.bits[i] &= other.bits[i];
        }
    }

    pub fn subtract(&mut self, other: &Self) {
        for i in 0..4 {
            self.bits[i] &= !other.bits[i];
        }
    }

    /// Iterates the set bits in ascending order, yielding each as a kind id.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0u16..256).filter_map(move |i| {
            let i = i as u8;
            self.get(i).then_some(i)
        })
    }
}

impl FromIterator<u8> for KindSet {
    fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
        let mut set = KindSet::new();
        for i in iter {
            set.set(i, true);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::KindSet;

    #[test]
    fn set_get_round_trips_every_bit() {
        let mut ks = KindSet::new();
        for i in 0..=255u8 {
            assert!(!ks.get(i));
            ks.set(i, true);
            assert!(ks.get(i));
        }
        assert_eq!(ks.count(), 256);
    }

    #[test]
    fn union_intersect_subtract() {
        let mut a: KindSet = [0u8, 1, 2, 200].into_iter().collect();
        let b: KindSet = [2u8, 3, 200].into_iter().collect();

        let mut inter = a.clone();
        inter.intersect(&b);
        assert_eq!(inter.iter().collect::<Vec<_>>(), vec![2, 200]);

        a.union(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 200]);

        a.subtract(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn empty_and_clear() {
        let mut ks = KindSet::new();
        assert!(ks.is_empty());
        ks.set(42, true);
        assert!(!ks.is_empty());
        ks.clear_all();
        assert!(ks.is_empty());
    }
}
