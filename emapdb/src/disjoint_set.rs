//! Union-find over wire and wire-vector ids.

use std::collections::HashMap;

/// A union-find set (disjoint set) keyed by raw store ids.
///
/// Ids do not need to be registered beforehand: `find` on an unknown
/// id inserts it as its own root. Union ties break toward the smaller
/// id, which pins the canonical representative a rebuild keeps; dump
/// comparisons rely on this being stable.
///
/// Keys are `i64` because the don't-care sentinel is negative.
#[derive(Debug, Default)]
pub struct DisjointSetUnion {
    parents: HashMap<i64, i64>,
}

impl DisjointSetUnion {
    pub fn new() -> DisjointSetUnion {
        Default::default()
    }

    /// Find the current group leader of an id, compressing the path
    /// behind it.
    pub fn find(&mut self, x: i64) -> i64 {
        self.parents.entry(x).or_insert(x);
        let mut s = x;
        while self.parents[&s] != s {
            s = self.parents[&s];
        }
        let mut u = x;
        while self.parents[&u] != s {
            let t = self.parents[&u];
            self.parents.insert(u, s);
            u = t;
        }
        s
    }

    /// Join (merge) two sets; the smaller root id survives.
    /// Returns false if the two were already in the same set.
    pub fn union(&mut self, a: i64, b: i64) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if ra < rb {
            self.parents.insert(rb, ra);
        }
        else {
            self.parents.insert(ra, rb);
        }
        true
    }

    /// All ids this set has ever touched, roots included.
    pub fn items(&self) -> impl Iterator<Item = i64> + '_ {
        self.parents.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_roots() {
        let mut dsu = DisjointSetUnion::new();
        assert_eq!(dsu.find(7), 7);
        assert_eq!(dsu.find(-1), -1);
    }

    #[test]
    fn smaller_id_wins() {
        let mut dsu = DisjointSetUnion::new();
        assert!(dsu.union(10, 3));
        assert_eq!(dsu.find(10), 3);
        assert!(dsu.union(3, 1));
        assert_eq!(dsu.find(10), 1);
        // already joined
        assert!(!dsu.union(1, 10));
    }

    #[test]
    fn path_compression() {
        let mut dsu = DisjointSetUnion::new();
        dsu.union(4, 3);
        dsu.union(3, 2);
        dsu.union(2, 1);
        assert_eq!(dsu.find(4), 1);
        // after compression, 4 points at the root directly
        assert_eq!(dsu.parents[&4], 1);
    }
}
