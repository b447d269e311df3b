//! Joining regions that were cut apart by tile seams

use mseg_segmentation::RegionId;

/// Disjoint sets over dense region ids. The smaller root always wins, so
/// every set is represented by its lowest id.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<RegionId>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as RegionId).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set holding `x`, compressing the path walked
    pub fn find(&mut self, x: RegionId) -> RegionId {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        root
    }

    /// Join the sets of `a` and `b`; returns whether they were apart
    pub fn union(&mut self, a: RegionId, b: RegionId) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[big as usize] = small;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smaller_root_wins() {
        let mut uf = UnionFind::new(6);
        assert!(uf.union(4, 2));
        assert!(uf.union(5, 4));
        assert!(!uf.union(2, 5));
        assert_eq!(uf.find(5), 2);
        assert_eq!(uf.find(3), 3);
        uf.union(0, 5);
        assert_eq!(uf.find(4), 0);
        assert_eq!(uf.len(), 6);
    }
}
