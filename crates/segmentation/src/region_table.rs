//! Owning table of live regions and their adjacency graph
//!
//! Regions are keyed by id in a `BTreeMap`, so every scan runs in
//! ascending id order. Neighbour links are id sets kept symmetric by the
//! table's own link/unlink operations. Ids are handed out from a counter
//! that only grows; a retired id is never issued again.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use mseg_core::{Error, Result};

use crate::region::{Region, RegionId};

#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: BTreeMap<RegionId, Region>,
    next_id: RegionId,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn get(&self, id: RegionId) -> Result<&Region> {
        self.regions.get(&id).ok_or(Error::RegionNotFound(id))
    }

    pub fn get_mut(&mut self, id: RegionId) -> Result<&mut Region> {
        self.regions.get_mut(&id).ok_or(Error::RegionNotFound(id))
    }

    /// Live ids in ascending order
    pub fn ids(&self) -> Vec<RegionId> {
        self.regions.keys().copied().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, RegionId, Region> {
        self.regions.iter()
    }

    pub fn values(&self) -> btree_map::Values<'_, RegionId, Region> {
        self.regions.values()
    }

    pub fn values_mut(&mut self) -> btree_map::ValuesMut<'_, RegionId, Region> {
        self.regions.values_mut()
    }

    /// Id that the next call to [`RegionTable::allocate_id`] will return
    pub fn next_id(&self) -> RegionId {
        self.next_id
    }

    /// Reserve a fresh id, larger than every id issued so far
    pub fn allocate_id(&mut self) -> RegionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a region under its own id. Fails if the id is live.
    pub fn insert(&mut self, region: Region) -> Result<()> {
        let id = region.id;
        if self.regions.contains_key(&id) {
            return Err(Error::Algorithm(format!("region id {} already in use", id)));
        }
        self.next_id = self.next_id.max(id + 1);
        self.regions.insert(id, region);
        Ok(())
    }

    /// Add a symmetric link between two live regions
    pub fn link(&mut self, a: RegionId, b: RegionId) -> Result<()> {
        if a == b {
            return Ok(());
        }
        if !self.regions.contains_key(&b) {
            return Err(Error::RegionNotFound(b));
        }
        self.get_mut(a)?.neighbors.insert(b);
        self.get_mut(b)?.neighbors.insert(a);
        Ok(())
    }

    /// Drop the link between two regions, if any
    pub fn unlink(&mut self, a: RegionId, b: RegionId) {
        if let Some(r) = self.regions.get_mut(&a) {
            r.neighbors.remove(&b);
        }
        if let Some(r) = self.regions.get_mut(&b) {
            r.neighbors.remove(&a);
        }
    }

    /// Remove a region from the table, leaving its neighbours' links untouched
    pub fn take(&mut self, id: RegionId) -> Result<Region> {
        self.regions.remove(&id).ok_or(Error::RegionNotFound(id))
    }

    /// Hand every neighbour link of an absorbed region over to `survivor`.
    ///
    /// `absorbed` must already be out of the table; its id is scrubbed from
    /// all neighbour sets first, then its links are replayed onto the survivor.
    pub fn transfer_links(&mut self, absorbed: &Region, survivor: RegionId) -> Result<()> {
        for &n in &absorbed.neighbors {
            if let Some(r) = self.regions.get_mut(&n) {
                r.neighbors.remove(&absorbed.id);
            }
        }
        for &n in &absorbed.neighbors {
            if n != survivor && self.regions.contains_key(&n) {
                self.link(survivor, n)?;
            }
        }
        Ok(())
    }

    /// Delete a region and redistribute its adjacency.
    ///
    /// Each former neighbour loses the link. When `link_neighborhood` is set,
    /// or a neighbour is left with no links at all, that neighbour is linked to
    /// every other former neighbour of the deleted region.
    pub fn remove_region(&mut self, id: RegionId, link_neighborhood: bool) -> Result<Region> {
        let region = self.take(id)?;
        let former: Vec<RegionId> = region
            .neighbors
            .iter()
            .copied()
            .filter(|n| self.regions.contains_key(n))
            .collect();

        // phase one: scrub, phase two: relink
        let mut to_relink = Vec::new();
        for &n in &former {
            let r = self.get_mut(n)?;
            r.neighbors.remove(&id);
            if link_neighborhood || r.neighbors.is_empty() {
                to_relink.push(n);
            }
        }
        for n in to_relink {
            for &other in &former {
                if other != n {
                    self.link(n, other)?;
                }
            }
        }

        Ok(region)
    }

    /// Pixel count summed over all live regions
    pub fn total_pixels(&self) -> usize {
        self.regions.values().map(|r| r.size).sum()
    }

    /// Whether every neighbour link has its mirror and points at a live region
    pub fn is_symmetric(&self) -> bool {
        self.regions.iter().all(|(&id, r)| {
            r.neighbors.iter().all(|n| {
                n != &id && self.regions.get(n).is_some_and(|other| other.neighbors.contains(&id))
            })
        })
    }

    /// Undirected edge list `(a, b)` with `a < b`
    pub fn adjacency(&self) -> Vec<(RegionId, RegionId)> {
        self.regions
            .iter()
            .flat_map(|(&id, r)| r.neighbors.range(id + 1..).map(move |&n| (id, n)))
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: u64) -> RegionTable {
        let mut t = RegionTable::new();
        for i in 0..n {
            t.insert(Region::from_pixel(i, 0, i as usize, vec![i as f64])).unwrap();
            if i > 0 {
                t.link(i, i - 1).unwrap();
            }
        }
        t
    }

    #[test]
    fn test_ids_never_reused() {
        let mut t = chain(3);
        assert_eq!(t.next_id(), 3);
        t.remove_region(2, true).unwrap();
        assert_eq!(t.allocate_id(), 3);
        assert!(t.insert(Region::from_pixel(1, 0, 0, vec![0.0])).is_err());
    }

    #[test]
    fn test_link_symmetry_and_missing() {
        let mut t = chain(3);
        assert!(t.is_symmetric());
        assert!(matches!(t.link(0, 9), Err(Error::RegionNotFound(9))));
        t.unlink(0, 1);
        assert!(!t.get(1).unwrap().is_neighbor(0));
        assert!(t.is_symmetric());
    }

    #[test]
    fn test_transfer_links() {
        // 0 - 1 - 2 - 3 ; absorb 2 into 1
        let mut t = chain(4);
        let absorbed = t.take(2).unwrap();
        t.transfer_links(&absorbed, 1).unwrap();
        assert_eq!(t.get(1).unwrap().neighbors.iter().copied().collect::<Vec<_>>(), vec![0, 3]);
        assert!(t.is_symmetric());
        assert_eq!(t.adjacency(), vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn test_remove_region_links_neighbors() {
        let mut t = chain(3);
        t.remove_region(1, true).unwrap();
        assert!(t.get(0).unwrap().is_neighbor(2));
        assert!(t.is_symmetric());
    }

    #[test]
    fn test_remove_region_without_link_keeps_isolated_connected() {
        // star: 0 center, 1 and 2 leaves, 2 also touches 3
        let mut t = RegionTable::new();
        for i in 0..4 {
            t.insert(Region::from_pixel(i, 0, 0, vec![0.0])).unwrap();
        }
        t.link(0, 1).unwrap();
        t.link(0, 2).unwrap();
        t.link(2, 3).unwrap();

        t.remove_region(0, false).unwrap();
        // 1 would be isolated, so it is linked to the other former neighbour
        assert!(t.get(1).unwrap().is_neighbor(2));
        assert!(t.is_symmetric());
        assert_eq!(t.total_pixels(), 3);
    }
}
