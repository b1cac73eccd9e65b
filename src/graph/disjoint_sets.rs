//! Union-find over vertex slots.
//!
//! Union by rank with path compression on the mutating `find_mut`; the
//! read-only `find` walks without compressing so it can run under a
//! shared borrow. Removed vertices stay in the forest as dead members until
//! the owner rebuilds it.

use crate::model::VertexId;

#[derive(Debug, Clone, Default)]
pub struct DisjointSets {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Make `v` a singleton, growing the forest as needed.
    pub fn make_set(&mut self, v: VertexId) {
        let i = v.index();
        while self.parent.len() <= i {
            let next = self.parent.len() as u32;
            self.parent.push(next);
            self.rank.push(0);
        }
        self.parent[i] = v.0;
        self.rank[i] = 0;
    }

    pub fn find(&self, v: VertexId) -> VertexId {
        let mut x = v.0;
        while let Some(&p) = self.parent.get(x as usize) {
            if p == x {
                break;
            }
            x = p;
        }
        VertexId(x)
    }

    pub fn find_mut(&mut self, v: VertexId) -> VertexId {
        let root = self.find(v);
        let mut x = v.0;
        while let Some(&p) = self.parent.get(x as usize) {
            if p == x {
                break;
            }
            self.parent[x as usize] = root.0;
            x = p;
        }
        root
    }

    /// Merge the sets of `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: VertexId, b: VertexId) -> bool {
        let ra = self.find_mut(a);
        let rb = self.find_mut(b);
        if ra == rb {
            return false;
        }
        let (ia, ib) = (ra.index(), rb.index());
        match self.rank[ia].cmp(&self.rank[ib]) {
            std::cmp::Ordering::Less => self.parent[ia] = rb.0,
            std::cmp::Ordering::Greater => self.parent[ib] = ra.0,
            std::cmp::Ordering::Equal => {
                self.parent[ib] = ra.0;
                self.rank[ia] = self.rank[ia].saturating_add(1);
            }
        }
        true
    }

    pub fn same_set(&self, a: VertexId, b: VertexId) -> bool {
        self.find(a) == self.find(b)
    }

    pub fn clear(&mut self) {
        self.parent.clear();
        self.rank.clear();
    }
}
