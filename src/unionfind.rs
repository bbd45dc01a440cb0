/// Disjoint sets over `0..n` with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Compress
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Merges the sets of `a` and `b`. On equal rank, `a`'s root wins.
    /// Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return false;
        }
        if self.rank[ra] < self.rank[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        if self.rank[ra] == self.rank[rb] {
            self.rank[ra] = self.rank[ra].saturating_add(1);
        }
        true
    }

    /// Members of each set, sets ordered by their first member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.len() {
            let root = self.find(i);
            let slot = *slot_of_root[root].get_or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(i);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut uf = UnionFind::new(3);
        assert_eq!(uf.groups(), vec![vec![0], vec![1], vec![2]]);
        assert!(UnionFind::new(0).groups().is_empty());
    }

    #[test]
    fn test_union_is_transitive() {
        let mut uf = UnionFind::new(6);
        assert!(uf.union(0, 3));
        assert!(uf.union(3, 5));
        assert!(!uf.union(5, 0));
        assert!(uf.union(1, 2));
        assert_eq!(uf.find(0), uf.find(5));
        assert_ne!(uf.find(0), uf.find(1));
        assert_eq!(uf.groups(), vec![vec![0, 3, 5], vec![1, 2], vec![4]]);
    }

    #[test]
    fn test_long_chain_compresses() {
        let n = 100_000;
        let mut uf = UnionFind::new(n);
        for i in 1..n {
            uf.union(i, i - 1);
        }
        let root = uf.find(n - 1);
        assert!((0..n).all(|i| uf.find(i) == root));
        assert_eq!(uf.groups().len(), 1);
    }
}
