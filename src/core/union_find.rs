//! Arena-indexed disjoint-set forest (path compression + union by rank).

/// Disjoint sets over `0..n`
#[derive(Debug, Clone)]
pub struct UnionFind
{
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind
{
    pub fn new(n: usize) -> Self
    {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    pub fn len(&self) -> usize
    {
        self.parent
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.parent
            .is_empty()
    }

    /// Root of `x`, compressing the path on the way
    pub fn find(
        &mut self,
        x: usize,
    ) -> usize
    {
        let mut root = x;
        while self.parent[root] != root
        {
            root = self.parent[root];
        }

        // Second walk: point every node on the path straight at the root
        let mut cur = x;
        while self.parent[cur] != root
        {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }

        root
    }

    /// Merge the sets of `a` and `b`; false when already joined
    pub fn union(
        &mut self,
        a: usize,
        b: usize,
    ) -> bool
    {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb
        {
            return false;
        }

        match self.rank[ra].cmp(&self.rank[rb])
        {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal =>
            {
                // Lower index wins ties so roots are reproducible
                let (keep, attach) = if ra < rb { (ra, rb) } else { (rb, ra) };
                self.parent[attach] = keep;
                self.rank[keep] = self.rank[keep].saturating_add(1);
            }
        }

        true
    }

    pub fn same(
        &mut self,
        a: usize,
        b: usize,
    ) -> bool
    {
        self.find(a) == self.find(b)
    }

    /// All sets, members ascending, sets ordered by their smallest member
    pub fn groups(&mut self) -> Vec<Vec<usize>>
    {
        let n = self.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        let mut out: Vec<Vec<usize>> = Vec::new();

        for x in 0..n
        {
            let r = self.find(x);
            match slot_of_root[r]
            {
                Some(slot) => out[slot].push(x),
                None =>
                {
                    slot_of_root[r] = Some(out.len());
                    out.push(vec![x]);
                }
            }
        }

        out
    }
}
