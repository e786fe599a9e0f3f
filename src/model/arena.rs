//! Node storage for the suffix tree.
//!
//! Nodes are addressed by [`NodeId`]. Leaves are preallocated, one per
//! window position, so the leaf for the suffix starting at position `k` is
//! simply node `k`. Internal nodes ("branches") get ids from `window`
//! upwards and are recycled through a free list, so a long run allocates
//! no more branches than the peak number alive at once.

/// Index of a node in a [`NodeArena`].
pub type NodeId = u32;

/// The absent node. Also stands for the virtual parent of the root, which
/// has the root as its child for every symbol.
pub const NIL: NodeId = u32::MAX;

/// Per-node data shared by leaves and branches: the edge from the parent.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Occurrences of this edge's first symbol in the parent's context.
    pub count: u32,
    /// Next sibling; the first sibling is the most probable symbol.
    pub next: NodeId,
    pub parent: NodeId,
    /// Number of children minus one (wrapping). Always 0 for leaves;
    /// meaningless for the root.
    pub child_count: u8,
    /// First symbol of the edge label.
    pub sym: u8,
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            count: 0,
            next: NIL,
            parent: NIL,
            child_count: 0,
            sym: 0,
        }
    }
}

/// Data only internal nodes have.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    /// A window position where the edge label into this node starts.
    pub pos: u32,
    /// Length of the path label.
    pub depth: u32,
    /// Node of the path label minus its first symbol.
    pub suffix: NodeId,
    /// Sum of the children's counts.
    pub context_total: u32,
    pub first_child: NodeId,
    /// Fiala–Greene credit bit used to keep `pos` fresh.
    pub cred: bool,
}

/// Leaves plus a recycling pool of branches.
pub struct NodeArena {
    window: u32,
    /// Indexed by node id.
    edges: Vec<Edge>,
    /// Indexed by `id - window`.
    branches: Vec<Branch>,
    free: Vec<NodeId>,
}

impl NodeArena {
    /// Create an arena for a window of `window` bytes.
    pub fn new(window: u32) -> Self {
        Self {
            window,
            edges: vec![Edge::default(); window as usize],
            branches: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Drop every branch and reinitialise every leaf.
    pub fn reset(&mut self) {
        self.edges.truncate(self.window as usize);
        self.edges.fill(Edge::default());
        self.branches.clear();
        self.free.clear();
    }

    /// Whether `id` is a leaf.
    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        id < self.window
    }

    /// Allocate a branch with no parent and no children.
    pub fn alloc_branch(&mut self, depth: u32, pos: u32) -> NodeId {
        let branch = Branch {
            pos,
            depth,
            suffix: NIL,
            context_total: 0,
            first_child: NIL,
            cred: true,
        };
        let edge = Edge {
            child_count: u8::MAX,
            ..Edge::default()
        };
        if let Some(id) = self.free.pop() {
            self.edges[id as usize] = edge;
            self.branches[(id - self.window) as usize] = branch;
            id
        } else {
            let id = self.edges.len() as NodeId;
            self.edges.push(edge);
            self.branches.push(branch);
            id
        }
    }

    /// Return a branch to the pool.
    pub fn release(&mut self, id: NodeId) {
        debug_assert!(!self.is_leaf(id));
        self.free.push(id);
    }

    /// Number of branches currently in use.
    #[cfg(test)]
    pub fn live_branches(&self) -> usize {
        self.branches.len() - self.free.len()
    }

    #[inline]
    pub fn edge(&self, id: NodeId) -> &Edge {
        &self.edges[id as usize]
    }

    #[inline]
    pub fn edge_mut(&mut self, id: NodeId) -> &mut Edge {
        &mut self.edges[id as usize]
    }

    #[inline]
    pub fn branch(&self, id: NodeId) -> &Branch {
        &self.branches[(id - self.window) as usize]
    }

    #[inline]
    pub fn branch_mut(&mut self, id: NodeId) -> &mut Branch {
        &mut self.branches[(id - self.window) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaves_are_positions() {
        let arena = NodeArena::new(16);
        assert!(arena.is_leaf(0));
        assert!(arena.is_leaf(15));
        assert!(!arena.is_leaf(16));
    }

    #[test]
    fn test_branches_are_recycled() {
        let mut arena = NodeArena::new(8);
        let a = arena.alloc_branch(1, 0);
        let b = arena.alloc_branch(2, 3);
        assert_eq!(a, 8);
        assert_eq!(b, 9);
        arena.branch_mut(a).context_total = 40;
        arena.release(a);
        assert_eq!(arena.live_branches(), 1);

        let c = arena.alloc_branch(5, 1);
        assert_eq!(c, a);
        assert_eq!(arena.branch(c).context_total, 0);
        assert_eq!(arena.branch(c).depth, 5);
        assert_eq!(arena.edge(c).child_count, u8::MAX);
    }

    #[test]
    fn test_reset_drops_branches() {
        let mut arena = NodeArena::new(4);
        arena.alloc_branch(0, 0);
        arena.edge_mut(2).count = 9;
        arena.reset();
        assert_eq!(arena.live_branches(), 0);
        assert_eq!(arena.edge(2).count, 0);
        assert_eq!(arena.alloc_branch(0, 0), 4);
    }
}
