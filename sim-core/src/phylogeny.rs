//! Arena-backed strictly binary phylogeny.
//!
//! Nodes live in a flat arena and refer to each other through [`NodeId`]
//! handles. A node is either [`Branch::Internal`] with exactly two children
//! or a [`Branch::Leaf`] carrying a [`Species`]; the one-child state cannot
//! be represented. Pruning empties a node's slot, and that handle is never
//! reused.

use std::ops::{Index, IndexMut};

use crate::{
    species::Species,
    types::{Date, NodeId},
};

#[derive(Debug)]
pub enum Branch {
    Internal { children: [NodeId; 2] },
    Leaf(Species),
}

#[derive(Debug)]
pub struct BranchNode {
    pub parent: Option<NodeId>,
    /// Date at which the lineage bifurcated (internal nodes) or was last
    /// stamped (leaves: creation, extinction or a reporting stop).
    pub end_date: Date,
    pub branch: Branch,
}

impl BranchNode {
    pub fn new_leaf(species: Species, end_date: Date) -> Self {
        Self {
            parent: None,
            end_date,
            branch: Branch::Leaf(species),
        }
    }

    pub fn new_internal(parent: Option<NodeId>, children: [NodeId; 2], end_date: Date) -> Self {
        Self {
            parent,
            end_date,
            branch: Branch::Internal { children },
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.branch, Branch::Leaf(_))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn children(&self) -> Option<[NodeId; 2]> {
        match self.branch {
            Branch::Internal { children } => Some(children),
            Branch::Leaf(_) => None,
        }
    }

    pub fn species(&self) -> Option<&Species> {
        match &self.branch {
            Branch::Leaf(s) => Some(s),
            Branch::Internal { .. } => None,
        }
    }

    pub fn species_mut(&mut self) -> Option<&mut Species> {
        match &mut self.branch {
            Branch::Leaf(s) => Some(s),
            Branch::Internal { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Phylogeny {
    nodes: Vec<Option<BranchNode>>,
}

impl Phylogeny {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Stores a node and returns its handle.
    pub fn insert(&mut self, node: BranchNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    /// Releases a node from the arena.
    ///
    /// Links pointing at `id` are not touched; the caller detaches the node
    /// first.
    pub fn remove(&mut self, id: NodeId) -> Option<BranchNode> {
        self.nodes.get_mut(id).and_then(Option::take)
    }

    pub fn get(&self, id: NodeId) -> Option<&BranchNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut BranchNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    /// Mutable nodes at the given handles, which must be strictly ascending.
    ///
    /// Only the requested slots are visited; released handles are skipped.
    pub fn nodes_mut(
        &mut self,
        ids: impl IntoIterator<Item = NodeId>,
    ) -> impl Iterator<Item = &mut BranchNode> {
        let mut rest: &mut [Option<BranchNode>] = &mut self.nodes;
        let mut offset = 0;
        ids.into_iter().filter_map(move |id| {
            debug_assert!(id >= offset, "node handles must be strictly ascending");
            let skip = id.checked_sub(offset)?;
            let (slot, tail) = std::mem::take(&mut rest).get_mut(skip..)?.split_first_mut()?;
            rest = tail;
            offset = id + 1;
            slot.as_mut()
        })
    }

    /// Number of slots ever allocated, released ones included.
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(Option::is_none)
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self[id].parent = parent;
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> Option<[NodeId; 2]> {
        self[id].children()
    }

    /// Replaces `old` by `new` in the child slots of `parent`.
    ///
    /// The parent link of `new` is not updated.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if let Branch::Internal { children } = &mut self[parent].branch {
            for c in children.iter_mut() {
                if *c == old {
                    *c = new;
                }
            }
        }
    }

    /// The other child of `id`'s parent.
    pub fn sibling(&self, id: NodeId) -> Option<NodeId> {
        let [l, r] = self.children(self.parent(id)?)?;
        Some(if l == id { r } else { l })
    }

    #[inline]
    pub fn end_date(&self, id: NodeId) -> Date {
        self[id].end_date
    }

    pub fn set_end_date(&mut self, id: NodeId, date: Date) {
        self[id].end_date = date;
    }

    /// Own end-date minus the parent's end-date; `0` for a root.
    pub fn parent_distance(&self, id: NodeId) -> Date {
        match self.parent(id) {
            None => 0,
            Some(p) => {
                let (own, parent) = (self.end_date(id), self.end_date(p));
                debug_assert!(own >= parent, "node {id} ends before its parent");
                own.saturating_sub(parent)
            }
        }
    }

    /// Sum of parent distances from `id` up to the root.
    pub fn total_distance(&self, id: NodeId) -> Date {
        let mut total = 0;
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            total += self.parent_distance(cur);
            cur = p;
        }
        total
    }

    /// Number of ancestors between `id` and the root (0 for the root).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut n = 0;
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            n += 1;
            cur = p;
        }
        n
    }

    /// Length of the longest path from `id` down to a leaf.
    pub fn level(&self, id: NodeId) -> usize {
        let mut best = 0;
        let mut stack = vec![(id, 0usize)];
        while let Some((n, d)) = stack.pop() {
            match self.children(n) {
                Some([l, r]) => {
                    stack.push((l, d + 1));
                    stack.push((r, d + 1));
                }
                None => best = best.max(d),
            }
        }
        best
    }

    /// Handles of every node in the subtree rooted at `id`, in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some([l, r]) = self.children(n) {
                stack.push(r);
                stack.push(l);
            }
        }
        out
    }

    /// Number of edges in the subtree rooted at `id`.
    pub fn edges(&self, id: NodeId) -> usize {
        self.subtree(id).len() - 1
    }

    /// Number of leaves in the subtree rooted at `id`.
    pub fn leaves(&self, id: NodeId) -> usize {
        self.subtree(id)
            .into_iter()
            .filter(|&n| self[n].is_leaf())
            .count()
    }

    pub fn max_end_date(&self, id: NodeId) -> Date {
        self.subtree(id)
            .into_iter()
            .map(|n| self.end_date(n))
            .max()
            .unwrap_or(0)
    }

    /// Checks the binary structure of the subtree rooted at `id`.
    ///
    /// Every internal node must have two distinct live children whose parent
    /// link points back at it.
    pub fn strictly_binary(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some([l, r]) = self.children(n) {
                if l == r {
                    return false;
                }
                for c in [l, r] {
                    match self.get(c) {
                        Some(child) if child.parent == Some(n) => stack.push(c),
                        _ => return false,
                    }
                }
            }
        }
        true
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// End-date of the most recent common ancestor of two nodes.
    ///
    /// Walks the ancestors of `a`, then the ancestors of `b` until one of
    /// them is shared.
    ///
    /// ### Returns
    /// `None` if either node has no parent or the two share no ancestor.
    pub fn mrca_end_date(&self, a: NodeId, b: NodeId) -> Option<Date> {
        let seen: Vec<NodeId> = self.ancestors(a).collect();
        if seen.is_empty() {
            return None;
        }
        self.ancestors(b)
            .find(|n| seen.contains(n))
            .map(|n| self.end_date(n))
    }

    /// Renders the subtree rooted at `id` in Newick format.
    ///
    /// Internal nodes render as `(left,right):distance`, leaves as
    /// `species<id>:distance`; a `;` is appended when `id` is a root.
    pub fn newick(&self, id: NodeId) -> String {
        enum Step {
            Open(NodeId),
            Comma,
            Close(NodeId),
        }

        let mut out = String::new();
        let mut stack = vec![Step::Open(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(n) => match &self[n].branch {
                    Branch::Leaf(s) => {
                        out.push_str(&format!("{}:{}", s.name(), self.parent_distance(n)));
                    }
                    Branch::Internal { children: [l, r] } => {
                        out.push('(');
                        stack.push(Step::Close(n));
                        stack.push(Step::Open(*r));
                        stack.push(Step::Comma);
                        stack.push(Step::Open(*l));
                    }
                },
                Step::Comma => out.push(','),
                Step::Close(n) => {
                    out.push_str(&format!("):{}", self.parent_distance(n)));
                }
            }
        }

        if self[id].is_root() {
            out.push(';');
        }
        out
    }
}

impl Index<NodeId> for Phylogeny {
    type Output = BranchNode;

    /// ### Panics
    /// Panics if `id` was never issued or has been pruned.
    fn index(&self, id: NodeId) -> &BranchNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("phylogeny node {id} does not exist"),
        }
    }
}

impl IndexMut<NodeId> for Phylogeny {
    fn index_mut(&mut self, id: NodeId) -> &mut BranchNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("phylogeny node {id} does not exist"),
        }
    }
}
