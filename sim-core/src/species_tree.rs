//! Phylogeny of the extant species and its two mutations: speciation and
//! removal of extinct tips.

use std::collections::BTreeMap;

use crate::{
    phylogeny::{Branch, BranchNode, Phylogeny},
    species::Species,
    types::{Date, NodeId, SpeciesId},
};

#[derive(Debug)]
pub struct SpeciesTree {
    phylogeny: Phylogeny,
    root: Option<NodeId>,
    /// Extant species, keyed by id, pointing at their leaf.
    tips: BTreeMap<SpeciesId, NodeId>,
    start_date: Date,
    next_id: SpeciesId,
}

impl SpeciesTree {
    /// Creates a tree holding one species (id `0`) with the given traits.
    ///
    /// The species is both the root and the only tip.
    pub fn new(traits: Vec<f64>) -> Self {
        let mut phylogeny = Phylogeny::new();
        let node = phylogeny.insert(BranchNode::new_leaf(Species::new(0, traits), 0));
        Self {
            phylogeny,
            root: Some(node),
            tips: BTreeMap::from([(0, node)]),
            start_date: 0,
            next_id: 1,
        }
    }

    pub fn phylogeny(&self) -> &Phylogeny {
        &self.phylogeny
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Date the current root was established.
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    pub fn num_species(&self) -> usize {
        self.tips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    /// Ids of the extant species, ascending.
    pub fn tip_ids(&self) -> Vec<SpeciesId> {
        self.tips.keys().copied().collect()
    }

    /// Extant species in id order.
    pub fn tips(&self) -> impl Iterator<Item = &Species> {
        self.tips
            .values()
            .filter_map(|&node| self.phylogeny.get(node)?.species())
    }

    /// Leaf handles grow with species ids, so the walk is ascending.
    pub fn tips_mut(&mut self) -> impl Iterator<Item = &mut Species> {
        self.phylogeny
            .nodes_mut(self.tips.values().copied())
            .filter_map(BranchNode::species_mut)
    }

    /// Leaf handle of an extant species.
    pub fn node_of(&self, id: SpeciesId) -> Option<NodeId> {
        self.tips.get(&id).copied()
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.phylogeny.get(self.node_of(id)?)?.species()
    }

    pub fn species_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        let node = self.node_of(id)?;
        self.phylogeny.get_mut(node)?.species_mut()
    }

    /// Total number of occupied sites over all extant species.
    pub fn total_population(&self) -> usize {
        self.tips().map(Species::population_count).sum()
    }

    /// End-date of the most recent common ancestor of two extant species.
    ///
    /// `None` if either is unknown or has no parent.
    pub fn mrca_date(&self, a: SpeciesId, b: SpeciesId) -> Option<Date> {
        self.phylogeny
            .mrca_end_date(self.node_of(a)?, self.node_of(b)?)
    }

    /// Splits `parent` into two sister lineages at `date`.
    ///
    /// A new internal node dated `date` takes the parent's place in the tree
    /// (becoming the root if the parent was the root, in which case the
    /// start date accumulates `date`). The original species and a freshly
    /// numbered one hang below it; the new species copies the parent's
    /// current traits and starts without any site.
    ///
    /// ### Returns
    /// The id of the new species.
    ///
    /// ### Panics
    /// Panics if `parent` is not an extant species.
    pub fn speciate(&mut self, parent: SpeciesId, date: Date) -> SpeciesId {
        let s0 = self.tips[&parent];
        let grandparent = self.phylogeny.parent(s0);
        let traits = self.phylogeny[s0]
            .species()
            .map(|s| s.traits().to_vec())
            .unwrap_or_default();

        let new_id = self.next_id;
        self.next_id += 1;

        let s1 = self
            .phylogeny
            .insert(BranchNode::new_leaf(Species::new(new_id, traits), date));
        let split = self
            .phylogeny
            .insert(BranchNode::new_internal(grandparent, [s0, s1], date));

        match grandparent {
            Some(g) => self.phylogeny.replace_child(g, s0, split),
            None => {
                self.root = Some(split);
                self.start_date += date;
            }
        }

        self.phylogeny.set_parent(s0, Some(split));
        self.phylogeny.set_parent(s1, Some(split));
        self.phylogeny.set_end_date(s0, date);

        self.tips.insert(new_id, s1);
        new_id
    }

    /// Prunes every tip without population.
    ///
    /// Each extinct tip is stamped with `date` and excised. Its parent node
    /// is dropped as well and the sibling takes the parent's place, so no
    /// unary node remains. If the parent was the root, the sibling becomes
    /// the root and the start date moves to the sibling's end date. If the
    /// extinct tip was the root itself the tree becomes empty.
    ///
    /// ### Returns
    /// The removed species, in id order.
    pub fn remove_extinct(&mut self, date: Date) -> Vec<Species> {
        let extinct: Vec<(SpeciesId, NodeId)> = self
            .tips
            .iter()
            .filter(|&(_, &node)| {
                self.phylogeny[node]
                    .species()
                    .is_some_and(Species::is_extinct)
            })
            .map(|(&id, &node)| (id, node))
            .collect();

        let mut removed = Vec::with_capacity(extinct.len());
        for (id, node) in extinct {
            self.phylogeny.set_end_date(node, date);

            if self.root == Some(node) {
                self.root = None;
            } else if let (Some(parent), Some(sibling)) =
                (self.phylogeny.parent(node), self.phylogeny.sibling(node))
            {
                match self.phylogeny.parent(parent) {
                    None => {
                        self.root = Some(sibling);
                        self.phylogeny.set_parent(sibling, None);
                        self.start_date = self.phylogeny.end_date(sibling);
                    }
                    Some(grandparent) => {
                        self.phylogeny.set_parent(sibling, Some(grandparent));
                        self.phylogeny.replace_child(grandparent, parent, sibling);
                    }
                }
                self.phylogeny.remove(parent);
            }

            self.tips.remove(&id);
            if let Some(species) = self
                .phylogeny
                .remove(node)
                .and_then(|n| match n.branch {
                    Branch::Leaf(s) => Some(s),
                    Branch::Internal { .. } => None,
                })
            {
                removed.push(species);
            }
        }
        removed
    }

    /// Stamps every tip with `date` without touching the topology.
    pub fn stop(&mut self, date: Date) {
        let nodes: Vec<NodeId> = self.tips.values().copied().collect();
        for node in nodes {
            self.phylogeny.set_end_date(node, date);
        }
    }

    /// The whole tree in Newick format, or `;` when empty.
    pub fn newick(&self) -> String {
        match self.root {
            Some(root) => self.phylogeny.newick(root),
            None => ";".to_string(),
        }
    }

    /// Checks the binary structure from the root and that every tip is a
    /// leaf reachable from it.
    pub fn strictly_binary(&self) -> bool {
        let Some(root) = self.root else {
            return self.tips.is_empty();
        };
        if !self.phylogeny.strictly_binary(root) {
            return false;
        }
        let reachable = self.phylogeny.subtree(root);
        self.tips
            .values()
            .all(|n| reachable.contains(n) && self.phylogeny[*n].is_leaf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn occupy(tree: &mut SpeciesTree, id: SpeciesId, x: f64) {
        tree.species_mut(id).unwrap().add_to(Point::new(x, 0.0));
    }

    #[test]
    fn new_tree_has_single_root_species() {
        let tree = SpeciesTree::new(vec![0.1, 0.2]);
        assert_eq!(tree.num_species(), 1);
        assert_eq!(tree.tip_ids(), vec![0]);
        assert_eq!(tree.start_date(), 0);
        assert_eq!(tree.newick(), "species0:0;");
        assert!(tree.strictly_binary());
    }

    #[test]
    fn speciate_sole_species_creates_new_root() {
        let mut tree = SpeciesTree::new(vec![0.3, -0.1]);
        let new = tree.speciate(0, 4);

        assert_eq!(new, 1);
        assert_eq!(tree.num_species(), 2);
        assert_eq!(tree.species(1).unwrap().traits(), &[0.3, -0.1]);
        assert_eq!(tree.start_date(), 4);
        assert!(tree.strictly_binary());

        tree.stop(6);
        assert_eq!(tree.newick(), "(species0:2,species1:2):0;");
    }

    #[test]
    fn speciate_nested_species_keeps_tree_binary() {
        let mut tree = SpeciesTree::new(vec![]);
        tree.speciate(0, 1);
        tree.speciate(1, 3);
        tree.speciate(0, 5);

        assert_eq!(tree.num_species(), 4);
        assert!(tree.strictly_binary());
        assert_eq!(tree.phylogeny().leaves(tree.root().unwrap()), 4);

        tree.stop(8);
        assert_eq!(
            tree.newick(),
            "((species0:3,species3:3):4,(species1:5,species2:5):2):0;"
        );
        assert_eq!(tree.mrca_date(1, 2), Some(3));
        assert_eq!(tree.mrca_date(0, 2), Some(1));
    }

    #[test]
    fn new_species_copies_current_parent_traits() {
        let mut tree = SpeciesTree::new(vec![0.0, 0.0]);
        tree.species_mut(0).unwrap().traits_mut()[1] = 0.25;
        let id = tree.speciate(0, 2);
        assert_eq!(tree.species(id).unwrap().traits(), &[0.0, 0.25]);

        tree.species_mut(id).unwrap().traits_mut()[0] = 0.1;
        assert_eq!(tree.species(0).unwrap().traits(), &[0.0, 0.25]);
    }

    #[test]
    fn remove_extinct_sole_root_empties_tree() {
        let mut tree = SpeciesTree::new(vec![]);
        let removed = tree.remove_extinct(3);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.newick(), ";");
        assert!(tree.strictly_binary());
    }

    #[test]
    fn remove_extinct_child_of_root_promotes_sibling() {
        let mut tree = SpeciesTree::new(vec![]);
        tree.speciate(0, 2);
        tree.speciate(1, 5);
        occupy(&mut tree, 1, 0.1);
        occupy(&mut tree, 2, 0.2);

        let removed = tree.remove_extinct(7);
        assert_eq!(removed.iter().map(Species::id).collect::<Vec<_>>(), vec![0]);
        assert_eq!(tree.tip_ids(), vec![1, 2]);
        assert_eq!(tree.start_date(), 5);
        assert!(tree.strictly_binary());

        tree.stop(9);
        assert_eq!(tree.newick(), "(species1:4,species2:4):0;");
    }

    #[test]
    fn remove_extinct_deep_tip_splices_sibling_into_grandparent() {
        let mut tree = SpeciesTree::new(vec![]);
        tree.speciate(0, 1);
        tree.speciate(1, 3);
        occupy(&mut tree, 0, 0.1);
        occupy(&mut tree, 2, 0.2);

        let before = tree.phylogeny().len();
        let removed = tree.remove_extinct(4);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), 1);
        assert_eq!(tree.phylogeny().len(), before - 2);
        assert!(tree.strictly_binary());
        assert!(tree.tips().all(|s| !s.is_extinct()));

        tree.stop(6);
        assert_eq!(tree.newick(), "(species0:5,species2:5):0;");
    }

    #[test]
    fn remove_extinct_handles_both_children_of_root() {
        let mut tree = SpeciesTree::new(vec![]);
        tree.speciate(0, 1);

        let removed = tree.remove_extinct(2);
        assert_eq!(removed.len(), 2);
        assert!(tree.is_empty());
        assert_eq!(tree.newick(), ";");
    }

    #[test]
    fn stop_stamps_tips_only() {
        let mut tree = SpeciesTree::new(vec![]);
        tree.speciate(0, 3);
        tree.stop(10);

        let root = tree.root().unwrap();
        assert_eq!(tree.phylogeny().end_date(root), 3);
        for id in tree.tip_ids() {
            assert_eq!(tree.phylogeny().end_date(tree.node_of(id).unwrap()), 10);
        }
    }

    #[test]
    fn tips_only_see_live_species_after_many_prunings() {
        let mut tree = SpeciesTree::new(vec![0.0]);
        occupy(&mut tree, 0, 0.5);
        for date in 1..=1000 {
            // The fresh lineage has no site and is pruned right away.
            let child = tree.speciate(0, date);
            tree.remove_extinct(date);
            assert!(tree.node_of(child).is_none());
        }

        assert_eq!(tree.phylogeny().len(), 1);
        assert!(tree.phylogeny().slots() > 1000);
        assert_eq!(tree.tips().count(), 1);
        assert_eq!(tree.tips_mut().count(), 1);
        assert!(tree.strictly_binary());
        assert_eq!(tree.tips_mut().map(|s| s.id()).collect::<Vec<_>>(), vec![0]);
    }
}
