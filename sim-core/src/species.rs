//! Species: the payload carried by leaves of the phylogeny.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{
    network::Network,
    point::{self, Point},
    types::{GroupId, SpeciesId},
};

/// One extant lineage: where it lives and its trait state.
///
/// Each occupied site carries a dispersal-group tag. Tags are `None`
/// ("ungrouped") until [`Species::recompute_groups`] runs and are reset to
/// `None` whenever a site is (re)added, so stale tags are never read.
///
/// Equality and ordering look at [`Species::id`] only.
#[derive(Clone, Debug)]
pub struct Species {
    id: SpeciesId,
    traits: Vec<f64>,
    locations: BTreeMap<Point, Option<GroupId>>,
    groups: usize,
}

impl Species {
    pub fn new(id: SpeciesId, traits: Vec<f64>) -> Self {
        Self {
            id,
            traits,
            locations: BTreeMap::new(),
            groups: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> SpeciesId {
        self.id
    }

    pub fn name(&self) -> String {
        format!("species{}", self.id)
    }

    pub fn traits(&self) -> &[f64] {
        &self.traits
    }

    pub fn traits_mut(&mut self) -> &mut Vec<f64> {
        &mut self.traits
    }

    pub fn same_traits_as(&self, other: &Species) -> bool {
        self.traits == other.traits
    }

    /// Marks `p` as occupied and ungrouped.
    pub fn add_to(&mut self, p: Point) {
        self.locations.insert(p, None);
    }

    pub fn add_all(&mut self, points: impl IntoIterator<Item = Point>) {
        for p in points {
            self.add_to(p);
        }
    }

    /// Vacates `p`; no-op if the site is not occupied.
    pub fn remove_from(&mut self, p: &Point) {
        self.locations.remove(p);
    }

    #[inline]
    pub fn is_occupied(&self, p: &Point) -> bool {
        self.locations.contains_key(p)
    }

    #[inline]
    pub fn population_count(&self) -> usize {
        self.locations.len()
    }

    #[inline]
    pub fn is_extinct(&self) -> bool {
        self.locations.is_empty()
    }

    /// Occupied sites in point order.
    pub fn locations(&self) -> impl Iterator<Item = &Point> {
        self.locations.keys()
    }

    /// Occupied sites with their group tags, in point order.
    pub fn grouped_locations(&self) -> impl Iterator<Item = (&Point, Option<GroupId>)> {
        self.locations.iter().map(|(p, g)| (p, *g))
    }

    /// Group tag of an occupied site; `None` if absent or ungrouped.
    pub fn group_of(&self, p: &Point) -> Option<GroupId> {
        self.locations.get(p).copied().flatten()
    }

    /// Number of groups found by the last [`Species::recompute_groups`].
    pub fn num_groups(&self) -> usize {
        self.groups
    }

    pub fn centroid(&self) -> Option<Point> {
        point::centroid(self.locations.keys())
    }

    /// Sites occupied by both species.
    pub fn shared_sites(&self, other: &Species) -> BTreeSet<Point> {
        self.locations
            .keys()
            .filter(|p| other.is_occupied(p))
            .copied()
            .collect()
    }

    /// Splits the occupied sites into dispersal groups.
    ///
    /// Two sites are in the same group when they are linked by a path of
    /// landscape edges that stays inside this species' occupied set. Group
    /// ids are handed out from `0` in point order of the first site reached.
    ///
    /// ### Parameters
    /// - `landscape` - Network whose vertex set contains every occupied site.
    ///
    /// ### Returns
    /// The number of distinct groups.
    pub fn recompute_groups(&mut self, landscape: &Network<Point>) -> usize {
        for tag in self.locations.values_mut() {
            *tag = None;
        }

        let sites: Vec<Point> = self.locations.keys().copied().collect();
        let mut next: GroupId = 0;
        let mut stack = Vec::new();

        for site in sites {
            if self.locations[&site].is_some() {
                continue;
            }
            let gid = next;
            next += 1;

            self.locations.insert(site, Some(gid));
            stack.push(site);
            while let Some(p) = stack.pop() {
                for n in landscape.neighbors(&p) {
                    if let Some(tag) = self.locations.get_mut(n)
                        && tag.is_none()
                    {
                        *tag = Some(gid);
                        stack.push(*n);
                    }
                }
            }
        }

        self.groups = next;
        next
    }

    /// Removes every site tagged `group` and returns them.
    ///
    /// Returns an empty set if no site carries that tag (for instance when
    /// the group was already extracted).
    pub fn extract_group(&mut self, group: GroupId) -> BTreeSet<Point> {
        let extracted: BTreeSet<Point> = self
            .locations
            .iter()
            .filter(|(_, g)| **g == Some(group))
            .map(|(p, _)| *p)
            .collect();
        self.locations.retain(|p, _| !extracted.contains(p));
        extracted
    }
}

impl PartialEq for Species {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Species {}

impl PartialOrd for Species {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Species {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<species> <id>{}</id> </species>", self.id)
    }
}
