//! # Memo
//!
//! The memo is the store of equivalence classes ("groups") for one query
//! compilation. Each group holds one or more candidate plan shapes believed to
//! produce the same result, and one of them is the group's *representative*:
//! the shape every placeholder pointing at the group currently stands for.
//!
//! ## Layout
//!
//! Groups live in an arena indexed by [`GroupId`]. Ids are handed out
//! sequentially and never reused. Candidates are [`PlanNode`]s whose children
//! are all [`PlanNode::GroupReference`]s, so a candidate never owns another
//! candidate. Parent links are plain ids stored on the child group: group `C`
//! records `P` as a parent when some candidate of `P` references `C`.
//!
//! ## Deduplication
//!
//! A structural index maps every candidate to the group it first entered.
//! Inserting a concrete subtree that already exists somewhere in the memo
//! reuses that group, which is how two parents come to share one sub-plan.
//! Adding a candidate a group already holds is a no-op.
//!
//! ## Representatives
//!
//! The first candidate of a group is its initial representative. A later
//! candidate replaces it only if the cost model ranks it strictly better, so
//! ties keep the earlier candidate. [`Memo::replace_group`] skips the ranking
//! and retires every other candidate of the group: retired candidates stay in
//! the group for deduplication but never win a ranking again.
//!
//! Whenever a representative changes, the exploration flags of the group and
//! of every group above it are cleared, and the groups above it are marked
//! stale: their resolved shape changed even though their own candidates did
//! not, so their ranking may no longer hold. [`Memo::rerank`] ranks the live
//! candidates of a stale group again.

use crate::cost::{CostModel, DefaultCostModel};
use crate::error::{OptimizerError, Result};
use crate::lookup::Lookup;
use crate::plan::{PlanNode, PlanRef};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

pub type GroupId = u32;

/// What happened when a candidate was offered to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The group already held a structurally equal candidate.
    Duplicate,
    /// Stored as a competing candidate; the representative is unchanged.
    Added,
    /// Stored and made the group's representative.
    NewRepresentative,
}

impl Insertion {
    pub fn is_change(self) -> bool {
        self != Insertion::Duplicate
    }
}

/// An equivalence class of plan shapes.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    candidates: Vec<PlanRef>,
    representative: usize,
    parents: BTreeSet<GroupId>,
    /// Candidates superseded by a forced replacement.
    retired: BTreeSet<usize>,
    /// A descendant's representative changed since this group was ranked.
    stale: bool,
    /// Rules (by hash) this group's current representative was offered to.
    explored: HashSet<u64>,
}

impl Group {
    fn new(id: GroupId, candidate: PlanRef) -> Self {
        Self {
            id,
            candidates: vec![candidate],
            representative: 0,
            parents: BTreeSet::new(),
            retired: BTreeSet::new(),
            stale: false,
            explored: HashSet::new(),
        }
    }

    /// Make `pos` the representative and retire every other candidate.
    fn pin(&mut self, pos: usize) {
        self.representative = pos;
        self.retired = (0..self.candidates.len()).filter(|&i| i != pos).collect();
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Candidates in insertion order.
    pub fn candidates(&self) -> &[PlanRef] {
        &self.candidates
    }

    pub fn representative(&self) -> &PlanRef {
        &self.candidates[self.representative]
    }

    pub fn representative_index(&self) -> usize {
        self.representative
    }

    /// Candidates still eligible to become the representative.
    pub fn live_candidates(&self) -> impl Iterator<Item = &PlanRef> + '_ {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.retired.contains(i))
            .map(|(_, c)| c)
    }

    pub fn is_retired(&self, pos: usize) -> bool {
        self.retired.contains(&pos)
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn parents(&self) -> &BTreeSet<GroupId> {
        &self.parents
    }

    pub fn is_explored(&self, rule_hash: u64) -> bool {
        self.explored.contains(&rule_hash)
    }

    pub fn contains(&self, candidate: &PlanNode) -> bool {
        self.candidates.iter().any(|c| c.as_ref() == candidate)
    }
}

pub struct Memo {
    groups: Vec<Group>,
    index: HashMap<PlanRef, GroupId>,
    cost_model: Arc<dyn CostModel>,
}

impl Memo {
    /// An empty memo ranking candidates with [`DefaultCostModel`].
    pub fn new() -> Self {
        Self::with_cost_model(Arc::new(DefaultCostModel::default()))
    }

    pub fn with_cost_model(cost_model: Arc<dyn CostModel>) -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
            cost_model,
        }
    }

    pub fn cost_model(&self) -> &Arc<dyn CostModel> {
        &self.cost_model
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Total number of candidates across all groups.
    pub fn num_candidates(&self) -> usize {
        self.groups.iter().map(|g| g.candidates.len()).sum()
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.iter().map(|g| g.id)
    }

    pub fn group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(id as usize)
            .ok_or(OptimizerError::UnknownGroup(id))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group> {
        self.groups
            .get_mut(id as usize)
            .ok_or(OptimizerError::UnknownGroup(id))
    }

    /// Current representative of `id`. Its children are placeholders.
    pub fn representative(&self, id: GroupId) -> Result<PlanRef> {
        Ok(self.group(id)?.representative().clone())
    }

    pub fn is_explored(&self, id: GroupId, rule_hash: u64) -> Result<bool> {
        Ok(self.group(id)?.is_explored(rule_hash))
    }

    pub fn mark_explored(&mut self, id: GroupId, rule_hash: u64) -> Result<()> {
        self.group_mut(id)?.explored.insert(rule_hash);
        Ok(())
    }

    /// Insert a plan tree, one group per node, and return the root's group.
    ///
    /// Placeholders are kept as they are. Concrete children are inserted
    /// first and replaced by placeholders. A node equal to an existing
    /// candidate resolves to that candidate's group instead of a new one.
    pub fn insert(&mut self, node: &PlanRef) -> Result<GroupId> {
        if let Some(id) = node.group_id() {
            self.group(id)?;
            return Ok(id);
        }
        let candidate = self.normalize(node)?;
        if let Some(&id) = self.index.get(candidate.as_ref()) {
            trace!("Reusing group {} for {}", id, candidate.header());
            return Ok(id);
        }
        Ok(self.new_group(candidate))
    }

    /// Offer `node` as an alternative for group `id`, ranked by the cost model.
    pub fn add_candidate(&mut self, id: GroupId, node: &PlanRef) -> Result<Insertion> {
        self.insert_candidate(id, node, false)
    }

    /// Add `node` to group `id` and make it the representative regardless of cost.
    pub fn replace_group(&mut self, id: GroupId, node: &PlanRef) -> Result<Insertion> {
        self.insert_candidate(id, node, true)
    }

    fn insert_candidate(&mut self, id: GroupId, node: &PlanRef, force: bool) -> Result<Insertion> {
        self.group(id)?;

        // A bare placeholder says "group `id` is equivalent to group `other`";
        // take over the other group's current shape.
        let node = match node.group_id() {
            Some(other) if other == id => return Ok(Insertion::Duplicate),
            Some(other) => self.representative(other)?,
            None => node.clone(),
        };

        let candidate = self.normalize(&node)?;
        if self.reaches(&candidate, id)? {
            return Err(OptimizerError::SelfReference(id));
        }
        self.check_shape(id, &candidate)?;

        let group = self.group(id)?;
        if let Some(pos) = group.candidates.iter().position(|c| c == &candidate) {
            if !force {
                return Ok(Insertion::Duplicate);
            }
            let moved = pos != group.representative;
            self.group_mut(id)?.pin(pos);
            if !moved {
                return Ok(Insertion::Duplicate);
            }
            self.representative_changed(id);
            return Ok(Insertion::NewRepresentative);
        }

        let wins = force || {
            let current = group.representative().clone();
            let model = Arc::clone(&self.cost_model);
            model.compare(&candidate, &current, self)? == Ordering::Less
        };

        self.link_children(id, &candidate);
        self.index.entry(candidate.clone()).or_insert(id);
        let group = self.group_mut(id)?;
        group.candidates.push(candidate);
        trace!(
            "Group {} now has {} candidates (forced={})",
            id,
            group.candidates.len(),
            force
        );

        if wins {
            let pos = group.candidates.len() - 1;
            if force {
                group.pin(pos);
            } else {
                group.representative = pos;
            }
            self.representative_changed(id);
            Ok(Insertion::NewRepresentative)
        } else {
            Ok(Insertion::Added)
        }
    }

    /// Rank the live candidates of a stale group again and return whether the
    /// representative moved. Ties go to the earlier candidate; a candidate
    /// that would make the group its own descendant is skipped.
    pub fn rerank(&mut self, id: GroupId) -> Result<bool> {
        let this: &Memo = self;
        let group = this.group(id)?;
        if !group.stale {
            return Ok(false);
        }
        let current = group.representative;
        let mut best = current;
        for (pos, candidate) in group.candidates.iter().enumerate() {
            if pos == current || group.retired.contains(&pos) {
                continue;
            }
            let order = this
                .cost_model
                .compare(candidate, &group.candidates[best], this)?;
            let wins = order == Ordering::Less || (order == Ordering::Equal && pos < best);
            if wins && !this.reaches(candidate, id)? {
                best = pos;
            }
        }

        let group = self.group_mut(id)?;
        group.stale = false;
        if best == current {
            return Ok(false);
        }
        trace!(
            "Re-ranked group {}: representative {} -> {}",
            id,
            current,
            best
        );
        group.representative = best;
        self.representative_changed(id);
        Ok(true)
    }

    /// Replace concrete children by placeholders, inserting them as needed.
    fn normalize(&mut self, node: &PlanRef) -> Result<PlanRef> {
        let children = node.children();
        let mut changed = false;
        let mut placeholders = Vec::with_capacity(children.len());
        for child in children {
            match child.group_id() {
                Some(id) => {
                    self.group(id)?;
                    placeholders.push(child);
                }
                None => {
                    let id = self.insert(&child)?;
                    placeholders.push(PlanNode::group(id));
                    changed = true;
                }
            }
        }
        if changed {
            node.with_new_children(placeholders)
        } else {
            Ok(node.clone())
        }
    }

    /// Whether `target` is reachable from `candidate`'s children through
    /// current representatives. Such a candidate would make the group its own
    /// descendant.
    fn reaches(&self, candidate: &PlanNode, target: GroupId) -> Result<bool> {
        let mut stack: Vec<GroupId> = candidate
            .children()
            .iter()
            .filter_map(|c| c.group_id())
            .collect();
        let mut seen = HashSet::new();
        while let Some(gid) = stack.pop() {
            if gid == target {
                return Ok(true);
            }
            if !seen.insert(gid) {
                continue;
            }
            let rep = self.representative(gid)?;
            stack.extend(rep.children().iter().filter_map(|c| c.group_id()));
        }
        Ok(false)
    }

    fn new_group(&mut self, candidate: PlanRef) -> GroupId {
        let id = self.groups.len() as GroupId;
        self.link_children(id, &candidate);
        trace!("Created group {} for {}", id, candidate.header());
        self.index.insert(candidate.clone(), id);
        self.groups.push(Group::new(id, candidate));
        id
    }

    fn link_children(&mut self, parent: GroupId, candidate: &PlanNode) {
        for child in candidate.children() {
            if let Some(group) = child
                .group_id()
                .and_then(|c| self.groups.get_mut(c as usize))
            {
                group.parents.insert(parent);
            }
        }
    }

    /// Cheap equivalence check: both shapes must produce the same number of
    /// columns whenever that number is known for both.
    fn check_shape(&self, id: GroupId, candidate: &PlanNode) -> Result<()> {
        let current = self.representative(id)?;
        let expected = current.output_width(self)?;
        let actual = candidate.output_width(self)?;
        match (expected, actual) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(OptimizerError::ArityMismatch {
                    group: id,
                    expected,
                    actual,
                })
            }
            _ => Ok(()),
        }
    }

    /// Clear exploration flags on `id` and all of its transitive parents,
    /// and mark the parents stale.
    fn representative_changed(&mut self, id: GroupId) {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(gid) = stack.pop() {
            if !seen.insert(gid) {
                continue;
            }
            if let Some(group) = self.groups.get_mut(gid as usize) {
                group.explored.clear();
                group.stale |= gid != id;
                stack.extend(group.parents.iter().copied());
            }
        }
        trace!("Representative of group {} changed, invalidated {} groups", id, seen.len());
    }
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}

impl Lookup for Memo {
    fn resolve_group(&self, id: GroupId) -> Result<PlanRef> {
        self.representative(id)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("groups", &self.groups.len())
            .field("candidates", &self.num_candidates())
            .finish_non_exhaustive()
    }
}

/// Dump of every group, the representative marked with `*`.
impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            write!(f, "Group#{}", group.id)?;
            if !group.parents.is_empty() {
                let parents: Vec<String> = group.parents.iter().map(|p| p.to_string()).collect();
                write!(f, " (parents: {})", parents.join(", "))?;
            }
            writeln!(f)?;
            for (i, candidate) in group.candidates.iter().enumerate() {
                let marker = if i == group.representative {
                    '*'
                } else if group.retired.contains(&i) {
                    '-'
                } else {
                    ' '
                };
                write!(f, "  {marker} {}", candidate.header())?;
                let children: Vec<String> = candidate
                    .children()
                    .iter()
                    .filter_map(|c| c.group_id())
                    .map(|c| format!("#{c}"))
                    .collect();
                if !children.is_empty() {
                    write!(f, " -> {}", children.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Cost;
    use crate::expr::{ColumnRef, Expr, JoinType, TableRef};

    fn scan(name: &str) -> PlanRef {
        PlanNode::scan(TableRef::new("s", name), vec![ColumnRef::new(name, "a")])
    }

    fn pred(v: i64) -> Expr {
        Expr::equals(Expr::col("t", "a"), Expr::int(v))
    }

    /// Ranks candidates by node count of their own level, preferring Limit.
    struct PreferLimit;

    impl CostModel for PreferLimit {
        fn compute_cost(&self, node: &PlanNode, _lookup: &dyn Lookup) -> Result<Cost> {
            Ok(match node {
                PlanNode::Limit { .. } => Cost::new(1.0),
                _ => Cost::new(10.0),
            })
        }
    }

    /// Costs that depend on the children, so a child's new representative
    /// can reorder its parent's candidates.
    struct Weighted;

    impl CostModel for Weighted {
        fn compute_cost(&self, node: &PlanNode, lookup: &dyn Lookup) -> Result<Cost> {
            let cost = |child: &PlanRef| -> Result<f64> {
                Ok(self.compute_cost(&*lookup.resolve(child)?, lookup)?.total)
            };
            let total = match node {
                PlanNode::Filter { input, .. } => 0.1 * cost(input)?,
                PlanNode::Sort { input, .. } => 10.0 + cost(input)?,
                PlanNode::Limit { input, .. } => 100.0 + cost(input)?,
                PlanNode::Join { left, right, .. } => 10.0 * cost(left)? + cost(right)?,
                PlanNode::GroupReference(id) => {
                    self.compute_cost(&*lookup.resolve_group(*id)?, lookup)?.total
                }
                _ => 1.0,
            };
            Ok(Cost::new(total))
        }
    }

    #[test]
    fn test_insert_creates_one_group_per_node() {
        let mut memo = Memo::new();
        let plan = PlanNode::project(
            vec![Expr::col("t", "a")],
            vec!["a".into()],
            PlanNode::filter(pred(1), scan("t")),
        );
        let root = memo.insert(&plan).unwrap();
        assert_eq!(memo.num_groups(), 3);
        assert_eq!(memo.num_candidates(), 3);

        let rep = memo.representative(root).unwrap();
        let PlanNode::Project { input, .. } = rep.as_ref() else {
            panic!("expected Project, got {rep:?}");
        };
        let filter_group = input.group_id().unwrap();
        assert_eq!(memo.group(filter_group).unwrap().parents(), &BTreeSet::from([root]));
    }

    #[test]
    fn test_insert_shares_identical_subtrees() {
        let mut memo = Memo::new();
        let plan = PlanNode::join(JoinType::Inner, Expr::bool(true), scan("t"), scan("t"));
        let root = memo.insert(&plan).unwrap();
        assert_eq!(memo.num_groups(), 2);
        let rep = memo.representative(root).unwrap();
        let children = rep.children();
        assert_eq!(children[0], children[1]);
    }

    #[test]
    fn test_unknown_group_is_an_error() {
        let mut memo = Memo::new();
        assert!(matches!(memo.group(0), Err(OptimizerError::UnknownGroup(0))));
        assert!(matches!(
            memo.insert(&PlanNode::filter(pred(1), PlanNode::group(9))),
            Err(OptimizerError::UnknownGroup(9))
        ));
        assert!(memo.add_candidate(4, &scan("t")).is_err());
    }

    #[test]
    fn test_duplicate_candidate_is_ignored() {
        let mut memo = Memo::new();
        let root = memo.insert(&PlanNode::filter(pred(1), scan("t"))).unwrap();
        let again = PlanNode::filter(pred(1), scan("t"));
        assert_eq!(memo.add_candidate(root, &again).unwrap(), Insertion::Duplicate);
        assert_eq!(memo.group(root).unwrap().candidates().len(), 1);
    }

    #[test]
    fn test_cost_ranking_and_first_inserted_tie_break() {
        let mut memo = Memo::with_cost_model(Arc::new(PreferLimit));
        let child = memo.insert(&scan("t")).unwrap();
        let root = memo
            .insert(&PlanNode::filter(pred(1), PlanNode::group(child)))
            .unwrap();

        // Same cost as the current representative: stays a competitor.
        let tie = PlanNode::filter(pred(2), PlanNode::group(child));
        assert_eq!(memo.add_candidate(root, &tie).unwrap(), Insertion::Added);
        assert_eq!(memo.group(root).unwrap().representative_index(), 0);

        let cheaper = PlanNode::limit(0, 5, PlanNode::group(child));
        assert_eq!(
            memo.add_candidate(root, &cheaper).unwrap(),
            Insertion::NewRepresentative
        );
        assert_eq!(memo.representative(root).unwrap(), cheaper);
    }

    #[test]
    fn test_replace_forces_representative() {
        let mut memo = Memo::with_cost_model(Arc::new(PreferLimit));
        let root = memo.insert(&PlanNode::limit(0, 1, scan("t"))).unwrap();
        let child = memo.insert(&scan("t")).unwrap();
        let worse = PlanNode::filter(pred(1), PlanNode::group(child));
        assert_eq!(memo.replace_group(root, &worse).unwrap(), Insertion::NewRepresentative);
        assert_eq!(memo.representative(root).unwrap(), worse);

        // Forcing an existing candidate back switches without growing the group.
        let original = PlanNode::limit(0, 1, PlanNode::group(child));
        assert_eq!(
            memo.replace_group(root, &original).unwrap(),
            Insertion::NewRepresentative
        );
        assert_eq!(memo.group(root).unwrap().candidates().len(), 2);
    }

    #[test]
    fn test_placeholder_replacement_takes_over_shape() {
        let mut memo = Memo::new();
        let root = memo
            .insert(&PlanNode::filter(Expr::bool(true), scan("t")))
            .unwrap();
        let PlanNode::Filter { input, .. } = memo.representative(root).unwrap().as_ref().clone()
        else {
            panic!("expected Filter");
        };
        memo.replace_group(root, &input).unwrap();
        assert_eq!(memo.representative(root).unwrap(), scan("t"));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut memo = Memo::new();
        let root = memo.insert(&scan("t")).unwrap();
        let cyclic = PlanNode::filter(pred(1), PlanNode::group(root));
        assert!(matches!(
            memo.add_candidate(root, &cyclic),
            Err(OptimizerError::SelfReference(0))
        ));
    }

    #[test]
    fn test_indirect_self_reference_is_rejected() {
        let mut memo = Memo::new();
        let root = memo
            .insert(&PlanNode::limit(0, 1, PlanNode::filter(pred(1), scan("t"))))
            .unwrap();
        let filter_group = 1;
        let cyclic = PlanNode::sort(vec![], PlanNode::group(root));
        assert!(matches!(
            memo.add_candidate(filter_group, &cyclic),
            Err(OptimizerError::SelfReference(1))
        ));
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let mut memo = Memo::new();
        let two_columns = PlanNode::project(
            vec![Expr::col("t", "a"), Expr::col("t", "b")],
            vec![],
            scan("t"),
        );
        let root = memo.insert(&two_columns).unwrap();
        let one_column = PlanNode::project(vec![Expr::col("t", "a")], vec![], scan("t"));
        assert!(matches!(
            memo.add_candidate(root, &one_column),
            Err(OptimizerError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_representative_change_invalidates_ancestors() {
        let mut memo = Memo::with_cost_model(Arc::new(PreferLimit));
        let plan = PlanNode::sort(vec![], PlanNode::filter(pred(1), scan("t")));
        let root = memo.insert(&plan).unwrap();
        let ids: Vec<GroupId> = memo.group_ids().collect();
        for &id in &ids {
            memo.mark_explored(id, 42).unwrap();
        }

        // Group 1 holds the filter; give it a winning alternative.
        let filter_group = 1;
        let scan_group = 0;
        let cheaper = PlanNode::limit(0, 1, PlanNode::group(scan_group));
        memo.add_candidate(filter_group, &cheaper).unwrap();

        assert!(!memo.is_explored(filter_group, 42).unwrap());
        assert!(!memo.is_explored(root, 42).unwrap());
        assert!(memo.is_explored(scan_group, 42).unwrap());
    }

    #[test]
    fn test_child_change_reranks_parent() {
        let mut memo = Memo::with_cost_model(Arc::new(Weighted));
        let plan = PlanNode::join(
            JoinType::Inner,
            Expr::bool(true),
            PlanNode::filter(pred(1), scan("a")),
            PlanNode::sort(vec![], scan("b")),
        );
        let root = memo.insert(&plan).unwrap();
        let filter_group = 1;
        let scan_a = 0;
        let children = memo.representative(root).unwrap().children();
        let swapped = PlanNode::join(
            JoinType::Inner,
            Expr::bool(true),
            children[1].clone(),
            children[0].clone(),
        );
        // 10 * 11 + 0.1 against 10 * 0.1 + 11.
        assert_eq!(memo.add_candidate(root, &swapped).unwrap(), Insertion::Added);
        assert!(!memo.group(root).unwrap().is_stale());

        let limit = PlanNode::limit(0, 10, PlanNode::group(scan_a));
        memo.replace_group(filter_group, &limit).unwrap();
        assert!(memo.group(root).unwrap().is_stale());

        // 10 * 11 + 101 against 10 * 101 + 11.
        assert!(memo.rerank(root).unwrap());
        assert_eq!(memo.representative(root).unwrap(), swapped);
        assert!(!memo.group(root).unwrap().is_stale());
        assert!(!memo.rerank(root).unwrap());
    }

    #[test]
    fn test_rerank_keeps_forced_representative() {
        let mut memo = Memo::with_cost_model(Arc::new(Weighted));
        let original = PlanNode::filter(pred(1), PlanNode::sort(vec![], scan("t")));
        let root = memo.insert(&original).unwrap();
        let (scan_group, sort_group) = (0, 1);

        let forced = PlanNode::limit(0, 1, PlanNode::group(sort_group));
        memo.replace_group(root, &forced).unwrap();
        assert!(memo.group(root).unwrap().is_retired(0));

        // Makes the retired filter far cheaper than the forced limit.
        let cheap = PlanNode::filter(pred(2), PlanNode::group(scan_group));
        memo.replace_group(sort_group, &cheap).unwrap();
        assert!(memo.group(root).unwrap().is_stale());
        assert!(!memo.rerank(root).unwrap());
        assert_eq!(memo.representative(root).unwrap(), forced);

        // Offering a retired candidate again does not revive it.
        assert_eq!(memo.add_candidate(root, &original).unwrap(), Insertion::Duplicate);
        assert_eq!(memo.group(root).unwrap().live_candidates().count(), 1);
    }

    #[test]
    fn test_rerank_skips_candidates_that_became_cyclic() {
        let mut memo = Memo::with_cost_model(Arc::new(Weighted));
        let a = memo.insert(&PlanNode::sort(vec![], scan("t"))).unwrap();
        let b = memo
            .insert(&PlanNode::limit(0, 1, PlanNode::limit(0, 1, scan("u"))))
            .unwrap();

        // 0.1 * 201 loses against 11.
        let via_b = PlanNode::filter(pred(1), PlanNode::group(b));
        assert_eq!(memo.add_candidate(a, &via_b).unwrap(), Insertion::Added);

        // Now `via_b` would cost 0.1 * 21, but b's representative reads a.
        memo.replace_group(b, &PlanNode::sort(vec![], PlanNode::group(a)))
            .unwrap();
        assert!(memo.group(a).unwrap().is_stale());
        assert!(!memo.rerank(a).unwrap());
        assert_eq!(memo.representative(a).unwrap().kind(), crate::plan::PlanKind::Sort);
    }

    #[test]
    fn test_display_marks_representative() {
        let mut memo = Memo::new();
        memo.insert(&PlanNode::filter(pred(1), scan("t"))).unwrap();
        let dump = memo.to_string();
        assert!(dump.contains("Group#0 (parents: 1)"));
        assert!(dump.contains("* Filter: (t.a = 1) -> #0"));
    }
}
