//! # Resolver
//!
//! Flattens a memo-backed plan into a plain tree: every placeholder, at every
//! depth, is replaced by its group's current representative, whose children
//! are resolved the same way. The result is what costing, EXPLAIN and
//! execution-plan generation consume.
//!
//! The walk uses an explicit work stack, so plan depth is not bounded by the
//! thread's stack. A group reached twice within one call (two parents sharing
//! a sub-plan) is resolved once and both parents receive the same `Arc`.
//! Subtrees without placeholders come back pointer-identical, which makes
//! resolving an already concrete tree a cheap no-op.
//!
//! Only representatives are walked, so the cost is proportional to the
//! resolved tree, not to the number of candidates in the memo.

use crate::error::{OptimizerError, Result};
use crate::lookup::Lookup;
use crate::memo::GroupId;
use crate::plan::{PlanNode, PlanRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

enum Task {
    Visit(PlanRef),
    /// Record the resolved shape of a group once its subtree is done.
    LeaveGroup(GroupId),
    /// Pop `node.arity()` resolved children and rebuild `node` with them.
    Rebuild(PlanRef),
}

/// Replace every placeholder reachable from `node` with concrete structure.
///
/// Fails with `UnknownGroup` on a dangling placeholder and with
/// `CyclicReference` when a group's representative leads back to the group.
pub fn resolve_group_references(node: &PlanRef, lookup: &dyn Lookup) -> Result<PlanRef> {
    let mut tasks = vec![Task::Visit(node.clone())];
    let mut done: Vec<PlanRef> = Vec::new();
    let mut resolved: HashMap<GroupId, PlanRef> = HashMap::new();
    let mut on_path: HashSet<GroupId> = HashSet::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(node) => match node.as_ref() {
                PlanNode::GroupReference(id) => {
                    if let Some(plan) = resolved.get(id) {
                        done.push(plan.clone());
                        continue;
                    }
                    if !on_path.insert(*id) {
                        return Err(OptimizerError::CyclicReference(*id));
                    }
                    let rep = lookup.resolve_group(*id)?;
                    tasks.push(Task::LeaveGroup(*id));
                    tasks.push(Task::Visit(rep));
                }
                _ if node.arity() == 0 => done.push(node),
                _ => {
                    let children = node.children();
                    tasks.push(Task::Rebuild(node));
                    tasks.extend(children.into_iter().rev().map(Task::Visit));
                }
            },
            Task::LeaveGroup(id) => {
                on_path.remove(&id);
                if let Some(plan) = done.last() {
                    resolved.insert(id, plan.clone());
                }
            }
            Task::Rebuild(node) => {
                let at = done.len().saturating_sub(node.arity());
                let children = done.split_off(at);
                let unchanged = node
                    .children()
                    .iter()
                    .zip(&children)
                    .all(|(old, new)| Arc::ptr_eq(old, new));
                if unchanged && children.len() == node.arity() {
                    done.push(node);
                } else {
                    done.push(node.with_new_children(children)?);
                }
            }
        }
    }

    Ok(done.pop().unwrap_or_else(|| node.clone()))
}
