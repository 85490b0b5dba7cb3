//! # Lookup
//!
//! A lookup sees through one level of memo indirection: given a group
//! placeholder it returns the group's current representative, whose own
//! children are still placeholders. Callers that need more walk the tree and
//! call it again, which lets a rule stop as soon as it has seen enough of a
//! child's shape. The [`resolver`](crate::resolver) does the full walk.

use crate::error::{OptimizerError, Result};
use crate::memo::GroupId;
use crate::plan::PlanRef;

pub trait Lookup {
    /// Current representative of group `id`.
    fn resolve_group(&self, id: GroupId) -> Result<PlanRef>;

    /// Representative of `node` if it is a placeholder, `node` itself otherwise.
    fn resolve(&self, node: &PlanRef) -> Result<PlanRef> {
        match node.group_id() {
            Some(id) => self.resolve_group(id),
            None => Ok(node.clone()),
        }
    }
}

/// Lookup for plans that are not backed by a memo. Every placeholder is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl Lookup for NoLookup {
    fn resolve_group(&self, id: GroupId) -> Result<PlanRef> {
        Err(OptimizerError::UnknownGroup(id))
    }
}

impl<L: Lookup + ?Sized> Lookup for &L {
    fn resolve_group(&self, id: GroupId) -> Result<PlanRef> {
        (**self).resolve_group(id)
    }
}
