//! # Iterative Fixpoint Optimizer
//!
//! The driver inserts the analyzer's plan into a fresh [`Memo`] (one group per
//! node) and then runs passes until a pass changes nothing.
//!
//! ## Pass Structure
//!
//! A pass walks the groups top-down, starting at the root group and following
//! the child placeholders of each group's *current* representative. Each
//! group is visited once per pass, however many parents share it. Rules that
//! rewrite a parent therefore run before its children are visited, and the
//! children visited are those of the rewritten parent.
//!
//! A group whose descendants changed since it was last ranked is ranked
//! again first (see [`Memo::rerank`]), so a candidate that lost against the
//! old shape of a child can win against the new one. Then every active rule
//! is considered in registration order:
//!
//! 1. A rule that already saw the group's current representative is skipped.
//!    Otherwise the group is marked explored for it (the group is *Pending*
//!    for that rule until then).
//! 2. `matches` runs on the representative. If the rule's pattern constrains
//!    children, the pattern is also matched with children resolved.
//! 3. `apply` runs and every result is stored in the group, as a competing
//!    candidate or as a forced replacement.
//!
//! Any result the memo did not already hold, and any re-ranking that moved a
//! representative, marks the pass as changed. A new representative clears the exploration flags of the group and of every
//! group above it, so all of them are offered to every rule again.
//!
//! ## Termination
//!
//! Optimization ends after the first pass without change. Rules are expected
//! to be idempotent on an unchanged node, in which case this happens once
//! every reachable group has been offered its final representative. A rule
//! that oscillates or keeps growing a group runs into the pass budget
//! (`max_iterations`), which is reported as [`OptimizerError::NotConverged`]
//! carrying the best plan found. Exceeding `max_memo_groups`, already on
//! insertion or after any rule application, is reported the same way.

use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::cost::{Cost, CostModel};
use crate::error::{OptimizerError, Result};
use crate::memo::{GroupId, Memo};
use crate::plan::{PlanNode, PlanRef};
use crate::resolver::resolve_group_references;
use crate::rule::{Rule, RuleContext, RuleRegistry, RuleResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// The outcome of a converged optimization.
#[derive(Debug)]
pub struct OptimizedPlan {
    /// Resolved plan, free of placeholders.
    pub plan: PlanRef,
    /// Root group in `memo`.
    pub root: GroupId,
    /// Passes run, the final no-change pass included.
    pub passes: usize,
    /// Number of `apply` calls across all passes.
    pub rule_applications: usize,
    /// The memo the plan was optimized in, for inspection.
    pub memo: Memo,
}

impl OptimizedPlan {
    pub fn cost(&self) -> Result<Cost> {
        self.memo.cost_model().compute_cost(&self.plan, &self.memo)
    }
}

/// Counters of one [`IterativeOptimizer::optimize_in`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Convergence {
    pub passes: usize,
    pub rule_applications: usize,
}

pub struct IterativeOptimizer {
    /// Registry of transformation rules to apply.
    pub rule_registry: Arc<RuleRegistry>,
    /// Cost model ranking competing candidates.
    pub cost_model: Arc<dyn CostModel>,
    /// Catalog providing table metadata and statistics to rules.
    pub catalog: Arc<dyn Catalog>,
    pub config: OptimizerConfig,
}

impl IterativeOptimizer {
    pub fn new(
        rule_registry: Arc<RuleRegistry>,
        cost_model: Arc<dyn CostModel>,
        catalog: Arc<dyn Catalog>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            rule_registry,
            cost_model,
            catalog,
            config,
        }
    }

    /// Optimize a plain plan tree and return the resolved result.
    pub fn optimize(&self, plan: &PlanRef) -> Result<OptimizedPlan> {
        let mut memo = Memo::with_cost_model(Arc::clone(&self.cost_model));
        let root = memo.insert(plan)?;
        self.check_memo_limit(&memo, root)?;
        let convergence = self.optimize_in(&mut memo, root)?;
        let plan = resolve_group_references(&PlanNode::group(root), &memo)?;
        debug!(
            "Optimization complete: passes={}, rule_applications={}, groups={}, candidates={}",
            convergence.passes,
            convergence.rule_applications,
            memo.num_groups(),
            memo.num_candidates()
        );
        Ok(OptimizedPlan {
            plan,
            root,
            passes: convergence.passes,
            rule_applications: convergence.rule_applications,
            memo,
        })
    }

    /// Run passes over a memo the caller owns until a pass changes nothing.
    pub fn optimize_in(&self, memo: &mut Memo, root: GroupId) -> Result<Convergence> {
        memo.group(root)?;
        let rules = self
            .rule_registry
            .active_rules(self.config.source_type.as_deref());
        let max_passes = self.config.max_iterations.max(1);
        debug!(
            "Starting iterative optimization: root_group={}, groups={}, candidates={}, rules={}",
            root,
            memo.num_groups(),
            memo.num_candidates(),
            rules.len()
        );

        let mut convergence = Convergence::default();
        loop {
            if convergence.passes >= max_passes {
                debug!("Hit iteration limit after {} passes", convergence.passes);
                return Err(OptimizerError::NotConverged {
                    passes: convergence.passes,
                    best_plan: resolve_group_references(&PlanNode::group(root), memo)?,
                });
            }
            convergence.passes += 1;
            let changed = self.run_pass(memo, root, &rules, &mut convergence)?;
            debug!(
                "Pass {} finished: changed={}, groups={}, candidates={}",
                convergence.passes,
                changed,
                memo.num_groups(),
                memo.num_candidates()
            );
            if !changed {
                return Ok(convergence);
            }
        }
    }

    /// One top-down pass. Returns whether any group gained a candidate.
    fn run_pass(
        &self,
        memo: &mut Memo,
        root: GroupId,
        rules: &[&dyn Rule],
        convergence: &mut Convergence,
    ) -> Result<bool> {
        let mut changed = false;
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(group) = stack.pop() {
            if !visited.insert(group) {
                continue;
            }
            changed |= self.explore_group(memo, root, group, rules, convergence)?;
            let rep = memo.representative(group)?;
            stack.extend(rep.children().iter().rev().filter_map(|c| c.group_id()));
        }
        Ok(changed)
    }

    /// Offer the representative of `group` to every rule that has not seen it.
    fn explore_group(
        &self,
        memo: &mut Memo,
        root: GroupId,
        group: GroupId,
        rules: &[&dyn Rule],
        convergence: &mut Convergence,
    ) -> Result<bool> {
        // A descendant may have changed since this group was last ranked.
        let mut changed = memo.rerank(group)?;
        for rule in rules {
            let rule_hash = rule.rule_hash();
            if memo.is_explored(group, rule_hash)? {
                continue;
            }
            memo.mark_explored(group, rule_hash)?;

            let node = memo.representative(group)?;
            if !rule.matches(&node) {
                continue;
            }
            let pattern = rule.pattern();
            if pattern.inspects_children() && !pattern.matches(&node, &*memo)? {
                continue;
            }

            trace!("Applying rule '{}' to group {}", rule.name(), group);
            let ctx = RuleContext {
                catalog: self.catalog.as_ref(),
                cost_model: self.cost_model.as_ref(),
                group,
                pass: convergence.passes,
            };
            let results = rule.apply(&node, &*memo, &ctx)?;
            convergence.rule_applications += 1;

            for result in results {
                let outcome = match &result {
                    RuleResult::Alternative(plan) => memo.add_candidate(group, plan)?,
                    RuleResult::Replace(plan) => memo.replace_group(group, plan)?,
                };
                trace!(
                    "  Rule '{}' on group {}: {:?} for {}",
                    rule.name(),
                    group,
                    outcome,
                    result.plan().header()
                );
                changed |= outcome.is_change();
            }

            self.check_memo_limit(memo, root)?;
        }
        Ok(changed)
    }

    fn check_memo_limit(&self, memo: &Memo, root: GroupId) -> Result<()> {
        if memo.num_groups() <= self.config.max_memo_groups {
            return Ok(());
        }
        debug!("Memo exceeded {} groups", self.config.max_memo_groups);
        Err(OptimizerError::MemoLimitExceeded {
            groups: memo.num_groups(),
            best_plan: resolve_group_references(&PlanNode::group(root), memo)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::cost::DefaultCostModel;
    use crate::expr::{Expr, TableRef};
    use crate::lookup::Lookup;
    use crate::pattern::Pattern;

    fn optimizer(rules: Vec<Box<dyn Rule>>, config: OptimizerConfig) -> IterativeOptimizer {
        let mut registry = RuleRegistry::new();
        for rule in rules {
            registry.add_rule(rule);
        }
        IterativeOptimizer::new(
            Arc::new(registry),
            Arc::new(DefaultCostModel::default()),
            Arc::new(InMemoryCatalog::new()),
            config,
        )
    }

    fn scan() -> PlanRef {
        PlanNode::scan(TableRef::new("s", "t"), vec![])
    }

    /// Raises every limit by one, forever.
    struct RaiseLimit;

    impl Rule for RaiseLimit {
        fn name(&self) -> &str {
            "raise_limit"
        }

        fn pattern(&self) -> Pattern {
            Pattern::kind(crate::plan::PlanKind::Limit, 1)
        }

        fn apply(
            &self,
            node: &PlanRef,
            _lookup: &dyn Lookup,
            _ctx: &RuleContext<'_>,
        ) -> Result<Vec<RuleResult>> {
            let PlanNode::Limit {
                offset,
                count,
                input,
            } = node.as_ref()
            else {
                return Ok(vec![]);
            };
            Ok(vec![RuleResult::Replace(PlanNode::limit(
                *offset,
                count + 1,
                input.clone(),
            ))])
        }
    }

    /// Fails on every filter.
    struct Broken;

    impl Rule for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn pattern(&self) -> Pattern {
            Pattern::filter()
        }

        fn apply(
            &self,
            _node: &PlanRef,
            _lookup: &dyn Lookup,
            _ctx: &RuleContext<'_>,
        ) -> Result<Vec<RuleResult>> {
            Err(OptimizerError::rule(self.name(), "cannot rewrite filters"))
        }
    }

    #[test]
    fn test_no_rules_converge_in_one_pass() {
        let plan = PlanNode::filter(Expr::bool(true), scan());
        let result = optimizer(vec![], OptimizerConfig::default())
            .optimize(&plan)
            .unwrap();
        assert_eq!(result.passes, 1);
        assert_eq!(result.rule_applications, 0);
        assert_eq!(result.plan, plan);
        assert_eq!(result.memo.num_groups(), 2);
        assert!(result.cost().unwrap().total > 0.0);
    }

    #[test]
    fn test_growing_rule_hits_budget() {
        let plan = PlanNode::limit(0, 1, scan());
        let err = optimizer(
            vec![Box::new(RaiseLimit)],
            OptimizerConfig::default().with_max_iterations(5),
        )
        .optimize(&plan)
        .unwrap_err();

        assert!(err.is_recoverable());
        match err {
            OptimizerError::NotConverged { passes, best_plan } => {
                assert_eq!(passes, 5);
                assert!(!best_plan.has_group_references());
                assert!(matches!(best_plan.as_ref(), PlanNode::Limit { count: 6, .. }));
            }
            other => panic!("expected NotConverged, got {other:?}"),
        }
    }

    #[test]
    fn test_rule_errors_propagate() {
        let plan = PlanNode::limit(0, 1, PlanNode::filter(Expr::bool(true), scan()));
        let err = optimizer(vec![Box::new(Broken)], OptimizerConfig::default())
            .optimize(&plan)
            .unwrap_err();
        assert!(!err.is_recoverable());
        assert!(matches!(err, OptimizerError::Rule { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn test_memo_limit() {
        let plan = PlanNode::limit(0, 1, scan());
        let config = OptimizerConfig::default().with_max_memo_groups(1);
        let err = optimizer(vec![Box::new(RaiseLimit)], config)
            .optimize(&plan)
            .unwrap_err();
        assert!(matches!(err, OptimizerError::MemoLimitExceeded { groups: 2, .. }));
        assert!(err.best_plan().is_some());
    }

    #[test]
    fn test_memo_limit_applies_to_the_initial_plan() {
        let plan = PlanNode::limit(0, 1, PlanNode::filter(Expr::bool(true), scan()));
        let config = OptimizerConfig::default().with_max_memo_groups(2);
        let err = optimizer(vec![], config).optimize(&plan).unwrap_err();
        assert!(matches!(err, OptimizerError::MemoLimitExceeded { groups: 3, .. }));
        assert_eq!(err.into_best_plan(), Some(plan));
    }

    #[test]
    fn test_optimize_in_requires_live_root() {
        let mut memo = Memo::new();
        let err = optimizer(vec![], OptimizerConfig::default())
            .optimize_in(&mut memo, 3)
            .unwrap_err();
        assert!(matches!(err, OptimizerError::UnknownGroup(3)));
    }
}
