//! Pairwise combination of summary trees.
//!
//! The accumulated tree (`a`) is rewritten in place; nodes of the incoming
//! tree (`b`) are either folded into their counterparts or moved under a
//! new `random` node next to them.

use crate::error::{SummarizeError, SummarizeResult};
use crate::options::{Pattern, SummarizerOptions};
use crate::summary::{NodeId, SummaryArena};
use log::trace;
use shapegram_types::ast::StepKind;
use shapegram_types::Payload;
use std::collections::HashMap;

/// How the children of two same-typed parents are paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matching {
    /// Any child of `a` may pair with any child of `b`.
    Unordered,
    /// Child `i` pairs with child `i` only.
    Positional,
    /// Positional, and only where both sides route the same cases.
    SwitchCases,
}

fn matching(kind: &StepKind) -> Matching {
    match kind {
        StepKind::Parallel | StepKind::Random { .. } => Matching::Unordered,
        StepKind::Binary { operator } if operator.is_commutative() => Matching::Unordered,
        StepKind::Switch { .. } => Matching::SwitchCases,
        _ => Matching::Positional,
    }
}

fn same_cases(a: &[Payload], b: &[Payload]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|y| a.contains(y))
}

fn probabilities(kind: &StepKind) -> &[f64] {
    match kind {
        StepKind::Random { probabilities } => probabilities,
        _ => &[],
    }
}

pub struct Combiner<'o> {
    pub arena: SummaryArena,
    options: &'o SummarizerOptions,
    reconcilable: HashMap<(NodeId, NodeId), bool>,
}

impl<'o> Combiner<'o> {
    pub fn new(options: &'o SummarizerOptions) -> Self {
        Self {
            arena: SummaryArena::new(),
            options,
            reconcilable: HashMap::new(),
        }
    }

    fn size(&self, id: NodeId) -> f64 {
        self.arena.node(id).size
    }

    // ══════════════════════════════════════════════════════════════════════
    // Entry point
    // ══════════════════════════════════════════════════════════════════════

    /// Combine `b` into `a`. Returns the node now standing where `a` stood.
    pub fn combine_recursively(&mut self, a: NodeId, b: NodeId) -> SummarizeResult<NodeId> {
        if self.options.allows(Pattern::Identical) && self.arena.equal(a, b) {
            self.arena.accumulate(a, b);
            return Ok(a);
        }
        if self.options.allows(Pattern::Merge) {
            if self.is_reconcilable(a, b) {
                if let Some(merged) = self.combine_two_steps(a, b)? {
                    return Ok(merged);
                }
            }
            if let Some(merged) = self.combine_inner(a, b)? {
                return Ok(merged);
            }
        }
        self.combine_and_replace(a, b)
    }

    /// Merge the first reconcilable same-typed pair of inner nodes found
    /// anywhere below `a` and `b`. The rest of `b` is absorbed into `a`, and
    /// the nodes between the merged pair and `a` take on `b`'s weight.
    fn combine_inner(&mut self, a: NodeId, b: NodeId) -> SummarizeResult<Option<NodeId>> {
        let mut by_type: HashMap<&'static str, Vec<NodeId>> = HashMap::new();
        for y in self.arena.inner_nodes(b) {
            by_type
                .entry(self.arena.node(y).kind.type_name())
                .or_default()
                .push(y);
        }

        for x in self.arena.inner_nodes(a) {
            let Some(candidates) = by_type.get(self.arena.node(x).kind.type_name()) else {
                continue;
            };
            for &y in candidates {
                if (x, y) == (a, b) || !self.is_reconcilable(x, y) {
                    continue;
                }
                let weight = self.size(b);
                let Some(standing) = self.combine_two_steps(x, y)? else {
                    continue;
                };
                trace!(
                    "merged '{}' below the roots, absorbing the rest of the input",
                    self.arena.node(standing).kind.type_name()
                );
                if x == a {
                    return Ok(Some(standing));
                }
                let mut cursor = self.arena.node(standing).parent;
                while let Some((parent, _)) = cursor {
                    self.arena.node_mut(parent).size += weight;
                    if parent == a {
                        break;
                    }
                    cursor = self.arena.node(parent).parent;
                }
                return Ok(Some(a));
            }
        }
        Ok(None)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Matching
    // ══════════════════════════════════════════════════════════════════════

    /// Same step type, same identity-bearing fields, and an equal
    /// condition or selector where the type has one.
    fn compatible(&self, a: NodeId, b: NodeId) -> bool {
        let (na, nb) = (self.arena.node(a), self.arena.node(b));
        match (&na.kind, &nb.kind) {
            (StepKind::Operation { identifier: x }, StepKind::Operation { identifier: y })
            | (StepKind::Symbol { identifier: x }, StepKind::Symbol { identifier: y })
            | (StepKind::GetVariable { identifier: x }, StepKind::GetVariable { identifier: y })
            | (StepKind::SetVariable { identifier: x }, StepKind::SetVariable { identifier: y }) => {
                x == y
            }
            (StepKind::Raw { value: x }, StepKind::Raw { value: y }) => x == y,
            (StepKind::Unary { operator: x }, StepKind::Unary { operator: y }) => x == y,
            (StepKind::Binary { operator: x }, StepKind::Binary { operator: y }) => x == y,
            (StepKind::If, StepKind::If) | (StepKind::Switch { .. }, StepKind::Switch { .. }) => {
                match (na.children.first(), nb.children.first()) {
                    (Some(&ca), Some(&cb)) => self.arena.equal(ca, cb),
                    _ => false,
                }
            }
            (x, y) => x.type_name() == y.type_name(),
        }
    }

    /// Whether `a` and `b` can be merged piecewise: compatible, with at
    /// least one matching child pair.
    fn is_reconcilable(&mut self, a: NodeId, b: NodeId) -> bool {
        if let Some(&known) = self.reconcilable.get(&(a, b)) {
            return known;
        }
        let result = self.compatible(a, b) && !self.match_children(a, b).is_empty();
        self.reconcilable.insert((a, b), result);
        result
    }

    fn children_match(&mut self, a: NodeId, b: NodeId) -> bool {
        self.arena.equal(a, b) || self.is_reconcilable(a, b)
    }

    /// Matching child position pairs of two compatible parents. Equal pairs
    /// are taken before merely reconcilable ones.
    fn match_children(&mut self, a: NodeId, b: NodeId) -> Vec<(usize, usize)> {
        let ca = self.arena.node(a).children.clone();
        let cb = self.arena.node(b).children.clone();

        let mode = matching(&self.arena.node(a).kind);
        match mode {
            Matching::Positional => (0..ca.len().min(cb.len()))
                .filter(|&i| self.children_match(ca[i], cb[i]))
                .map(|i| (i, i))
                .collect(),
            Matching::SwitchCases => {
                let cases_a = switch_cases(&self.arena.node(a).kind).to_vec();
                let cases_b = switch_cases(&self.arena.node(b).kind).to_vec();
                (0..ca.len().min(cb.len()))
                    .filter(|&i| {
                        // position 0 is the selector, already known to be equal
                        i == 0
                            || match (cases_a.get(i - 1), cases_b.get(i - 1)) {
                                (Some(x), Some(y)) => same_cases(x, y),
                                _ => false,
                            }
                    })
                    .filter(|&i| self.children_match(ca[i], cb[i]))
                    .map(|i| (i, i))
                    .collect()
            }
            Matching::Unordered => {
                let mut used = vec![false; cb.len()];
                let mut pairs = Vec::new();
                for (i, &x) in ca.iter().enumerate() {
                    if let Some(j) = (0..cb.len()).find(|&j| !used[j] && self.arena.equal(x, cb[j])) {
                        used[j] = true;
                        pairs.push((i, j));
                    }
                }
                for (i, &x) in ca.iter().enumerate() {
                    if pairs.iter().any(|&(pi, _)| pi == i) {
                        continue;
                    }
                    if let Some(j) = (0..cb.len()).find(|&j| !used[j] && self.is_reconcilable(x, cb[j])) {
                        used[j] = true;
                        pairs.push((i, j));
                    }
                }
                pairs.sort_unstable();
                pairs
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Merging
    // ══════════════════════════════════════════════════════════════════════

    /// Merge two reconcilable parents child by child. Returns `None` when no
    /// child pair matches.
    fn combine_two_steps(&mut self, a: NodeId, b: NodeId) -> SummarizeResult<Option<NodeId>> {
        let pairs = self.match_children(a, b);
        if pairs.is_empty() {
            return Ok(None);
        }

        let ca = self.arena.node(a).children.clone();
        let cb = self.arena.node(b).children.clone();
        let widest = ca.len().max(cb.len()) as f64;
        if (pairs.len() as f64) < self.options.match_threshold * widest {
            trace!(
                "{} of {} children match under '{}', wrapping parents",
                pairs.len(),
                widest,
                self.arena.node(a).kind.type_name()
            );
            return self.combine_and_replace(a, b).map(Some);
        }

        let rest_a: Vec<usize> = (0..ca.len())
            .filter(|i| !pairs.iter().any(|&(pi, _)| pi == *i))
            .collect();
        let rest_b: Vec<usize> = (0..cb.len())
            .filter(|j| !pairs.iter().any(|&(_, pj)| pj == *j))
            .collect();

        let (sa, sb) = (self.size(a), self.size(b));
        let total = sa + sb;

        if matches!(self.arena.node(a).kind, StepKind::Random { .. }) {
            let pa = probabilities(&self.arena.node(a).kind).to_vec();
            let pb = probabilities(&self.arena.node(b).kind).to_vec();
            let mut merged: Vec<f64> = pa.iter().map(|p| p * sa / total).collect();

            for &(i, j) in &pairs {
                merged[i] += pb[j] * sb / total;
                self.combine_recursively(ca[i], cb[j])?;
            }
            self.set_probabilities(a, merged);
            for &j in &rest_b {
                self.add_random_child(a, cb[j], pb[j] * sb / total);
            }
        } else {
            let cases_differ = match (&self.arena.node(a).kind, &self.arena.node(b).kind) {
                (StepKind::Switch { cases: x }, StepKind::Switch { cases: y }) => rest_a
                    .iter()
                    .zip(&rest_b)
                    .any(|(&i, &j)| match (x.get(i.wrapping_sub(1)), y.get(j.wrapping_sub(1))) {
                        (Some(x), Some(y)) => !same_cases(x, y),
                        _ => true,
                    }),
                _ => false,
            };
            if rest_a.len() != rest_b.len() || cases_differ {
                trace!(
                    "unpaired children under '{}', wrapping parents",
                    self.arena.node(a).kind.type_name()
                );
                return self.combine_and_replace(a, b).map(Some);
            }

            for &(i, j) in &pairs {
                self.combine_recursively(ca[i], cb[j])?;
            }
            for (&i, &j) in rest_a.iter().zip(&rest_b) {
                self.combine_recursively(ca[i], cb[j])?;
            }
        }

        self.arena.node_mut(a).size = total;
        self.arena.node_mut(b).size = total;
        self.reconcilable.clear();
        Ok(Some(a))
    }

    /// Wrap `a` and `b` as weighted alternatives and put the new `random`
    /// node where `a` was.
    fn combine_and_replace(&mut self, a: NodeId, b: NodeId) -> SummarizeResult<NodeId> {
        if !self.options.allows(Pattern::Alternatives) {
            return Err(SummarizeError::NoReconcilablePattern {
                left: self.arena.node(a).kind.type_name(),
                right: self.arena.node(b).kind.type_name(),
            });
        }

        let (sa, sb) = (self.size(a), self.size(b));
        let total = sa + sb;
        let parent = self.arena.node(a).parent;
        let wrapper = self.arena.alloc(
            StepKind::Random {
                probabilities: vec![sa / total, sb / total],
            },
            vec![a, b],
            total,
        );
        if let Some((p, position)) = parent {
            self.arena.set_child(p, position, wrapper);
        }
        self.reconcilable.clear();
        Ok(wrapper)
    }

    /// Append `child` as a new branch of the `random` node `parent`.
    fn add_random_child(&mut self, parent: NodeId, child: NodeId, probability: f64) {
        self.arena.push_child(parent, child);
        if let StepKind::Random { probabilities } = &mut self.arena.node_mut(parent).kind {
            probabilities.push(probability);
        }
        self.reconcilable.clear();
    }

    fn set_probabilities(&mut self, id: NodeId, values: Vec<f64>) {
        if let StepKind::Random { probabilities } = &mut self.arena.node_mut(id).kind {
            *probabilities = values;
        }
    }
}

fn switch_cases(kind: &StepKind) -> &[Vec<Payload>] {
    match kind {
        StepKind::Switch { cases } => cases,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegram_types::ast::{BinaryOperator, Step};

    fn combine(a: &Step, b: &Step, options: &SummarizerOptions) -> SummarizeResult<Step> {
        let mut combiner = Combiner::new(options);
        let ra = combiner.arena.to_summary(a);
        let rb = combiner.arena.to_summary(b);
        let root = combiner.combine_recursively(ra, rb)?;
        Ok(combiner.arena.to_step(root))
    }

    fn default_combine(a: &Step, b: &Step) -> Step {
        combine(a, b, &SummarizerOptions::default()).unwrap()
    }

    #[test]
    fn identical_steps_collapse() {
        let step = Step::sequential(vec![Step::this(), Step::raw(1.0)]);
        assert_eq!(default_combine(&step, &step), step);
    }

    #[test]
    fn leaves_become_alternatives() {
        assert_eq!(
            default_combine(&Step::raw(1.0), &Step::raw(2.0)),
            Step::random(vec![Step::raw(1.0), Step::raw(2.0)], vec![0.5, 0.5])
        );
    }

    #[test]
    fn sequences_merge_positionally() {
        let a = Step::sequential(vec![Step::this(), Step::raw(3.0)]);
        let b = Step::sequential(vec![Step::this(), Step::raw(2.0)]);
        assert_eq!(
            default_combine(&a, &b),
            Step::sequential(vec![
                Step::this(),
                Step::random(vec![Step::raw(3.0), Step::raw(2.0)], vec![0.5, 0.5]),
            ])
        );
    }

    #[test]
    fn commutative_operands_match_unordered() {
        let a = Step::binary(BinaryOperator::Add, Step::this(), Step::raw(1.0));
        let b = Step::binary(BinaryOperator::Add, Step::raw(1.0), Step::raw(2.0));
        assert_eq!(
            default_combine(&a, &b),
            Step::binary(
                BinaryOperator::Add,
                Step::random(vec![Step::this(), Step::raw(2.0)], vec![0.5, 0.5]),
                Step::raw(1.0),
            )
        );
    }

    #[test]
    fn non_commutative_operands_stay_positional() {
        let a = Step::binary(BinaryOperator::Subtract, Step::this(), Step::raw(1.0));
        let b = Step::binary(BinaryOperator::Subtract, Step::raw(1.0), Step::raw(2.0));
        assert_eq!(
            default_combine(&a, &b),
            Step::random(vec![a.clone(), b.clone()], vec![0.5, 0.5])
        );
    }

    #[test]
    fn if_requires_equal_condition() {
        let a = Step::if_else(Step::this(), Step::raw(1.0), Step::raw(2.0));
        let b = Step::if_else(Step::this(), Step::raw(1.0), Step::raw(3.0));
        assert_eq!(
            default_combine(&a, &b),
            Step::if_else(
                Step::this(),
                Step::raw(1.0),
                Step::random(vec![Step::raw(2.0), Step::raw(3.0)], vec![0.5, 0.5]),
            )
        );

        let c = Step::if_else(Step::raw(true), Step::raw(1.0), Step::raw(2.0));
        assert_eq!(
            default_combine(&a, &c),
            Step::random(vec![a.clone(), c.clone()], vec![0.5, 0.5])
        );
    }

    #[test]
    fn unequal_lengths_wrap_parents() {
        let a = Step::parallel(vec![Step::raw(1.0), Step::raw(2.0), Step::raw(3.0)]);
        let b = Step::parallel(vec![Step::raw(1.0), Step::raw(2.0)]);
        assert_eq!(
            default_combine(&a, &b),
            Step::random(vec![a.clone(), b.clone()], vec![0.5, 0.5])
        );
    }

    #[test]
    fn random_parents_add_one_sided_children() {
        let a = Step::random(vec![Step::raw(1.0), Step::raw(2.0)], vec![0.5, 0.5]);
        let b = Step::random(vec![Step::raw(1.0), Step::raw(3.0)], vec![0.5, 0.5]);
        assert_eq!(
            default_combine(&a, &b),
            Step::random(
                vec![Step::raw(1.0), Step::raw(2.0), Step::raw(3.0)],
                vec![0.5, 0.25, 0.25]
            )
        );
    }

    #[test]
    fn threshold_controls_wrapping() {
        let a = Step::sequential(vec![Step::this(), Step::raw(1.0), Step::raw(2.0)]);
        let b = Step::sequential(vec![Step::this(), Step::raw(3.0), Step::raw(4.0)]);

        let wrapped = default_combine(&a, &b);
        assert_eq!(wrapped, Step::random(vec![a.clone(), b.clone()], vec![0.5, 0.5]));

        let lenient = SummarizerOptions::default().with_match_threshold(0.0);
        let merged = combine(&a, &b, &lenient).unwrap();
        assert_eq!(merged.type_name(), "sequential");
        assert_eq!(merged.children[0], Step::this());
    }

    #[test]
    fn missing_patterns_fail() {
        let only_identical = SummarizerOptions::default().with_patterns(vec![Pattern::Identical]);
        assert_eq!(
            combine(&Step::raw(1.0), &Step::raw(2.0), &only_identical),
            Err(SummarizeError::NoReconcilablePattern {
                left: "raw",
                right: "raw"
            })
        );
    }

    #[test]
    fn shared_subtrees_match_across_depths() {
        let shared = Step::parallel(vec![Step::raw(1.0), Step::raw(2.0), Step::raw(3.0)]);
        let a = Step::sequential(vec![Step::this(), shared.clone()]);
        assert_eq!(default_combine(&a, &shared), a);
        assert_eq!(default_combine(&shared, &a), shared);
    }

    #[test]
    fn inner_merges_carry_the_input_weight() {
        let options = SummarizerOptions::default();
        let mut combiner = Combiner::new(&options);
        let shared = Step::parallel(vec![Step::raw(1.0), Step::raw(2.0)]);
        let a = combiner
            .arena
            .to_summary(&Step::sequential(vec![Step::this(), shared.clone()]));
        let b = combiner.arena.to_summary(&shared);
        let root = combiner.combine_recursively(a, b).unwrap();
        assert_eq!(root, a);
        let inner = combiner.arena.node(a).children[1];
        assert_eq!(combiner.arena.node(a).size, 2.0);
        assert_eq!(combiner.arena.node(inner).size, 2.0);
    }

    #[test]
    fn sizes_update_on_both_sides() {
        let options = SummarizerOptions::default();
        let mut combiner = Combiner::new(&options);
        let a = combiner
            .arena
            .to_summary(&Step::sequential(vec![Step::this(), Step::raw(1.0)]));
        let b = combiner
            .arena
            .to_summary(&Step::sequential(vec![Step::this(), Step::raw(2.0)]));
        let root = combiner.combine_recursively(a, b).unwrap();
        assert_eq!(root, a);
        assert_eq!(combiner.arena.node(a).size, 2.0);
        assert_eq!(combiner.arena.node(b).size, 2.0);
    }
}
