//! Flattening of nested `random` steps.

use shapegram_types::ast::{Step, StepKind};

/// Flatten `random` steps whose branches are themselves `random` steps.
///
/// Nested branch probabilities are multiplied by their parent branch's
/// probability, and structurally identical branches of a flattened step are
/// merged by summing their probabilities. Branches keep the order in which
/// they first appear. A `random` step with no `random` branch is left as it
/// is, so applying this to an already flat tree changes nothing.
pub fn unify_nested_random(step: &Step) -> Step {
    let children: Vec<Step> = step.children.iter().map(unify_nested_random).collect();

    let StepKind::Random { probabilities } = &step.kind else {
        return Step::new(step.kind.clone(), children);
    };
    if !children
        .iter()
        .any(|c| matches!(c.kind, StepKind::Random { .. }))
    {
        return Step::new(step.kind.clone(), children);
    }

    let mut flat: Vec<(Step, f64)> = Vec::new();
    for (child, &p) in children.into_iter().zip(probabilities) {
        match child.kind {
            StepKind::Random {
                probabilities: nested,
            } => flat.extend(child.children.into_iter().zip(nested.into_iter().map(|q| p * q))),
            kind => flat.push((Step::new(kind, child.children), p)),
        }
    }

    let mut keys: Vec<String> = Vec::new();
    let mut branches: Vec<Step> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for (branch, p) in flat {
        let key = branch_key(&branch);
        match keys.iter().position(|k| *k == key) {
            Some(i) => weights[i] += p,
            None => {
                keys.push(key);
                branches.push(branch);
                weights.push(p);
            }
        }
    }

    Step::random(branches, weights)
}

fn branch_key(step: &Step) -> String {
    serde_json::to_string(step).unwrap_or_else(|_| format!("{step:?}"))
}
