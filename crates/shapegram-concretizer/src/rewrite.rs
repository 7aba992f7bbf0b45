//! Derandomizing rewrite.

use crate::record::RandomRecord;
use log::debug;
use shapegram_types::ast::{Grammar, Rule, Step, StepKind, StepPath};
use shapegram_types::Payload;
use std::collections::BTreeMap;

/// Rewrite every `random` step of `grammar` into deterministic dispatch
/// reproducing the choices in `record`.
///
/// - never evaluated: `null`
/// - always the same child: that child
/// - otherwise: `switch` on the `id` operation, one case list of index
///   keys per chosen child
///
/// The result needs an operations table that provides `id`. Steps that only
/// exist as operation defaults are not part of `grammar` and stay as they
/// are; [`concretize`](crate::concretize) writes them out beforehand.
pub fn concretize_random_derived_indices(grammar: &Grammar, record: &RandomRecord) -> Grammar {
    Grammar::new(
        grammar
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| Rule::new(rule.name.clone(), rewrite(&rule.step, StepPath::root(i), record)))
            .collect(),
    )
}

fn rewrite(step: &Step, path: StepPath, record: &RandomRecord) -> Step {
    if !matches!(step.kind, StepKind::Random { .. }) {
        let children = step
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| rewrite(child, path.child(i), record))
            .collect();
        return Step::new(step.kind.clone(), children);
    }

    // chosen child -> index keys that chose it
    let mut groups: BTreeMap<usize, Vec<Payload>> = BTreeMap::new();
    for (key, chosen) in record.get(&path).into_iter().flatten() {
        if *chosen >= step.children.len() {
            continue;
        }
        let keys = groups.entry(*chosen).or_default();
        let key = Payload::from(key.as_str());
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    let Some(&first) = groups.keys().next() else {
        debug!("random at {path:?} never evaluated, dropping");
        return Step::null();
    };
    if groups.len() == 1 {
        return rewrite(&step.children[first], path.child(first), record);
    }

    debug!(
        "random at {path:?} chose {} distinct children, dispatching on index",
        groups.len()
    );
    let mut cases = Vec::with_capacity(groups.len());
    let mut branches = Vec::with_capacity(groups.len());
    for (chosen, keys) in groups {
        cases.push(keys);
        branches.push(rewrite(&step.children[chosen], path.child(chosen), record));
    }
    Step::switch(Step::operation("id", vec![]), cases, branches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin() -> Step {
        Step::random(vec![Step::raw(1.0), Step::raw(2.0)], vec![0.5, 0.5])
    }

    fn record(entries: Vec<(StepPath, Vec<(&str, usize)>)>) -> RandomRecord {
        entries
            .into_iter()
            .map(|(path, choices)| {
                (
                    path,
                    choices.into_iter().map(|(k, c)| (k.to_string(), c)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn unrecorded_random_becomes_null() {
        let grammar = Grammar::single("a", Step::sequential(vec![Step::this(), coin()]));
        let out = concretize_random_derived_indices(&grammar, &RandomRecord::new());
        assert_eq!(
            out,
            Grammar::single("a", Step::sequential(vec![Step::this(), Step::null()]))
        );
    }

    #[test]
    fn single_choice_replaces_random() {
        let grammar = Grammar::single("a", coin());
        let rec = record(vec![(StepPath::root(0), vec![("0", 1), ("1", 1)])]);
        let out = concretize_random_derived_indices(&grammar, &rec);
        assert_eq!(out, Grammar::single("a", Step::raw(2.0)));
    }

    #[test]
    fn several_choices_dispatch_on_id() {
        let grammar = Grammar::single("a", coin());
        let rec = record(vec![(
            StepPath::root(0),
            vec![("0,1", 1), ("0,0", 0), ("0,2", 1), ("0,1", 1)],
        )]);
        let out = concretize_random_derived_indices(&grammar, &rec);
        assert_eq!(
            out,
            Grammar::single(
                "a",
                Step::switch(
                    Step::operation("id", vec![]),
                    vec![
                        vec![Payload::from("0,0")],
                        vec![Payload::from("0,1"), Payload::from("0,2")],
                    ],
                    vec![Step::raw(1.0), Step::raw(2.0)],
                )
            )
        );
    }

    #[test]
    fn nested_randoms_use_original_paths() {
        let inner = Step::random(vec![Step::raw("x"), Step::raw("y")], vec![0.5, 0.5]);
        let outer = Step::random(vec![Step::this(), inner], vec![0.5, 0.5]);
        let grammar = Grammar::single("a", outer);
        let rec = record(vec![
            (StepPath::root(0), vec![("0", 1)]),
            (StepPath::root(0).child(1), vec![("0", 0)]),
        ]);
        let out = concretize_random_derived_indices(&grammar, &rec);
        assert_eq!(out, Grammar::single("a", Step::raw("x")));
    }

    #[test]
    fn other_rules_are_rewritten_too() {
        let grammar = Grammar::new(vec![
            Rule::new("a", Step::symbol("b")),
            Rule::new("b", coin()),
        ]);
        let rec = record(vec![(StepPath::root(1), vec![("0", 0)])]);
        let out = concretize_random_derived_indices(&grammar, &rec);
        assert_eq!(out.rules[0].step, Step::symbol("b"));
        assert_eq!(out.rules[1].step, Step::raw(1.0));
    }
}
