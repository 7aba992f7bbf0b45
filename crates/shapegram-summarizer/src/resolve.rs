//! Symbol inlining.

use crate::error::{SummarizeError, SummarizeResult};
use shapegram_types::ast::{Grammar, Step, StepKind};

/// Inline every symbol reachable from the start rule, producing one
/// symbol-free tree. Recursive rules cannot be inlined and are rejected.
pub fn resolve_symbols(grammar: &Grammar) -> SummarizeResult<Step> {
    let start = grammar.start().ok_or(SummarizeError::EmptyGrammar)?;
    let mut active = vec![start.name.as_str()];
    inline(grammar, &start.step, &mut active)
}

fn inline<'g>(grammar: &'g Grammar, step: &Step, active: &mut Vec<&'g str>) -> SummarizeResult<Step> {
    if let StepKind::Symbol { identifier } = &step.kind {
        let rule = grammar
            .rule(identifier)
            .ok_or_else(|| SummarizeError::UnknownRule(identifier.clone()))?;
        if active.contains(&rule.name.as_str()) {
            return Err(SummarizeError::RecursiveSymbol(rule.name.clone()));
        }
        active.push(rule.name.as_str());
        let resolved = inline(grammar, &rule.step, active);
        active.pop();
        return resolved;
    }

    let children = step
        .children
        .iter()
        .map(|child| inline(grammar, child, active))
        .collect::<SummarizeResult<Vec<_>>>()?;
    Ok(Step::new(step.kind.clone(), children))
}
