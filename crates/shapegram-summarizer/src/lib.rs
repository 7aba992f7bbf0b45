//! shapegram summarizer.
//!
//! Folds several grammars into one grammar that can derive everything any
//! of them derives. Shared structure is kept once; where the inputs differ
//! the summary branches with a `random` step, weighted by how many inputs
//! took each branch.
//!
//! ```ignore
//! let summary = summarize(&[first, second])?;
//! ```

mod combine;
mod error;
mod options;
mod resolve;
mod summary;
mod unify;

pub use error::{SummarizeError, SummarizeResult};
pub use options::{Pattern, SummarizerOptions};
pub use resolve::resolve_symbols;
pub use summary::{NodeId, SummaryArena, SummaryNode};
pub use unify::unify_nested_random;

use combine::Combiner;
use log::debug;
use shapegram_types::ast::{Grammar, Step};

/// Summarize `grammars` with default options.
pub fn summarize(grammars: &[Grammar]) -> SummarizeResult<Grammar> {
    summarize_with(grammars, &SummarizerOptions::default())
}

/// Summarize `grammars` into a single-rule grammar named after the first
/// grammar's start rule.
pub fn summarize_with(grammars: &[Grammar], options: &SummarizerOptions) -> SummarizeResult<Grammar> {
    let first = grammars.first().ok_or(SummarizeError::NoGrammars)?;
    let name = first.start().ok_or(SummarizeError::EmptyGrammar)?.name.clone();
    let steps = grammars
        .iter()
        .map(resolve_symbols)
        .collect::<SummarizeResult<Vec<_>>>()?;
    let step = combine_steps(&steps, options)?;
    Ok(Grammar::single(name, step))
}

/// Combine symbol-free step trees into one.
pub fn combine_steps(steps: &[Step], options: &SummarizerOptions) -> SummarizeResult<Step> {
    let (first, rest) = steps.split_first().ok_or(SummarizeError::NoGrammars)?;
    steps.iter().try_for_each(Step::validate)?;

    let mut combiner = Combiner::new(options);
    let mut root = combiner.arena.to_summary(first);
    for (i, step) in rest.iter().enumerate() {
        let next = combiner.arena.to_summary(step);
        root = combiner.combine_recursively(root, next)?;
        debug!(
            "folded input {} of {}, summary arena holds {} nodes",
            i + 2,
            steps.len(),
            combiner.arena.len()
        );
    }

    Ok(unify_nested_random(&combiner.arena.to_step(root)))
}
