//! shapegram concretizer.
//!
//! Turns a stochastic grammar into a deterministic one that reproduces a
//! particular run: the run is recorded through the interpreter's `random`
//! listener, then every `random` step is replaced by the branches it
//! actually took, dispatched on the value's index.

mod record;
mod rewrite;

pub use record::{derive_random_output_step_index, RandomRecord, RandomRecorder, Recording};
pub use rewrite::concretize_random_derived_indices;

use shapegram_interpreter::{InterpreterOptions, InterpreterResult, OperationTable};
use shapegram_types::ast::Grammar;
use shapegram_types::Payload;

/// A concretized grammar together with the run it reproduces.
#[derive(Debug, Clone)]
pub struct Concretized {
    pub grammar: Grammar,
    pub recording: Recording,
}

/// Record one derivation of `base` and rewrite `grammar` to reproduce it.
///
/// Operation default parameters are written into the grammar first, so
/// `random` steps inside them are rewritten like any other.
pub fn concretize(
    base: Payload,
    grammar: &Grammar,
    operations: OperationTable,
    options: InterpreterOptions,
) -> InterpreterResult<Concretized> {
    let grammar = operations.expand_defaults(grammar);
    let recording = derive_random_output_step_index(base, &grammar, operations, options)?;
    Ok(Concretized {
        grammar: concretize_random_derived_indices(&grammar, &recording.record),
        recording,
    })
}
