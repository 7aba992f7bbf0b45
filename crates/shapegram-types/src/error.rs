//! Structural errors in grammar trees.

use thiserror::Error;

/// A step whose child layout does not match its semantic role.
///
/// Grammars handed over by the parser or editor are expected to be well
/// formed; these errors surface when a tree is built or edited by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// `random` children and probabilities are not parallel-indexed.
    #[error("malformed random node: {children} children but {probabilities} probabilities")]
    MalformedRandomNode { children: usize, probabilities: usize },

    /// A fixed-arity step has the wrong number of children.
    #[error("'{step_type}' expects {expected} children, found {found}")]
    ArityMismatch {
        step_type: &'static str,
        expected: usize,
        found: usize,
    },

    /// A `switch` needs one selector plus one branch per case set.
    #[error("malformed switch: {cases} case sets but {branches} branches")]
    MalformedSwitch { cases: usize, branches: usize },
}
