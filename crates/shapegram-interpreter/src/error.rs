//! Runtime error types for the shapegram interpreter.

use shapegram_types::StructureError;
use thiserror::Error;

/// Interpretation error.
///
/// Errors raised while a value is being derived are fatal to that value's
/// branch only: the branch stops and the error is reported alongside the
/// index it occurred at. Sibling branches keep going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpreterError {
    /// `operation(id)` with no entry for `id` in the operations table.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// `symbol(name)` with no rule called `name`.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A value expanded the same symbol more than the configured depth.
    #[error("maximum recursion depth of {max_depth} exceeded while expanding '{symbol}'")]
    MaxRecursionDepthExceeded { symbol: String, max_depth: u32 },

    /// A domain operation rejected its parameters.
    #[error("operation '{identifier}' failed: {message}")]
    OperationFailed { identifier: String, message: String },

    /// A built-in operator received payloads it cannot combine.
    #[error("invalid operands for '{operator}': {message}")]
    InvalidOperands {
        operator: &'static str,
        message: String,
    },

    /// Strict mode only: a `switch` selector matched none of the cases.
    #[error("no switch case matches selector {selector}")]
    UnmatchedSwitchCase { selector: String },

    /// The grammar has no rules to start from.
    #[error("grammar has no rules")]
    EmptyGrammar,

    /// A step's shape does not match its kind.
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Result alias for interpreter operations.
pub type InterpreterResult<T> = Result<T, InterpreterError>;
