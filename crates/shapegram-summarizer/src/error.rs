//! Summarizer error types.

use shapegram_types::StructureError;
use thiserror::Error;

/// Summarization error. Any error aborts the whole call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SummarizeError {
    #[error("nothing to summarize")]
    NoGrammars,

    #[error("grammar has no rules")]
    EmptyGrammar,

    #[error("symbol '{0}' references an unknown rule")]
    UnknownRule(String),

    #[error("rule '{0}' references itself")]
    RecursiveSymbol(String),

    /// None of the configured combination patterns applies to a pair of
    /// steps. Cannot happen while `Alternatives` is enabled.
    #[error("no combination pattern reconciles '{left}' with '{right}'")]
    NoReconcilablePattern {
        left: &'static str,
        right: &'static str,
    },

    #[error(transparent)]
    Structure(#[from] StructureError),
}

pub type SummarizeResult<T> = Result<T, SummarizeError>;
