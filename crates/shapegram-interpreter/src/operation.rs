//! Pluggable domain operations.
//!
//! A grammar's `operation(id)` steps are resolved against an
//! [`OperationTable`] at compile time. The engine itself only ships the
//! `id` operation, which emits the index of its input.

use crate::value::Value;
use shapegram_types::ast::{Grammar, Rule, Step, StepKind};
use shapegram_types::Payload;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A domain operation.
///
/// `execute` receives the joined parameters for one index: when
/// [`include_this`](Operation::include_this) is true the input value comes
/// first, followed by one value per parameter step. It returns zero, one or
/// several payloads; several payloads fan out into indexed branches.
pub trait Operation {
    fn execute(&self, parameters: &[Value]) -> Result<Vec<Payload>, String>;

    /// Whether the input value is passed as the first parameter.
    fn include_this(&self) -> bool {
        true
    }

    /// Parameter steps used when the grammar supplies fewer.
    fn default_parameters(&self) -> Vec<Step> {
        Vec::new()
    }
}

/// Adapts a closure into an [`Operation`].
pub struct FnOperation<F> {
    f: F,
    include_this: bool,
    defaults: Vec<Step>,
}

impl<F> FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Vec<Payload>, String>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            include_this: true,
            defaults: Vec::new(),
        }
    }

    pub fn without_this(mut self) -> Self {
        self.include_this = false;
        self
    }

    pub fn with_defaults(mut self, defaults: Vec<Step>) -> Self {
        self.defaults = defaults;
        self
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Vec<Payload>, String>,
{
    fn execute(&self, parameters: &[Value]) -> Result<Vec<Payload>, String> {
        (self.f)(parameters)
    }

    fn include_this(&self) -> bool {
        self.include_this
    }

    fn default_parameters(&self) -> Vec<Step> {
        self.defaults.clone()
    }
}

/// Emits the input's index as a comma-joined string.
struct IdOperation;

impl Operation for IdOperation {
    fn execute(&self, parameters: &[Value]) -> Result<Vec<Payload>, String> {
        let this = parameters
            .first()
            .ok_or_else(|| "id requires its input value".to_string())?;
        Ok(vec![Payload::String(this.index_key())])
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Table
// ══════════════════════════════════════════════════════════════════════════════

/// Operations by identifier.
#[derive(Clone)]
pub struct OperationTable {
    operations: BTreeMap<String, Rc<dyn Operation>>,
}

impl OperationTable {
    /// A table holding only the built-in `id` operation.
    pub fn new() -> Self {
        Self::empty().with("id", IdOperation)
    }

    /// A table with no operations at all.
    pub fn empty() -> Self {
        Self {
            operations: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, identifier: impl Into<String>, operation: impl Operation + 'static) {
        self.operations
            .insert(identifier.into(), Rc::new(operation));
    }

    pub fn with(mut self, identifier: impl Into<String>, operation: impl Operation + 'static) -> Self {
        self.insert(identifier, operation);
        self
    }

    /// Register a closure that takes the joined parameters.
    pub fn with_fn<F>(self, identifier: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Payload>, String> + 'static,
    {
        self.with(identifier, FnOperation::new(f))
    }

    pub fn get(&self, identifier: &str) -> Option<Rc<dyn Operation>> {
        self.operations.get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.operations.contains_key(identifier)
    }

    /// Copy of `grammar` with every operation's missing parameters written
    /// out from its defaults. Compiling the copy yields the same program,
    /// but every compiled step now has a path inside the grammar.
    pub fn expand_defaults(&self, grammar: &Grammar) -> Grammar {
        Grammar::new(
            grammar
                .rules
                .iter()
                .map(|rule| Rule::new(rule.name.clone(), self.expand_step(&rule.step)))
                .collect(),
        )
    }

    fn expand_step(&self, step: &Step) -> Step {
        let mut children: Vec<Step> = step.children.iter().map(|c| self.expand_step(c)).collect();
        if let StepKind::Operation { identifier } = &step.kind {
            if let Some(op) = self.get(identifier) {
                let defaults = op.default_parameters();
                for default in defaults.iter().skip(children.len()) {
                    children.push(self.expand_step(default));
                }
            }
        }
        Step::new(step.kind.clone(), children)
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.operations.keys()).finish()
    }
}
