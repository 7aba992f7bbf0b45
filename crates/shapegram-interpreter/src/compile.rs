//! Compile a grammar into an executable node graph.
//!
//! Every rule is compiled exactly once. Operations are looked up in the
//! operations table and symbols are resolved to rule positions here, so
//! evaluation never touches a name table.

use crate::error::{InterpreterError, InterpreterResult};
use crate::operation::{Operation, OperationTable};
use crate::options::InterpreterOptions;
use log::{debug, warn};
use shapegram_types::ast::{BinaryOperator, Grammar, Step, StepKind, StepPath, UnaryOperator};
use shapegram_types::Payload;
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled step.
pub(crate) struct Node {
    pub path: StepPath,
    pub kind: NodeKind,
    pub children: Vec<Rc<Node>>,
}

pub(crate) enum NodeKind {
    Sequential,
    Parallel,
    Operation {
        identifier: String,
        /// `None` when the table has no such operation; reported per value.
        operation: Option<Rc<dyn Operation>>,
        include_this: bool,
    },
    Symbol {
        identifier: String,
        rule: Option<usize>,
    },
    Raw(Payload),
    This,
    Null,
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    If,
    Switch(Vec<Vec<Payload>>),
    GetVariable(String),
    SetVariable(String),
    Return,
    Random(Vec<f64>),
}

/// The compiled rule table plus the options it runs under. Read-only once
/// built.
pub(crate) struct Program {
    pub rules: Vec<Rc<Node>>,
    pub names: Vec<String>,
    pub options: InterpreterOptions,
}

impl Program {
    pub fn compile(
        grammar: &Grammar,
        operations: &OperationTable,
        options: InterpreterOptions,
    ) -> InterpreterResult<Self> {
        if grammar.rules.is_empty() {
            return Err(InterpreterError::EmptyGrammar);
        }

        // Earlier rules shadow later duplicates.
        let mut symbols: HashMap<&str, usize> = HashMap::new();
        for (i, rule) in grammar.rules.iter().enumerate() {
            symbols.entry(rule.name.as_str()).or_insert(i);
        }

        let compiler = Compiler {
            operations,
            symbols: &symbols,
        };
        let rules = grammar
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| compiler.step(&rule.step, StepPath::root(i)))
            .collect::<InterpreterResult<Vec<_>>>()?;

        debug!(
            "compiled {} rules, start rule '{}'",
            rules.len(),
            grammar.rules[0].name
        );

        Ok(Self {
            rules,
            names: grammar.rules.iter().map(|r| r.name.clone()).collect(),
            options,
        })
    }

    pub fn start(&self) -> &Rc<Node> {
        &self.rules[0]
    }
}

struct Compiler<'a> {
    operations: &'a OperationTable,
    symbols: &'a HashMap<&'a str, usize>,
}

impl Compiler<'_> {
    fn step(&self, step: &Step, path: StepPath) -> InterpreterResult<Rc<Node>> {
        step.validate_shallow()?;

        let mut children = step
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| self.step(child, path.child(i)))
            .collect::<InterpreterResult<Vec<_>>>()?;

        let kind = match &step.kind {
            StepKind::Sequential => NodeKind::Sequential,
            StepKind::Parallel => NodeKind::Parallel,
            StepKind::Operation { identifier } => {
                let operation = self.operations.get(identifier);
                match &operation {
                    Some(op) => {
                        let defaults = op.default_parameters();
                        for (i, default) in defaults.iter().enumerate().skip(children.len()) {
                            children.push(self.step(default, path.child(i))?);
                        }
                    }
                    None => warn!("operation '{identifier}' is not registered"),
                }
                NodeKind::Operation {
                    identifier: identifier.clone(),
                    include_this: operation.as_ref().map_or(true, |op| op.include_this()),
                    operation,
                }
            }
            StepKind::Symbol { identifier } => {
                let rule = self.symbols.get(identifier.as_str()).copied();
                if rule.is_none() {
                    warn!("symbol '{identifier}' has no rule");
                }
                NodeKind::Symbol {
                    identifier: identifier.clone(),
                    rule,
                }
            }
            StepKind::Raw { value } => NodeKind::Raw(value.clone()),
            StepKind::This => NodeKind::This,
            StepKind::Null => NodeKind::Null,
            StepKind::Unary { operator } => NodeKind::Unary(*operator),
            StepKind::Binary { operator } => NodeKind::Binary(*operator),
            StepKind::If => NodeKind::If,
            StepKind::Switch { cases } => NodeKind::Switch(cases.clone()),
            StepKind::GetVariable { identifier } => NodeKind::GetVariable(identifier.clone()),
            StepKind::SetVariable { identifier } => NodeKind::SetVariable(identifier.clone()),
            StepKind::Return => NodeKind::Return,
            StepKind::Random { probabilities } => NodeKind::Random(probabilities.clone()),
        };

        Ok(Rc::new(Node {
            path,
            kind,
            children,
        }))
    }
}
