//! Push-based evaluation of compiled nodes.
//!
//! Each node receives one value and calls its continuation zero or more
//! times. Branch errors are recorded on the [`Runtime`] against the index
//! they occurred at; the branch then stops while its siblings continue.
//!
//! Sequences run stage by stage, so native stack use follows nesting and
//! symbol depth rather than the number of steps evaluated. Deep symbol
//! recursion continues on heap-allocated stack segments, which keeps the
//! depth limit reachable for any `max_symbol_depth`.

use crate::compile::{Node, NodeKind, Program};
use crate::error::InterpreterError;
use crate::join::join;
use crate::operator::{apply_binary, apply_unary};
use crate::options::RandomChoice;
use crate::random::{choose, draw};
use crate::value::{Binding, Value};
use shapegram_types::{Index, Payload};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

/// Remaining stack below which evaluation moves to a new segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each additional stack segment.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// State shared by one evaluation pass.
pub(crate) struct Runtime<'a> {
    pub program: &'a Program,
    failures: RefCell<Vec<(Index, InterpreterError)>>,
}

impl<'a> Runtime<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            failures: RefCell::new(Vec::new()),
        }
    }

    fn fail(&self, value: &Value, error: InterpreterError) {
        self.failures
            .borrow_mut()
            .push((value.index.clone(), error));
    }

    pub fn into_failures(self) -> Vec<(Index, InterpreterError)> {
        self.failures.into_inner()
    }
}

impl Node {
    /// Evaluate this node on `value`, passing each output to `next`.
    pub(crate) fn run(&self, rt: &Runtime<'_>, value: Value, next: &dyn Fn(Value)) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.enter(rt, value, next));
    }

    fn enter(&self, rt: &Runtime<'_>, value: Value, next: &dyn Fn(Value)) {
        let options = &rt.program.options;
        let listeners = &options.listeners;

        listeners.before_step(&self.path, &value);
        if let Some(ms) = options.delay_ms {
            thread::sleep(Duration::from_millis(ms));
        }

        if listeners.is_empty() {
            self.step(rt, value, next);
        } else {
            self.step(rt, value, &|out| {
                listeners.after_step(&self.path, &out);
                next(out);
            });
        }
    }

    fn step(&self, rt: &Runtime<'_>, value: Value, next: &dyn Fn(Value)) {
        match &self.kind {
            NodeKind::This | NodeKind::Return => next(value),
            NodeKind::Null => {}
            NodeKind::Raw(payload) => next(value.with_raw(payload.clone())),

            NodeKind::Sequential => run_sequence(rt, &self.children, value, next),
            NodeKind::Parallel => {
                for (i, child) in self.children.iter().enumerate() {
                    child.run(rt, value.clone().with_index_extended(i), next);
                }
            }

            NodeKind::Operation {
                identifier,
                operation,
                include_this,
            } => {
                let Some(operation) = operation else {
                    rt.fail(&value, InterpreterError::UnknownOperation(identifier.clone()));
                    return;
                };
                join(rt, &value, &self.children, &|joined| {
                    let mut parameters = Vec::with_capacity(joined.parameters.len() + 1);
                    if *include_this {
                        parameters.push(joined.this.clone());
                    }
                    parameters.extend(joined.parameters);
                    match operation.execute(&parameters) {
                        Ok(results) => emit_results(&joined.this, results, next),
                        Err(message) => rt.fail(
                            &joined.this,
                            InterpreterError::OperationFailed {
                                identifier: identifier.clone(),
                                message,
                            },
                        ),
                    }
                });
            }

            NodeKind::Unary(operator) => join(rt, &value, &self.children, &|joined| {
                match apply_unary(*operator, &joined.parameters[0].raw) {
                    Ok(raw) => next(joined.this.with_raw(raw)),
                    Err(message) => rt.fail(
                        &joined.this,
                        InterpreterError::InvalidOperands {
                            operator: operator.as_str(),
                            message,
                        },
                    ),
                }
            }),
            NodeKind::Binary(operator) => join(rt, &value, &self.children, &|joined| {
                let (left, right) = (&joined.parameters[0].raw, &joined.parameters[1].raw);
                match apply_binary(*operator, left, right) {
                    Ok(raw) => next(joined.this.with_raw(raw)),
                    Err(message) => rt.fail(
                        &joined.this,
                        InterpreterError::InvalidOperands {
                            operator: operator.as_str(),
                            message,
                        },
                    ),
                }
            }),

            NodeKind::If => join(rt, &value, &self.children[..1], &|joined| {
                let branch = if joined.parameters[0].raw.is_truthy() { 1 } else { 2 };
                self.children[branch].run(rt, joined.this, next);
            }),
            NodeKind::Switch(cases) => join(rt, &value, &self.children[..1], &|joined| {
                let selector = &joined.parameters[0].raw;
                match cases.iter().position(|case| case.contains(selector)) {
                    Some(i) => self.children[i + 1].run(rt, joined.this, next),
                    None if rt.program.options.strict_switch => rt.fail(
                        &joined.this,
                        InterpreterError::UnmatchedSwitchCase {
                            selector: selector.to_string(),
                        },
                    ),
                    None => {}
                }
            }),

            NodeKind::GetVariable(name) => {
                if let Some(binding) = value.variable(name) {
                    for bound in binding.values(rt) {
                        next(value.substitute(bound));
                    }
                }
            }
            NodeKind::SetVariable(name) => {
                let binding = Rc::new(Binding::new(value.clone(), self.children[0].clone()));
                next(value.with_variable(name, binding));
            }

            NodeKind::Random(probabilities) => {
                let key = value.index_key();
                let Some(chosen) = choose(probabilities, draw(&key, rt.program.options.seed))
                else {
                    return;
                };
                rt.program.options.listeners.random(&RandomChoice {
                    path: &self.path,
                    key: &key,
                    chosen,
                    value: &value,
                });
                self.children[chosen].run(rt, value, next);
            }

            NodeKind::Symbol { identifier, rule } => {
                let Some(rule) = *rule else {
                    rt.fail(&value, InterpreterError::UnknownSymbol(identifier.clone()));
                    return;
                };
                let max_depth = rt.program.options.max_symbol_depth;
                let depth = value.symbol_depth(identifier) + 1;
                if depth > max_depth {
                    rt.fail(
                        &value,
                        InterpreterError::MaxRecursionDepthExceeded {
                            symbol: identifier.clone(),
                            max_depth,
                        },
                    );
                    return;
                }
                rt.program.rules[rule].run(rt, value.with_symbol_depth(identifier, depth), next);
            }
        }
    }
}

/// Feed every output of one stage into the next before moving on.
fn run_sequence(rt: &Runtime<'_>, nodes: &[Rc<Node>], value: Value, next: &dyn Fn(Value)) {
    let mut current = vec![value];
    for node in nodes {
        let stage = RefCell::new(Vec::new());
        for v in current {
            node.run(rt, v, &|out| stage.borrow_mut().push(out));
        }
        current = stage.into_inner();
        if current.is_empty() {
            return;
        }
    }
    for v in current {
        next(v);
    }
}

/// One result keeps the input's index; several fan out as indexed branches.
fn emit_results(this: &Value, results: Vec<Payload>, next: &dyn Fn(Value)) {
    if results.len() == 1 {
        for raw in results {
            next(this.with_raw(raw));
        }
        return;
    }
    for (i, raw) in results.into_iter().enumerate() {
        next(this.with_raw(raw).with_index_extended(i));
    }
}
