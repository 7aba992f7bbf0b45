//! Live derivation stream.
//!
//! A [`Derivation`] consumes root changes and keeps the current set of
//! derived values. Setting a root supersedes everything derived from its
//! previous value before the new value is evaluated, so consumers never see
//! a stale and a fresh output for the same root side by side.

use crate::compile::Program;
use crate::error::InterpreterError;
use crate::evaluator::Runtime;
use crate::value::{Generation, Value};
use log::trace;
use shapegram_types::matrix::{Change, ChangeKind, Matrix, MatrixList};
use shapegram_types::{index_key, Index, Payload};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One observable effect of applying a root change.
#[derive(Debug, Clone)]
pub enum Event {
    /// A derived value became current.
    Emitted(Value),
    /// A previously emitted value at `index` was superseded.
    Invalidated { index: Index, epoch: u64 },
    /// A branch failed at `index`.
    Failed {
        index: Index,
        error: InterpreterError,
    },
}

struct LiveRoot {
    epoch: u64,
    outputs: Vec<Index>,
}

/// Incremental evaluation of a compiled grammar over changing roots.
pub struct Derivation {
    program: Rc<Program>,
    epoch: u64,
    roots: HashMap<Index, LiveRoot>,
    live: HashSet<u64>,
    results: MatrixList<Value>,
}

impl Derivation {
    pub(crate) fn new(program: Rc<Program>) -> Self {
        Self {
            program,
            epoch: 0,
            roots: HashMap::new(),
            live: HashSet::new(),
            results: MatrixList::new(),
        }
    }

    /// Apply one root change and report what it caused, invalidations
    /// first.
    pub fn apply(&mut self, change: Change<Payload>) -> Vec<Event> {
        if change.index.is_empty() {
            return Vec::new();
        }
        let mut events = self.invalidate(&change.index);

        if let ChangeKind::Set(payload) = change.kind {
            self.epoch += 1;
            let epoch = self.epoch;
            trace!("root {} set at epoch {epoch}", index_key(&change.index));

            let root =
                Value::root(payload, change.index.clone()).with_generation(Generation::new(epoch));
            let outputs = RefCell::new(Vec::new());
            let rt = Runtime::new(&self.program);
            self.program
                .start()
                .run(&rt, root, &|v| outputs.borrow_mut().push(v));

            let mut indices = Vec::new();
            for value in outputs.into_inner() {
                self.results
                    .apply(&Change::set(value.index.clone(), value.clone()));
                indices.push(value.index.clone());
                events.push(Event::Emitted(value));
            }
            events.extend(
                rt.into_failures()
                    .into_iter()
                    .map(|(index, error)| Event::Failed { index, error }),
            );

            self.live.insert(epoch);
            self.roots.insert(
                change.index,
                LiveRoot {
                    epoch,
                    outputs: indices,
                },
            );
        }
        events
    }

    fn invalidate(&mut self, index: &Index) -> Vec<Event> {
        let Some(root) = self.roots.remove(index) else {
            return Vec::new();
        };
        trace!(
            "root {} superseded, dropping {} outputs",
            index_key(index),
            root.outputs.len()
        );
        self.live.remove(&root.epoch);
        // Outputs always extend their root's index.
        self.results.apply(&Change::unset(index.clone()));
        root.outputs
            .into_iter()
            .map(|index| Event::Invalidated {
                index,
                epoch: root.epoch,
            })
            .collect()
    }

    /// Current values, flattened in index order.
    pub fn results(&self) -> &[Value] {
        self.results.list()
    }

    /// Current values by index.
    pub fn matrix(&self) -> &Matrix<Value> {
        self.results.matrix()
    }

    /// Whether every root `value` was derived from is still live.
    pub fn is_current(&self, value: &Value) -> bool {
        value.generation().is_current(|e| self.live.contains(&e))
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }
}
