//! Recording of random choices.

use shapegram_interpreter::{
    interpret, Derived, InterpreterOptions, InterpreterResult, Listener, OperationTable,
    RandomChoice,
};
use shapegram_types::ast::{Grammar, StepPath};
use shapegram_types::Payload;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Per `random` step: the `(index key, chosen child)` pairs it produced,
/// in evaluation order.
pub type RandomRecord = BTreeMap<StepPath, Vec<(String, usize)>>;

/// Listener collecting every random choice made during a run.
#[derive(Debug, Default)]
pub struct RandomRecorder {
    record: RefCell<RandomRecord>,
}

impl RandomRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected record, leaving the recorder empty.
    pub fn take(&self) -> RandomRecord {
        self.record.take()
    }

    pub fn len(&self) -> usize {
        self.record.borrow().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Listener for RandomRecorder {
    fn on_random(&self, choice: &RandomChoice<'_>) {
        self.record
            .borrow_mut()
            .entry(choice.path.clone())
            .or_default()
            .push((choice.key.to_string(), choice.chosen));
    }
}

/// The outcome of a recorded run.
#[derive(Debug, Clone)]
pub struct Recording {
    pub record: RandomRecord,
    pub derived: Derived,
}

/// Derive `base` once through `grammar`, recording the branch every
/// `random` step chose for every index it saw.
pub fn derive_random_output_step_index(
    base: Payload,
    grammar: &Grammar,
    operations: OperationTable,
    options: InterpreterOptions,
) -> InterpreterResult<Recording> {
    let recorder = Rc::new(RandomRecorder::new());
    let interpreter = interpret(grammar, operations, options.with_listener(recorder.clone()))?;
    let derived = interpreter.derive(base);
    Ok(Recording {
        record: recorder.take(),
        derived,
    })
}
