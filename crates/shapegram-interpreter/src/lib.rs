//! shapegram reactive interpreter.
//!
//! Compiles a grammar into a transformer from a root value to a stream of
//! derived values. Each derived value carries a hierarchical index naming
//! the branch it came from; `random` steps draw deterministically from that
//! index and the configured seed.
//!
//! ```ignore
//! let interpreter = interpret(&grammar, OperationTable::new(), InterpreterOptions::default())?;
//! let derived = interpreter.derive(Payload::Number(1.0));
//! ```

mod compile;
mod derivation;
mod error;
mod evaluator;
mod join;
mod operation;
mod operator;
mod options;
mod random;
mod value;

pub use derivation::{Derivation, Event};
pub use error::{InterpreterError, InterpreterResult};
pub use join::IndexJoin;
pub use operation::{FnOperation, Operation, OperationTable};
pub use operator::{apply_binary, apply_unary};
pub use options::{
    InterpreterOptions, Listener, Listeners, RandomChoice, DEFAULT_MAX_SYMBOL_DEPTH,
};
pub use random::{choose, draw};
pub use value::{Generation, Value};

use compile::Program;
use evaluator::Runtime;
use shapegram_types::ast::Grammar;
use shapegram_types::{Index, Payload};
use std::cell::RefCell;
use std::rc::Rc;

/// A compiled grammar.
pub struct Interpreter {
    program: Rc<Program>,
}

/// Everything one root value derived.
#[derive(Debug, Clone, Default)]
pub struct Derived {
    /// Outputs in emission order.
    pub values: Vec<Value>,
    /// Branch failures, in the order they occurred.
    pub errors: Vec<(Index, InterpreterError)>,
}

impl Derived {
    pub fn payloads(&self) -> Vec<&Payload> {
        self.values.iter().map(|v| &v.raw).collect()
    }
}

/// Compile `grammar` against `operations`.
pub fn interpret(
    grammar: &Grammar,
    operations: OperationTable,
    options: InterpreterOptions,
) -> InterpreterResult<Interpreter> {
    let program = Program::compile(grammar, &operations, options)?;
    Ok(Interpreter {
        program: Rc::new(program),
    })
}

impl Interpreter {
    /// Derive from `raw` placed at root index `[0]`.
    pub fn derive(&self, raw: impl Into<Payload>) -> Derived {
        self.derive_value(Value::root(raw, vec![0]))
    }

    pub fn derive_value(&self, value: Value) -> Derived {
        let rt = Runtime::new(&self.program);
        let values = RefCell::new(Vec::new());
        self.program
            .start()
            .run(&rt, value, &|v| values.borrow_mut().push(v));
        Derived {
            values: values.into_inner(),
            errors: rt.into_failures(),
        }
    }

    /// A live derivation over changing roots.
    pub fn stream(&self) -> Derivation {
        Derivation::new(Rc::clone(&self.program))
    }

    pub fn start_rule(&self) -> &str {
        &self.program.names[0]
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.program.options
    }
}
