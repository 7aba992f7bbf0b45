//! Interpreter configuration and observation hooks.

use crate::value::Value;
use serde::Deserialize;
use shapegram_types::ast::StepPath;
use std::fmt;
use std::rc::Rc;

/// Default bound on how often one value may expand the same symbol.
pub const DEFAULT_MAX_SYMBOL_DEPTH: u32 = 100;

/// Reported by `random` steps before the chosen branch runs.
#[derive(Debug, Clone)]
pub struct RandomChoice<'a> {
    /// The `random` step that made the choice.
    pub path: &'a StepPath,
    /// The input value's index key, which seeded the draw.
    pub key: &'a str,
    /// Position of the chosen child.
    pub chosen: usize,
    pub value: &'a Value,
}

/// Observer of evaluation. All methods default to no-ops.
pub trait Listener {
    fn on_random(&self, _choice: &RandomChoice<'_>) {}

    fn on_before_step(&self, _path: &StepPath, _value: &Value) {}

    fn on_after_step(&self, _path: &StepPath, _value: &Value) {}
}

/// The listeners attached to an interpreter, called in registration order.
#[derive(Clone, Default)]
pub struct Listeners(Vec<Rc<dyn Listener>>);

impl Listeners {
    pub fn push(&mut self, listener: Rc<dyn Listener>) {
        self.0.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn random(&self, choice: &RandomChoice<'_>) {
        self.0.iter().for_each(|l| l.on_random(choice));
    }

    pub(crate) fn before_step(&self, path: &StepPath, value: &Value) {
        self.0.iter().for_each(|l| l.on_before_step(path, value));
    }

    pub(crate) fn after_step(&self, path: &StepPath, value: &Value) {
        self.0.iter().for_each(|l| l.on_after_step(path, value));
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.0.len())
    }
}

/// Interpreter options.
///
/// Deserializable from JSON; any field may be omitted:
///
/// ```json
/// { "seed": 7, "maxSymbolDepth": 20, "strictSwitch": true }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterpreterOptions {
    /// Seeds every random draw.
    pub seed: u64,
    /// Sleep at each step boundary, for paced visualization.
    pub delay_ms: Option<u64>,
    pub max_symbol_depth: u32,
    /// Report `switch` inputs that match no case instead of dropping them.
    pub strict_switch: bool,
    #[serde(skip)]
    pub listeners: Listeners,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            delay_ms: None,
            max_symbol_depth: DEFAULT_MAX_SYMBOL_DEPTH,
            strict_switch: false,
            listeners: Listeners::default(),
        }
    }
}

impl InterpreterOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_max_symbol_depth(mut self, depth: u32) -> Self {
        self.max_symbol_depth = depth;
        self
    }

    pub fn with_strict_switch(mut self, strict: bool) -> Self {
        self.strict_switch = strict;
        self
    }

    pub fn with_listener(mut self, listener: Rc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }
}
