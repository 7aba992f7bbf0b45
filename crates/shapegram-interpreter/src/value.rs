//! Values flowing through a derivation.
//!
//! A [`Value`] is immutable; every step boundary produces a new value with
//! some fields overridden. Variable and symbol-depth maps are shared
//! copy-on-write (`Rc`), so branches never contend over them.

use crate::compile::Node;
use crate::evaluator::Runtime;
use shapegram_types::{index_key, Index, Payload};
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Generation
// ══════════════════════════════════════════════════════════════════════════════

/// Invalidation token.
///
/// Every root value pushed into a derivation gets a fresh epoch. A derived
/// value carries the epochs of every root it was computed from; it is stale
/// as soon as any of them has been superseded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Generation {
    epochs: Vec<u64>,
}

impl Generation {
    pub fn new(epoch: u64) -> Self {
        Self {
            epochs: vec![epoch],
        }
    }

    /// Union of both generations' epochs.
    pub fn combine(&self, other: &Generation) -> Generation {
        let mut epochs = self.epochs.clone();
        for &epoch in &other.epochs {
            if let Err(pos) = epochs.binary_search(&epoch) {
                epochs.insert(pos, epoch);
            }
        }
        Generation { epochs }
    }

    /// The most recent epoch, or 0 for values that never entered a
    /// derivation.
    pub fn newest(&self) -> u64 {
        self.epochs.last().copied().unwrap_or(0)
    }

    pub fn epochs(&self) -> &[u64] {
        &self.epochs
    }

    /// True while every contributing epoch is still live.
    pub fn is_current(&self, is_live: impl Fn(u64) -> bool) -> bool {
        self.epochs.iter().all(|&e| is_live(e))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Bindings
// ══════════════════════════════════════════════════════════════════════════════

/// A variable bound by `setVariable`.
///
/// The bound step is evaluated against the value that was current at
/// binding time, once, on first read; later reads replay the cached
/// results.
pub(crate) struct Binding {
    source: Value,
    node: Rc<Node>,
    cache: OnceCell<Vec<Value>>,
}

impl Binding {
    pub(crate) fn new(source: Value, node: Rc<Node>) -> Self {
        Self {
            source,
            node,
            cache: OnceCell::new(),
        }
    }

    pub(crate) fn values(&self, rt: &Runtime<'_>) -> &[Value] {
        self.cache.get_or_init(|| {
            let collected = RefCell::new(Vec::new());
            self.node
                .run(rt, self.source.clone(), &|v| collected.borrow_mut().push(v));
            collected.into_inner()
        })
    }
}

type Variables = Rc<BTreeMap<String, Rc<Binding>>>;

// ══════════════════════════════════════════════════════════════════════════════
// Value
// ══════════════════════════════════════════════════════════════════════════════

/// The unit flowing through the interpreter.
#[derive(Clone)]
pub struct Value {
    /// The payload.
    pub raw: Payload,
    /// Position among sibling branches.
    pub index: Index,
    generation: Generation,
    variables: Variables,
    symbol_depth: Rc<BTreeMap<String, u32>>,
}

impl Value {
    /// A root value with no bindings and an empty generation.
    pub fn root(raw: impl Into<Payload>, index: Index) -> Self {
        Self {
            raw: raw.into(),
            index,
            generation: Generation::default(),
            variables: Rc::default(),
            symbol_depth: Rc::default(),
        }
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// The comma-joined index, as used for random draws.
    pub fn index_key(&self) -> String {
        index_key(&self.index)
    }

    /// How many times this value has expanded `symbol`.
    pub fn symbol_depth(&self, symbol: &str) -> u32 {
        self.symbol_depth.get(symbol).copied().unwrap_or(0)
    }

    /// Names of the variables bound on this value.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    // ── Overrides ────────────────────────────────────────────────────────

    pub fn with_raw(&self, raw: Payload) -> Value {
        Value {
            raw,
            ..self.clone()
        }
    }

    pub fn with_generation(mut self, generation: Generation) -> Value {
        self.generation = generation;
        self
    }

    /// Extend the index by one branch position.
    pub fn with_index_extended(mut self, position: usize) -> Value {
        self.index.push(position);
        self
    }

    pub(crate) fn with_symbol_depth(mut self, symbol: &str, depth: u32) -> Value {
        Rc::make_mut(&mut self.symbol_depth).insert(symbol.to_string(), depth);
        self
    }

    pub(crate) fn with_variable(mut self, name: &str, binding: Rc<Binding>) -> Value {
        Rc::make_mut(&mut self.variables).insert(name.to_string(), binding);
        self
    }

    pub(crate) fn variable(&self, name: &str) -> Option<Rc<Binding>> {
        self.variables.get(name).cloned()
    }

    /// Take `bound`'s payload while keeping this value's index, bindings
    /// and depth counters. The result is invalidated by either side.
    pub(crate) fn substitute(&self, bound: &Value) -> Value {
        Value {
            raw: bound.raw.clone(),
            generation: self.generation.combine(&bound.generation),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("raw", &self.raw)
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("symbol_depth", &self.symbol_depth)
            .finish()
    }
}
