//! AST node types for shapegram grammars.
//!
//! A grammar is an ordered list of rules; each rule is a tree of [`Step`]s.
//! Every step is a [`StepKind`] plus its ordered children, so tree
//! algorithms (matching, rewriting, summarizing) can walk children
//! uniformly while evaluation matches exhaustively on the kind.

use crate::error::StructureError;
use crate::payload::Payload;
use serde::{Deserialize, Serialize};

// ══════════════════════════════════════════════════════════════════════════════
// Grammar
// ══════════════════════════════════════════════════════════════════════════════

/// An ordered list of named rules. The first rule is the start rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub rules: Vec<Rule>,
}

/// `name -> step`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub step: Step,
}

impl Rule {
    pub fn new(name: impl Into<String>, step: Step) -> Self {
        Self {
            name: name.into(),
            step,
        }
    }
}

impl Grammar {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// A grammar with a single rule.
    pub fn single(name: impl Into<String>, step: Step) -> Self {
        Self::new(vec![Rule::new(name, step)])
    }

    /// The start rule, if the grammar has any rules.
    pub fn start(&self) -> Option<&Rule> {
        self.rules.first()
    }

    /// Look up a rule by name. Earlier rules shadow later duplicates.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// Resolve a [`StepPath`] back to the step it addresses.
    pub fn step_at(&self, path: &StepPath) -> Option<&Step> {
        let mut step = &self.rules.get(path.rule)?.step;
        for &i in &path.children {
            step = step.children.get(i)?;
        }
        Some(step)
    }

    /// Validate every rule's tree.
    pub fn validate(&self) -> Result<(), StructureError> {
        self.rules.iter().try_for_each(|r| r.step.validate())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Step paths
// ══════════════════════════════════════════════════════════════════════════════

/// The identity of a step inside a grammar: its rule plus the child
/// positions leading to it from the rule's root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepPath {
    pub rule: usize,
    pub children: Vec<usize>,
}

impl StepPath {
    /// Path of a rule's root step.
    pub fn root(rule: usize) -> Self {
        Self {
            rule,
            children: Vec::new(),
        }
    }

    /// Path of this step's `i`-th child.
    pub fn child(&self, i: usize) -> Self {
        let mut children = self.children.clone();
        children.push(i);
        Self {
            rule: self.rule,
            children,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Steps
// ══════════════════════════════════════════════════════════════════════════════

/// One node of a rule's rewrite tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Step>,
}

/// The kind of a step. Child layout per kind is documented on each variant
/// and checked by [`Step::validate_shallow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepKind {
    /// Children run one after another, each feeding the next.
    Sequential,
    /// Children all receive the input; child `i` extends the index by `i`.
    Parallel,
    /// A pluggable domain operation; children are its parameters.
    Operation { identifier: String },
    /// A reference to a rule.
    Symbol { identifier: String },
    /// Replaces the payload with a constant.
    Raw { value: Payload },
    /// Identity.
    This,
    /// Terminates the branch.
    Null,
    /// `not x` / `-x`. One child.
    Unary { operator: UnaryOperator },
    /// `a + b`, `a == b`, ... Two children.
    Binary { operator: BinaryOperator },
    /// Children: condition, then, else.
    If,
    /// `children[0]` is the selector; `cases[i]` routes to `children[i + 1]`.
    Switch { cases: Vec<Vec<Payload>> },
    /// Substitutes a bound variable as the payload.
    GetVariable { identifier: String },
    /// Binds its single child's output under `identifier`.
    SetVariable { identifier: String },
    /// Pass-through marker.
    Return,
    /// Weighted choice; `probabilities[i]` belongs to `children[i]`.
    Random { probabilities: Vec<f64> },
}

impl StepKind {
    /// The step type name. Unary and binary steps are named after their
    /// operator, so `add` and `multiply` are different types.
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Sequential => "sequential",
            StepKind::Parallel => "parallel",
            StepKind::Operation { .. } => "operation",
            StepKind::Symbol { .. } => "symbol",
            StepKind::Raw { .. } => "raw",
            StepKind::This => "this",
            StepKind::Null => "null",
            StepKind::Unary { operator } => operator.as_str(),
            StepKind::Binary { operator } => operator.as_str(),
            StepKind::If => "if",
            StepKind::Switch { .. } => "switch",
            StepKind::GetVariable { .. } => "getVariable",
            StepKind::SetVariable { .. } => "setVariable",
            StepKind::Return => "return",
            StepKind::Random { .. } => "random",
        }
    }
}

impl Step {
    pub fn new(kind: StepKind, children: Vec<Step>) -> Self {
        Self { kind, children }
    }

    fn leaf(kind: StepKind) -> Self {
        Self::new(kind, Vec::new())
    }

    // ── Builders ─────────────────────────────────────────────────────────

    pub fn sequential(children: Vec<Step>) -> Self {
        Self::new(StepKind::Sequential, children)
    }

    pub fn parallel(children: Vec<Step>) -> Self {
        Self::new(StepKind::Parallel, children)
    }

    pub fn operation(identifier: impl Into<String>, children: Vec<Step>) -> Self {
        Self::new(
            StepKind::Operation {
                identifier: identifier.into(),
            },
            children,
        )
    }

    pub fn symbol(identifier: impl Into<String>) -> Self {
        Self::leaf(StepKind::Symbol {
            identifier: identifier.into(),
        })
    }

    pub fn raw(value: impl Into<Payload>) -> Self {
        Self::leaf(StepKind::Raw {
            value: value.into(),
        })
    }

    pub fn this() -> Self {
        Self::leaf(StepKind::This)
    }

    pub fn null() -> Self {
        Self::leaf(StepKind::Null)
    }

    pub fn ret() -> Self {
        Self::leaf(StepKind::Return)
    }

    pub fn unary(operator: UnaryOperator, child: Step) -> Self {
        Self::new(StepKind::Unary { operator }, vec![child])
    }

    pub fn binary(operator: BinaryOperator, left: Step, right: Step) -> Self {
        Self::new(StepKind::Binary { operator }, vec![left, right])
    }

    pub fn if_else(condition: Step, then: Step, otherwise: Step) -> Self {
        Self::new(StepKind::If, vec![condition, then, otherwise])
    }

    /// `switch selector { cases[0] -> branches[0], ... }`
    pub fn switch(selector: Step, cases: Vec<Vec<Payload>>, branches: Vec<Step>) -> Self {
        let mut children = Vec::with_capacity(branches.len() + 1);
        children.push(selector);
        children.extend(branches);
        Self::new(StepKind::Switch { cases }, children)
    }

    pub fn get_variable(identifier: impl Into<String>) -> Self {
        Self::leaf(StepKind::GetVariable {
            identifier: identifier.into(),
        })
    }

    pub fn set_variable(identifier: impl Into<String>, child: Step) -> Self {
        Self::new(
            StepKind::SetVariable {
                identifier: identifier.into(),
            },
            vec![child],
        )
    }

    pub fn random(children: Vec<Step>, probabilities: Vec<f64>) -> Self {
        Self::new(StepKind::Random { probabilities }, children)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check this node's child layout against its kind.
    pub fn validate_shallow(&self) -> Result<(), StructureError> {
        let found = self.children.len();
        let exactly = |expected: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(StructureError::ArityMismatch {
                    step_type: self.type_name(),
                    expected,
                    found,
                })
            }
        };
        match &self.kind {
            StepKind::Sequential | StepKind::Parallel | StepKind::Operation { .. } => Ok(()),
            StepKind::Symbol { .. }
            | StepKind::Raw { .. }
            | StepKind::This
            | StepKind::Null
            | StepKind::GetVariable { .. }
            | StepKind::Return => exactly(0),
            StepKind::Unary { .. } | StepKind::SetVariable { .. } => exactly(1),
            StepKind::Binary { .. } => exactly(2),
            StepKind::If => exactly(3),
            StepKind::Switch { cases } => {
                if found == cases.len() + 1 {
                    Ok(())
                } else {
                    Err(StructureError::MalformedSwitch {
                        cases: cases.len(),
                        branches: found.saturating_sub(1),
                    })
                }
            }
            StepKind::Random { probabilities } => {
                if found == probabilities.len() {
                    Ok(())
                } else {
                    Err(StructureError::MalformedRandomNode {
                        children: found,
                        probabilities: probabilities.len(),
                    })
                }
            }
        }
    }

    /// Check the whole tree.
    pub fn validate(&self) -> Result<(), StructureError> {
        self.validate_shallow()?;
        self.children.iter().try_for_each(Step::validate)
    }
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// Built-in unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    /// Logical negation of the operand's truthiness.
    Not,
    /// Numeric negation.
    Invert,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
            UnaryOperator::Invert => "invert",
        }
    }
}

/// Built-in binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Equal,
    Unequal,
    Smaller,
    SmallerEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "subtract",
            BinaryOperator::Multiply => "multiply",
            BinaryOperator::Divide => "divide",
            BinaryOperator::Modulo => "modulo",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Equal => "equal",
            BinaryOperator::Unequal => "unequal",
            BinaryOperator::Smaller => "smaller",
            BinaryOperator::SmallerEqual => "smallerEqual",
            BinaryOperator::Greater => "greater",
            BinaryOperator::GreaterEqual => "greaterEqual",
        }
    }

    /// Operators whose operands may be swapped without changing the result.
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Multiply
                | BinaryOperator::And
                | BinaryOperator::Or
                | BinaryOperator::Equal
                | BinaryOperator::Unequal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grammar {
        Grammar::new(vec![
            Rule::new(
                "a",
                Step::parallel(vec![
                    Step::raw(1.0),
                    Step::sequential(vec![Step::this(), Step::symbol("b")]),
                ]),
            ),
            Rule::new("b", Step::raw("leaf")),
        ])
    }

    #[test]
    fn start_rule_is_first() {
        let g = sample();
        assert_eq!(g.start().map(|r| r.name.as_str()), Some("a"));
        assert_eq!(g.rule_index("b"), Some(1));
        assert!(g.rule("c").is_none());
    }

    #[test]
    fn step_at_follows_children() {
        let g = sample();
        let path = StepPath::root(0).child(1).child(1);
        assert_eq!(g.step_at(&path), Some(&Step::symbol("b")));
        assert_eq!(g.step_at(&StepPath::root(1)), Some(&Step::raw("leaf")));
        assert!(g.step_at(&StepPath::root(0).child(5)).is_none());
    }

    #[test]
    fn type_names_follow_operators() {
        assert_eq!(
            Step::binary(BinaryOperator::SmallerEqual, Step::this(), Step::this()).type_name(),
            "smallerEqual"
        );
        assert_eq!(Step::unary(UnaryOperator::Not, Step::this()).type_name(), "not");
        assert_eq!(Step::random(vec![], vec![]).type_name(), "random");
    }

    #[test]
    fn validate_rejects_bad_arity() {
        let bad_if = Step::new(StepKind::If, vec![Step::this(), Step::this()]);
        assert_eq!(
            bad_if.validate(),
            Err(StructureError::ArityMismatch {
                step_type: "if",
                expected: 3,
                found: 2
            })
        );

        let bad_random = Step::sequential(vec![Step::random(vec![Step::this()], vec![0.5, 0.5])]);
        assert_eq!(
            bad_random.validate(),
            Err(StructureError::MalformedRandomNode {
                children: 1,
                probabilities: 2
            })
        );

        let bad_switch = Step::new(
            StepKind::Switch {
                cases: vec![vec![Payload::Number(1.0)]],
            },
            vec![Step::this()],
        );
        assert_eq!(
            bad_switch.validate(),
            Err(StructureError::MalformedSwitch {
                cases: 1,
                branches: 0
            })
        );

        assert!(sample().validate().is_ok());
    }

    #[test]
    fn commutativity() {
        assert!(BinaryOperator::Add.is_commutative());
        assert!(BinaryOperator::Unequal.is_commutative());
        assert!(!BinaryOperator::Subtract.is_commutative());
        assert!(!BinaryOperator::Smaller.is_commutative());
    }

    #[test]
    fn json_round_trip() {
        let g = Grammar::single(
            "a",
            Step::switch(
                Step::operation("id", vec![]),
                vec![vec![Payload::from("0")]],
                vec![Step::random(vec![Step::raw(1.0), Step::null()], vec![0.25, 0.75])],
            ),
        );
        let json = serde_json::to_string(&g).unwrap();
        assert!(json.contains(r#""type":"switch""#));
        assert!(json.contains(r#""type":"random""#));
        let back: Grammar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
