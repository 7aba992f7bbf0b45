//! Built-in unary and binary operators over payloads.

use shapegram_types::ast::{BinaryOperator, UnaryOperator};
use shapegram_types::Payload;

pub fn apply_unary(operator: UnaryOperator, operand: &Payload) -> Result<Payload, String> {
    match operator {
        UnaryOperator::Not => Ok(Payload::Bool(!operand.is_truthy())),
        UnaryOperator::Invert => match operand {
            Payload::Number(n) => Ok(Payload::Number(-n)),
            other => Err(format!("cannot invert {}", other.type_name())),
        },
    }
}

pub fn apply_binary(
    operator: BinaryOperator,
    left: &Payload,
    right: &Payload,
) -> Result<Payload, String> {
    match operator {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => arith(left, right, "subtract", |a, b| a - b),
        BinaryOperator::Multiply => arith(left, right, "multiply", |a, b| a * b),
        BinaryOperator::Divide => {
            if right.as_number() == Some(0.0) {
                return Err("division by zero".into());
            }
            arith(left, right, "divide", |a, b| a / b)
        }
        BinaryOperator::Modulo => {
            if right.as_number() == Some(0.0) {
                return Err("modulo by zero".into());
            }
            arith(left, right, "modulo", |a, b| a % b)
        }
        BinaryOperator::And => Ok(Payload::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOperator::Or => Ok(Payload::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOperator::Equal => Ok(Payload::Bool(left == right)),
        BinaryOperator::Unequal => Ok(Payload::Bool(left != right)),
        BinaryOperator::Smaller => compare(left, right, |o| o.is_lt()),
        BinaryOperator::SmallerEqual => compare(left, right, |o| o.is_le()),
        BinaryOperator::Greater => compare(left, right, |o| o.is_gt()),
        BinaryOperator::GreaterEqual => compare(left, right, |o| o.is_ge()),
    }
}

fn add(left: &Payload, right: &Payload) -> Result<Payload, String> {
    match (left, right) {
        (Payload::Number(a), Payload::Number(b)) => Ok(Payload::Number(a + b)),
        (Payload::String(a), Payload::String(b)) => Ok(Payload::String(format!("{a}{b}"))),
        (Payload::List(a), Payload::List(b)) => {
            Ok(Payload::List(a.iter().chain(b).cloned().collect()))
        }
        _ => Err(format!(
            "cannot add {} and {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

fn arith(
    left: &Payload,
    right: &Payload,
    verb: &str,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Payload, String> {
    match (left, right) {
        (Payload::Number(a), Payload::Number(b)) => Ok(Payload::Number(f(*a, *b))),
        _ => Err(format!(
            "cannot {verb} {} and {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

fn compare(
    left: &Payload,
    right: &Payload,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Payload, String> {
    let ordering = match (left, right) {
        (Payload::Number(a), Payload::Number(b)) => a.partial_cmp(b),
        (Payload::String(a), Payload::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))
        }
    };
    // NaN compares false against everything.
    Ok(Payload::Bool(ordering.is_some_and(accept)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> Payload {
        Payload::Number(v)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(apply_binary(BinaryOperator::Add, &n(2.0), &n(3.0)), Ok(n(5.0)));
        assert_eq!(apply_binary(BinaryOperator::Subtract, &n(2.0), &n(3.0)), Ok(n(-1.0)));
        assert_eq!(apply_binary(BinaryOperator::Modulo, &n(7.0), &n(4.0)), Ok(n(3.0)));
        assert!(apply_binary(BinaryOperator::Divide, &n(1.0), &n(0.0)).is_err());
        assert!(apply_binary(BinaryOperator::Multiply, &n(1.0), &Payload::from("x")).is_err());
    }

    #[test]
    fn string_concat_and_compare() {
        assert_eq!(
            apply_binary(BinaryOperator::Add, &Payload::from("ab"), &Payload::from("c")),
            Ok(Payload::from("abc"))
        );
        assert_eq!(
            apply_binary(BinaryOperator::Smaller, &Payload::from("a"), &Payload::from("b")),
            Ok(Payload::Bool(true))
        );
        assert!(apply_binary(BinaryOperator::Greater, &n(1.0), &Payload::from("b")).is_err());
    }

    #[test]
    fn logic_uses_truthiness() {
        assert_eq!(
            apply_binary(BinaryOperator::And, &n(1.0), &Payload::from("")),
            Ok(Payload::Bool(false))
        );
        assert_eq!(
            apply_binary(BinaryOperator::Or, &Payload::Null, &n(2.0)),
            Ok(Payload::Bool(true))
        );
        assert_eq!(apply_unary(UnaryOperator::Not, &Payload::Null), Ok(Payload::Bool(true)));
        assert_eq!(apply_unary(UnaryOperator::Invert, &n(4.0)), Ok(n(-4.0)));
        assert!(apply_unary(UnaryOperator::Invert, &Payload::Bool(true)).is_err());
    }

    #[test]
    fn equality_is_structural() {
        let list = Payload::List(vec![n(1.0), Payload::from("a")]);
        assert_eq!(
            apply_binary(BinaryOperator::Equal, &list, &list.clone()),
            Ok(Payload::Bool(true))
        );
        assert_eq!(
            apply_binary(BinaryOperator::Unequal, &n(1.0), &Payload::from("1")),
            Ok(Payload::Bool(true))
        );
    }
}
