//! Operator semantics over [`Value`]s.
//!
//! Functions here return `None` for operand combinations LSL does not define;
//! the expression evaluator reports those and substitutes the zero of the
//! left operand's type.

use crate::ast::{BinaryOperator, UnaryOperator};

use super::value::{Rotation, Value, Vector};

pub fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> Option<Value> {
    use BinaryOperator::*;
    match op {
        Add => add(left, right),
        Subtract => subtract(left, right),
        Multiply => multiply(left, right),
        Divide => divide(left, right),
        Modulo => modulo(left, right),
        Equal => Some(Value::from(equal(left, right))),
        NotEqual => Some(not_equal(left, right)),
        LessThan | GreaterThan | LessThanEqual | GreaterThanEqual => compare(op, left, right),
        And => Some(Value::from(left.is_truthy() && right.is_truthy())),
        Or => Some(Value::from(left.is_truthy() || right.is_truthy())),
        BitAnd | BitOr | BitXor | ShiftLeft | ShiftRight => bitwise(op, left, right),
    }
}

pub fn apply_unary(op: UnaryOperator, operand: &Value) -> Option<Value> {
    match (op, operand) {
        (UnaryOperator::Not, v) => Some(Value::from(!v.is_truthy())),
        (UnaryOperator::Plus, v) if v.type_of() != crate::ast::LslType::List => Some(v.clone()),
        (UnaryOperator::Negate, Value::Integer(i)) => Some(Value::Integer(i.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(f)) => Some(Value::Float(-f)),
        (UnaryOperator::Negate, Value::Vector(v)) => Some(Value::Vector(v.scale(-1.0))),
        (UnaryOperator::Negate, Value::Rotation(r)) => {
            Some(Value::Rotation(Rotation::new(-r.x, -r.y, -r.z, -r.s)))
        }
        (UnaryOperator::BitNot, Value::Integer(i)) => Some(Value::Integer(!i)),
        _ => None,
    }
}

fn add(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            Some(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::List(a), item) => {
            let mut items = a.clone();
            items.push(item.clone());
            Some(Value::List(items))
        }
        (item, Value::List(b)) => {
            let mut items = Vec::with_capacity(b.len() + 1);
            items.push(item.clone());
            items.extend(b.iter().cloned());
            Some(Value::List(items))
        }
        (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_add(*b))),
        (Value::String(a) | Value::Key(a), Value::String(b) | Value::Key(b)) => {
            Some(Value::String(format!("{}{}", a, b)))
        }
        (Value::Vector(a), Value::Vector(b)) => {
            Some(Value::Vector(Vector::new(a.x + b.x, a.y + b.y, a.z + b.z)))
        }
        (Value::Rotation(a), Value::Rotation(b)) => Some(Value::Rotation(Rotation::new(
            a.x + b.x,
            a.y + b.y,
            a.z + b.z,
            a.s + b.s,
        ))),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Some(Value::Float(a.as_float() + b.as_float()))
        }
        _ => None,
    }
}

fn subtract(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_sub(*b))),
        (Value::Vector(a), Value::Vector(b)) => {
            Some(Value::Vector(Vector::new(a.x - b.x, a.y - b.y, a.z - b.z)))
        }
        (Value::Rotation(a), Value::Rotation(b)) => Some(Value::Rotation(Rotation::new(
            a.x - b.x,
            a.y - b.y,
            a.z - b.z,
            a.s - b.s,
        ))),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Some(Value::Float(a.as_float() - b.as_float()))
        }
        _ => None,
    }
}

fn multiply(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_mul(*b))),
        (Value::Vector(a), Value::Vector(b)) => Some(Value::Float(a.dot(b))),
        (Value::Vector(v), s) | (s, Value::Vector(v)) if s.is_numeric() => {
            Some(Value::Vector(v.scale(s.as_float())))
        }
        (Value::Vector(v), Value::Rotation(r)) => Some(Value::Vector(r.apply(v))),
        (Value::Rotation(a), Value::Rotation(b)) => Some(Value::Rotation(a.compose(b))),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Some(Value::Float(a.as_float() * b.as_float()))
        }
        _ => None,
    }
}

fn divide(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Some(Value::Integer(0)),
        (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_div(*b))),
        (Value::Vector(v), s) if s.is_numeric() => Some(Value::Vector(v.scale(1.0 / s.as_float()))),
        (Value::Vector(v), Value::Rotation(r)) => Some(Value::Vector(r.conjugate().apply(v))),
        (Value::Rotation(a), Value::Rotation(b)) => {
            Some(Value::Rotation(a.compose(&b.conjugate())))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Some(Value::Float(a.as_float() / b.as_float()))
        }
        _ => None,
    }
}

fn modulo(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Some(Value::Integer(0)),
        (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(a.wrapping_rem(*b))),
        (Value::Vector(a), Value::Vector(b)) => Some(Value::Vector(a.cross(b))),
        _ => None,
    }
}

/// Value equality. Lists compare by length only.
pub fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(a), Value::List(b)) => a.len() == b.len(),
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (a, b) if a.is_numeric() && b.is_numeric() => a.as_float() == b.as_float(),
        (Value::String(a) | Value::Key(a), Value::String(b) | Value::Key(b)) => a == b,
        (Value::Vector(a), Value::Vector(b)) => a == b,
        (Value::Rotation(a), Value::Rotation(b)) => a == b,
        _ => false,
    }
}

/// Element-wise equality including type, used by list searches.
pub fn strict_equal(left: &Value, right: &Value) -> bool {
    left.type_of() == right.type_of() && left == right
}

fn not_equal(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            Value::Integer((a.len() as i64 - b.len() as i64) as i32)
        }
        _ => Value::from(!equal(left, right)),
    }
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Option<Value> {
    let result = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => match op {
            BinaryOperator::LessThan => a < b,
            BinaryOperator::GreaterThan => a > b,
            BinaryOperator::LessThanEqual => a <= b,
            _ => a >= b,
        },
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let (a, b) = (a.as_float(), b.as_float());
            match op {
                BinaryOperator::LessThan => a < b,
                BinaryOperator::GreaterThan => a > b,
                BinaryOperator::LessThanEqual => a <= b,
                _ => a >= b,
            }
        }
        _ => return None,
    };
    Some(Value::from(result))
}

fn bitwise(op: BinaryOperator, left: &Value, right: &Value) -> Option<Value> {
    let (Value::Integer(a), Value::Integer(b)) = (left, right) else {
        return None;
    };
    let shift = (*b as u32) & 31;
    let result = match op {
        BinaryOperator::BitAnd => a & b,
        BinaryOperator::BitOr => a | b,
        BinaryOperator::BitXor => a ^ b,
        BinaryOperator::ShiftLeft => a.wrapping_shl(shift),
        _ => a.wrapping_shr(shift),
    };
    Some(Value::Integer(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use BinaryOperator::*;

    fn bin(op: BinaryOperator, l: impl Into<Value>, r: impl Into<Value>) -> Option<Value> {
        apply_binary(op, &l.into(), &r.into())
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(bin(Add, i32::MAX, 1), Some(Value::Integer(i32::MIN)));
        assert_eq!(bin(Multiply, 65536, 65536), Some(Value::Integer(0)));
        assert_eq!(bin(Subtract, i32::MIN, 1), Some(Value::Integer(i32::MAX)));
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert_eq!(bin(Divide, 7, 0), Some(Value::Integer(0)));
        assert_eq!(bin(Modulo, 7, 0), Some(Value::Integer(0)));
        assert_eq!(bin(Divide, 7, 2), Some(Value::Integer(3)));
        assert_eq!(bin(Divide, -7, 2), Some(Value::Integer(-3)));
        assert_eq!(bin(Divide, i32::MIN, -1), Some(Value::Integer(i32::MIN)));
    }

    #[test]
    fn test_mixed_numeric() {
        assert_eq!(bin(Add, 1, 0.5), Some(Value::Float(1.5)));
        assert_eq!(bin(Divide, 1.0, 4), Some(Value::Float(0.25)));
        assert_eq!(bin(LessThan, 1, 1.5), Some(Value::Integer(1)));
        assert_eq!(bin(Equal, 2, 2.0), Some(Value::Integer(1)));
    }

    #[test]
    fn test_vector_products() {
        let a = Vector::new(1.0, 0.0, 0.0);
        let b = Vector::new(0.0, 1.0, 0.0);
        assert_eq!(bin(Multiply, a, b), Some(Value::Float(0.0)));
        assert_eq!(bin(Modulo, a, b), Some(Value::Vector(Vector::new(0.0, 0.0, 1.0))));
        assert_eq!(
            bin(Multiply, a, 2.0),
            Some(Value::Vector(Vector::new(2.0, 0.0, 0.0)))
        );
        assert_eq!(
            bin(Multiply, 2, a),
            Some(Value::Vector(Vector::new(2.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn test_rotation_composition_order() {
        let half = std::f64::consts::FRAC_PI_4;
        // 90 degrees about z, then 90 degrees about x
        let rz = Rotation::new(0.0, 0.0, half.sin(), half.cos());
        let rx = Rotation::new(half.sin(), 0.0, 0.0, half.cos());
        let v = Vector::new(1.0, 0.0, 0.0);

        let stepwise = rx.apply(&rz.apply(&v));
        let composed = match bin(Multiply, rz, rx) {
            Some(Value::Rotation(r)) => r.apply(&v),
            other => panic!("unexpected {:?}", other),
        };
        assert!((stepwise.x - composed.x).abs() < 1e-9);
        assert!((stepwise.y - composed.y).abs() < 1e-9);
        assert!((stepwise.z - composed.z).abs() < 1e-9);
        // x axis -> y axis -> z axis
        assert!((composed.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_list_concatenation() {
        let a = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(
            bin(Add, a.clone(), 3),
            Some(Value::list(vec![1.into(), 2.into(), 3.into()]))
        );
        assert_eq!(
            bin(Add, 0, a.clone()),
            Some(Value::list(vec![0.into(), 1.into(), 2.into()]))
        );
        assert_eq!(
            bin(Add, a.clone(), a.clone()),
            Some(Value::list(vec![1.into(), 2.into(), 1.into(), 2.into()]))
        );
    }

    #[test]
    fn test_list_comparison_quirks() {
        let a = Value::list(vec![1.into(), 2.into(), 3.into()]);
        let b = Value::list(vec!["x".into()]);
        assert_eq!(bin(Equal, a.clone(), b.clone()), Some(Value::Integer(0)));
        assert_eq!(bin(NotEqual, a.clone(), b.clone()), Some(Value::Integer(2)));
        let c = Value::list(vec!["p".into(), "q".into(), "r".into()]);
        assert_eq!(bin(Equal, a, c), Some(Value::Integer(1)));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(bin(BitAnd, 0b1100, 0b1010), Some(Value::Integer(0b1000)));
        assert_eq!(bin(BitXor, 0b1100, 0b1010), Some(Value::Integer(0b0110)));
        assert_eq!(bin(ShiftLeft, 1, 33), Some(Value::Integer(2)));
        assert_eq!(bin(ShiftRight, -8, 1), Some(Value::Integer(-4)));
        assert_eq!(bin(BitOr, 1.0, 2), None);
    }

    #[test]
    fn test_unsupported_combination() {
        assert_eq!(bin(Subtract, "a", "b"), None);
        assert_eq!(bin(LessThan, "a", "b"), None);
    }

    #[test]
    fn test_unary() {
        assert_eq!(
            apply_unary(UnaryOperator::Negate, &Value::Integer(i32::MIN)),
            Some(Value::Integer(i32::MIN))
        );
        assert_eq!(
            apply_unary(UnaryOperator::Not, &Value::from("")),
            Some(Value::Integer(1))
        );
        assert_eq!(
            apply_unary(UnaryOperator::BitNot, &Value::Integer(0)),
            Some(Value::Integer(-1))
        );
        assert_eq!(apply_unary(UnaryOperator::BitNot, &Value::Float(1.0)), None);
    }
}
