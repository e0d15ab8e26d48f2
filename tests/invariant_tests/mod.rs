//! Property checks for value conversions and operators.

use linden::ast::{BinaryOperator, LslType};
use linden::eval::operator::apply_binary;
use linden::eval::value::{normalize_key, parse_vector, NULL_KEY};
use linden::{Value, Vector};
use proptest::prelude::*;

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-z ]{0,8}".prop_map(Value::String),
    ]
}

fn list_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(scalar_strategy(), 0..5).prop_map(Value::List)
}

proptest! {
    #[test]
    fn test_integer_widening_round_trips(i in any::<i32>()) {
        let widened = Value::Integer(i).coerce(LslType::Float);
        prop_assert_eq!(widened.coerce(LslType::Integer), Value::Integer(i));
    }

    #[test]
    fn test_integer_arithmetic_wraps(a in any::<i32>(), b in any::<i32>()) {
        let (x, y) = (Value::Integer(a), Value::Integer(b));
        let apply = |op| apply_binary(op, &x, &y);
        prop_assert_eq!(apply(BinaryOperator::Add), Some(Value::Integer(a.wrapping_add(b))));
        prop_assert_eq!(apply(BinaryOperator::Subtract), Some(Value::Integer(a.wrapping_sub(b))));
        prop_assert_eq!(apply(BinaryOperator::Multiply), Some(Value::Integer(a.wrapping_mul(b))));
    }

    #[test]
    fn test_list_concatenation_is_associative(
        a in list_strategy(),
        b in list_strategy(),
        c in list_strategy(),
    ) {
        let left = apply_binary(BinaryOperator::Add, &a, &b)
            .and_then(|ab| apply_binary(BinaryOperator::Add, &ab, &c));
        let right = apply_binary(BinaryOperator::Add, &b, &c)
            .and_then(|bc| apply_binary(BinaryOperator::Add, &a, &bc));
        prop_assert!(left.is_some());
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_list_concatenation_preserves_length(a in list_strategy(), b in list_strategy()) {
        let joined = apply_binary(BinaryOperator::Add, &a, &b).map(|v| v.as_list().len());
        prop_assert_eq!(joined, Some(a.as_list().len() + b.as_list().len()));
    }

    #[test]
    fn test_vector_string_round_trip(
        x in -1000.0f64..1000.0,
        y in -1000.0f64..1000.0,
        z in -1000.0f64..1000.0,
    ) {
        let v = Vector::new(x, y, z);
        let parsed = parse_vector(&v.to_string());
        prop_assert!(parsed.is_some());
        let parsed = parsed.unwrap_or(Vector::ZERO);
        prop_assert!((parsed.x - x).abs() <= 1e-5);
        prop_assert!((parsed.y - y).abs() <= 1e-5);
        prop_assert!((parsed.z - z).abs() <= 1e-5);
    }

    #[test]
    fn test_non_numeric_strings_cast_to_zero(s in "[a-zA-Z_ ]{0,12}") {
        prop_assume!(!s.trim_start().to_ascii_lowercase().starts_with("inf")
            && !s.trim_start().to_ascii_lowercase().starts_with("nan"));
        prop_assert_eq!(Value::String(s.clone()).coerce(LslType::Integer), Value::Integer(0));
        prop_assert_eq!(Value::String(s).coerce(LslType::Float), Value::Float(0.0));
    }

    #[test]
    fn test_malformed_keys_become_null(s in "[g-z0-9-]{0,40}") {
        prop_assume!(s.len() != 36);
        prop_assert_eq!(normalize_key(&s), NULL_KEY);
        prop_assert_eq!(Value::key(&s), Value::Key(NULL_KEY.to_string()));
    }

    #[test]
    fn test_well_formed_keys_are_kept(bytes in any::<[u8; 16]>()) {
        let key = uuid::Uuid::from_bytes(bytes).hyphenated().to_string();
        prop_assert_eq!(Value::key(&key), Value::Key(key.clone()));
    }
}

#[test]
fn test_empty_string_casts() {
    let empty = Value::String(String::new());
    assert_eq!(empty.coerce(LslType::Integer), Value::Integer(0));
    assert_eq!(empty.coerce(LslType::Float), Value::Float(0.0));
    assert_eq!(empty.coerce(LslType::Key), Value::Key(NULL_KEY.to_string()));
    assert_eq!(empty.coerce(LslType::Vector), Value::Vector(Vector::ZERO));
}
