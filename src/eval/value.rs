//! # LSL Value Model
//!
//! Seven tagged value types with LSL's coercion rules:
//!
//! | From \ To | integer | float | string | key | vector | rotation | list |
//! |---|---|---|---|---|---|---|---|
//! | integer | = | widen | decimal | via string | via string | via string | `[v]` |
//! | float | truncate | = | `%.6f` | via string | via string | via string | `[v]` |
//! | string | leading numeric | leading numeric | = | UUID check | `<a,b,c>` | `<a,b,c,d>` | `[v]` |
//! | list | single element, else string form | | concat | | | | = |
//!
//! Lists never contain lists; [`Value::list`] flattens nested lists on the way in.

use core::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::LslType;

pub const NULL_KEY: &str = "00000000-0000-0000-0000-000000000000";

lazy_static! {
    static ref INTEGER_PREFIX: Regex =
        Regex::new(r"(?i)^\s*([+-]?)(0x[0-9a-f]+|[0-9]+)").expect("valid integer regex");
    static ref FLOAT_PREFIX: Regex = Regex::new(
        r"(?i)^\s*[+-]?(infinity|inf|nan|([0-9]+\.?[0-9]*|\.[0-9]+)(e[+-]?[0-9]+)?)"
    )
    .expect("valid float regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector) -> Vector {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn scale(&self, factor: f64) -> Vector {
        Vector::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn normalize(&self) -> Vector {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{:.5}, {:.5}, {:.5}>", self.x, self.y, self.z)
    }
}

/// A quaternion with LSL component order `(x, y, z, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub s: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        s: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64, s: f64) -> Self {
        Self { x, y, z, s }
    }

    /// Hamilton product `self ⊗ other`.
    pub fn hamilton(&self, other: &Rotation) -> Rotation {
        let (a, b) = (self, other);
        Rotation::new(
            a.s * b.x + a.x * b.s + a.y * b.z - a.z * b.y,
            a.s * b.y - a.x * b.z + a.y * b.s + a.z * b.x,
            a.s * b.z + a.x * b.y - a.y * b.x + a.z * b.s,
            a.s * b.s - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }

    /// LSL composition: `a * b` applies `a` first, then `b`.
    pub fn compose(&self, then: &Rotation) -> Rotation {
        then.hamilton(self)
    }

    pub fn conjugate(&self) -> Rotation {
        Rotation::new(-self.x, -self.y, -self.z, self.s)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.s * self.s).sqrt()
    }

    pub fn normalize(&self) -> Rotation {
        let n = self.norm();
        if n == 0.0 {
            Rotation::IDENTITY
        } else {
            Rotation::new(self.x / n, self.y / n, self.z / n, self.s / n)
        }
    }

    /// Rotates `v` by this rotation: `q v q*`.
    pub fn apply(&self, v: &Vector) -> Vector {
        let p = Rotation::new(v.x, v.y, v.z, 0.0);
        let r = self.hamilton(&p).hamilton(&self.conjugate());
        Vector::new(r.x, r.y, r.z)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0 && self.s == 0.0
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<{:.5}, {:.5}, {:.5}, {:.5}>",
            self.x, self.y, self.z, self.s
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Integer(i32),
    Float(f64),
    String(String),
    Key(String),
    Vector(Vector),
    Rotation(Rotation),
    List(Vec<Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Integer(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.6}", x),
            Value::String(s) | Value::Key(s) => write!(f, "{}", s),
            Value::Vector(v) => write!(f, "{}", v),
            Value::Rotation(r) => write!(f, "{}", r),
            Value::List(items) => items.iter().try_for_each(|item| write!(f, "{}", item)),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(b as i32)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        Value::Vector(v)
    }
}

impl From<Rotation> for Value {
    fn from(r: Rotation) -> Self {
        Value::Rotation(r)
    }
}

impl Value {
    pub fn default_of(ty: LslType) -> Value {
        match ty {
            LslType::Integer => Value::Integer(0),
            LslType::Float => Value::Float(0.0),
            LslType::String => Value::String(String::new()),
            LslType::Key => Value::Key(NULL_KEY.to_string()),
            LslType::Vector => Value::Vector(Vector::ZERO),
            LslType::Rotation => Value::Rotation(Rotation::IDENTITY),
            LslType::List => Value::List(Vec::new()),
        }
    }

    pub fn type_of(&self) -> LslType {
        match self {
            Value::Integer(_) => LslType::Integer,
            Value::Float(_) => LslType::Float,
            Value::String(_) => LslType::String,
            Value::Key(_) => LslType::Key,
            Value::Vector(_) => LslType::Vector,
            Value::Rotation(_) => LslType::Rotation,
            Value::List(_) => LslType::List,
        }
    }

    /// A key value; malformed UUIDs become [`NULL_KEY`].
    pub fn key(s: &str) -> Value {
        Value::Key(normalize_key(s))
    }

    /// Builds a list, splicing any nested list in place.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        let mut out = Vec::new();
        for item in items {
            match item {
                Value::List(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        Value::List(out)
    }

    pub fn coerce(&self, target: LslType) -> Value {
        if self.type_of() == target {
            return match self {
                Value::Key(k) => Value::key(k),
                other => other.clone(),
            };
        }
        match (self, target) {
            (_, LslType::List) => Value::List(vec![self.clone()]),
            (Value::List(items), _) => match items.as_slice() {
                [single] => single.coerce(target),
                _ => Value::String(self.to_string()).coerce(target),
            },
            (Value::Integer(i), LslType::Float) => Value::Float(*i as f64),
            (Value::Float(f), LslType::Integer) => Value::Integer(float_to_integer(*f)),
            (_, LslType::Integer) => Value::Integer(parse_integer_prefix(&self.to_string())),
            (_, LslType::Float) => Value::Float(parse_float_prefix(&self.to_string())),
            (_, LslType::String) => Value::String(self.to_string()),
            (_, LslType::Key) => Value::key(&self.to_string()),
            (_, LslType::Vector) => {
                Value::Vector(parse_vector(&self.to_string()).unwrap_or(Vector::ZERO))
            }
            (_, LslType::Rotation) => {
                Value::Rotation(parse_rotation(&self.to_string()).unwrap_or(Rotation::IDENTITY))
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Key(k) => is_valid_key(k) && !k.eq_ignore_ascii_case(NULL_KEY),
            Value::Vector(v) => !v.is_zero(),
            Value::Rotation(r) => !r.is_zero(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_integer(&self) -> i32 {
        match self.coerce(LslType::Integer) {
            Value::Integer(i) => i,
            _ => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self.coerce(LslType::Float) {
            Value::Float(f) => f,
            _ => 0.0,
        }
    }

    pub fn as_vector(&self) -> Vector {
        match self.coerce(LslType::Vector) {
            Value::Vector(v) => v,
            _ => Vector::ZERO,
        }
    }

    pub fn as_rotation(&self) -> Rotation {
        match self.coerce(LslType::Rotation) {
            Value::Rotation(r) => r,
            _ => Rotation::IDENTITY,
        }
    }

    pub fn as_list(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }
}

/// Truncates toward zero; NaN becomes 0 and out-of-range values saturate.
pub fn float_to_integer(f: f64) -> i32 {
    f.trunc() as i32
}

pub fn is_valid_key(s: &str) -> bool {
    s.len() == 36 && uuid::Uuid::try_parse(s).is_ok()
}

pub fn normalize_key(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() == 36 {
        if let Ok(uuid) = uuid::Uuid::try_parse(trimmed) {
            return uuid.hyphenated().to_string();
        }
    }
    NULL_KEY.to_string()
}

/// Leading-numeric parse: optional whitespace and sign, then decimal or
/// `0x` hex digits. Anything else yields 0.
pub fn parse_integer_prefix(s: &str) -> i32 {
    let Some(caps) = INTEGER_PREFIX.captures(s) else {
        return 0;
    };
    let negative = caps.get(1).map_or(false, |m| m.as_str() == "-");
    let digits = caps.get(2).map_or("", |m| m.as_str());
    let magnitude = match digits.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("0x") => {
            u64::from_str_radix(&digits[2..], 16).unwrap_or(u64::MAX)
        }
        _ => digits.parse::<u64>().unwrap_or(u64::MAX),
    };
    let value = if magnitude > u32::MAX as u64 {
        -1
    } else {
        magnitude as u32 as i32
    };
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

pub fn parse_float_prefix(s: &str) -> f64 {
    FLOAT_PREFIX
        .find(s)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn parse_components(s: &str, count: usize) -> Option<Vec<f64>> {
    let inner = s.trim().strip_prefix('<')?;
    let inner = match inner.find('>') {
        Some(end) => &inner[..end],
        None => inner,
    };
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() != count {
        return None;
    }
    parts
        .iter()
        .map(|part| {
            FLOAT_PREFIX
                .find(part)
                .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        })
        .collect()
}

/// Parses `<x, y, z>`; `None` when malformed.
pub fn parse_vector(s: &str) -> Option<Vector> {
    let c = parse_components(s, 3)?;
    Some(Vector::new(c[0], c[1], c[2]))
}

/// Parses `<x, y, z, s>`; `None` when malformed.
pub fn parse_rotation(s: &str) -> Option<Rotation> {
    let c = parse_components(s, 4)?;
    Some(Rotation::new(c[0], c[1], c[2], c[3]))
}
