//! # LSL Abstract Syntax Tree
//!
//! The engine consumes a script in the dictionary shape produced by the
//! [`analyzer`](crate::analyzer):
//!
//! ```text
//! { globals:   [ {name, type, init?} ],
//!   functions: { name -> {return_type, params: [{type, name}], body: [Stmt]} },
//!   states:    { state_name -> { event_name -> {params: [...], body: [Stmt]} } } }
//! ```
//!
//! Every type derives serde so that an external parser can hand the engine the
//! same dictionary as JSON. Statements and expressions are internally tagged
//! with a `kind` field.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STATE: &str = "default";

/// The seven LSL value types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum LslType {
    #[strum(serialize = "integer")]
    Integer,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "key")]
    Key,
    #[strum(serialize = "vector")]
    Vector,
    #[strum(to_string = "rotation", serialize = "quaternion")]
    #[serde(alias = "quaternion")]
    Rotation,
    #[strum(serialize = "list")]
    List,
}

// Root AST Definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub globals: Vec<GlobalVar>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDef>,
    #[serde(default)]
    pub states: BTreeMap<String, StateDef>,
}

impl Script {
    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    pub fn handler(&self, state: &str, event: &str) -> Option<&EventHandlerDef> {
        self.states.get(state).and_then(|s| s.handlers.get(event))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVar {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: LslType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub ty: LslType,
    pub name: String,
}

impl Parameter {
    pub fn new(ty: LslType, name: &str) -> Self {
        Self {
            ty,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// `None` for functions declared without a return type.
    #[serde(default)]
    pub return_type: Option<LslType>,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

/// A named bundle of event handlers, keyed by event name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDef {
    pub handlers: BTreeMap<String, EventHandlerDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventHandlerDef {
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Declaration {
        name: String,
        #[serde(rename = "type")]
        ty: LslType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init: Option<Expression>,
    },
    Assignment {
        target: LValue,
        #[serde(default)]
        op: AssignOp,
        value: Expression,
    },
    Expression {
        expr: Expression,
    },
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    For {
        #[serde(default)]
        init: Vec<Expression>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Expression>,
        #[serde(default)]
        step: Vec<Expression>,
        body: Box<Statement>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expression>,
    },
    StateChange {
        state: String,
    },
    Jump {
        label: String,
    },
    Label {
        name: String,
    },
    Compound {
        body: Vec<Statement>,
    },
    Break,
    Continue,
    /// A lone `;`.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// `++x`, `x--`, `v.x++` ...
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: LValue,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    VectorLiteral {
        x: Box<Expression>,
        y: Box<Expression>,
        z: Box<Expression>,
    },
    RotationLiteral {
        x: Box<Expression>,
        y: Box<Expression>,
        z: Box<Expression>,
        s: Box<Expression>,
    },
    ListLiteral {
        #[serde(default)]
        items: Vec<Expression>,
    },
    Component {
        target: Box<Expression>,
        axis: Axis,
    },
    Subscript {
        list: Box<Expression>,
        index: Box<Expression>,
    },
    Slice {
        list: Box<Expression>,
        start: Box<Expression>,
        end: Box<Expression>,
    },
    Cast {
        #[serde(rename = "type")]
        ty: LslType,
        expr: Box<Expression>,
    },
    /// Assignment used as a value, e.g. `for (i = 0; ...)`.
    Assign {
        target: LValue,
        #[serde(default)]
        op: AssignOp,
        value: Box<Expression>,
    },
}

impl Expression {
    pub fn integer(i: i32) -> Self {
        Expression::Literal {
            value: Literal::Integer(i),
        }
    }

    pub fn float(f: f64) -> Self {
        Expression::Literal {
            value: Literal::Float(f),
        }
    }

    pub fn string(s: &str) -> Self {
        Expression::Literal {
            value: Literal::String(s.to_string()),
        }
    }

    pub fn ident(name: &str) -> Self {
        Expression::Identifier {
            name: name.to_string(),
        }
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.to_string(),
            args,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Literal {
    Integer(i32),
    Float(f64),
    String(String),
}

/// Assignable locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LValue {
    Identifier { name: String },
    Component { name: String, axis: Axis },
    Element { name: String, index: Box<Expression> },
}

impl LValue {
    pub fn name(&self) -> &str {
        match self {
            LValue::Identifier { name }
            | LValue::Component { name, .. }
            | LValue::Element { name, .. } => name,
        }
    }

    pub fn ident(name: &str) -> Self {
        LValue::Identifier {
            name: name.to_string(),
        }
    }
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LValue::Identifier { name } => write!(f, "{}", name),
            LValue::Component { name, axis } => write!(f, "{}.{}", name, axis),
            LValue::Element { name, .. } => write!(f, "{}[...]", name),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[strum(serialize = ">>")]
    ShiftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "~")]
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum IncDecOp {
    #[strum(serialize = "++")]
    Increment,
    #[strum(serialize = "--")]
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    #[default]
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    Add,
    #[strum(serialize = "-=")]
    Subtract,
    #[strum(serialize = "*=")]
    Multiply,
    #[strum(serialize = "/=")]
    Divide,
    #[strum(serialize = "%=")]
    Modulo,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, `None` for plain `=`.
    pub fn binary(&self) -> Option<BinaryOperator> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOperator::Add),
            AssignOp::Subtract => Some(BinaryOperator::Subtract),
            AssignOp::Multiply => Some(BinaryOperator::Multiply),
            AssignOp::Divide => Some(BinaryOperator::Divide),
            AssignOp::Modulo => Some(BinaryOperator::Modulo),
        }
    }
}
