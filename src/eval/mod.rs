//! # Evaluator
//!
//! A direct tree walk over the [`Script`](crate::ast::Script) AST.
//!
//! * [`value`]: the seven LSL value types and their coercions
//! * [`operator`]: binary and unary operator semantics
//! * [`context`]: frames, the call stack and per-dispatch state
//! * [`expression`] / [`statement`]: the evaluators proper
//! * [`evaluator`]: handler entry point and fatal [`EvalError`]s
//!
//! Statements yield a [`StatementResult`]; `return`, `break`, `continue`,
//! `jump` and `state` travel upward as [`ControlFlow`] values until a loop,
//! block, function call or the scheduler consumes them.

pub mod constants;
pub mod context;
pub mod evaluator;
pub mod expression;
pub mod operator;
pub mod statement;
pub mod value;

pub use context::{CallStack, ExecutionContext, Frame};
pub use evaluator::{EvalError, EvalResult, Evaluator, HandlerOutcome};
pub use statement::{ControlFlow, StatementResult};
pub use value::{Rotation, Value, Vector};
