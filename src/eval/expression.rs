use std::sync::Arc;

use async_recursion::async_recursion;
use tracing::trace;

use crate::ast::{
    AssignOp, Axis, BinaryOperator, Expression, FunctionDef, IncDecOp, LValue, Literal, LslType,
};
use crate::host::{lists, HostCall, HostError, HostFunction};
use crate::output::DiagnosticKind;

use super::context::{ExecutionContext, Frame};
use super::evaluator::{EvalError, EvalResult};
use super::operator::{apply_binary, apply_unary};
use super::statement::{ControlFlow, StatementEvaluator, StatementResult};
use super::value::{Rotation, Value, Vector};

/// Tree-walking expression evaluator. Stateless; everything mutable lives in
/// the [`ExecutionContext`].
#[derive(Debug, Default)]
pub struct ExpressionEvaluator;

/// Zero of the type the surrounding context expects, integer 0 without one.
fn fallback(hint: Option<LslType>) -> Value {
    hint.map(Value::default_of).unwrap_or_default()
}

fn component(value: &Value, axis: Axis) -> Option<f64> {
    match (value, axis) {
        (Value::Vector(v), Axis::X) => Some(v.x),
        (Value::Vector(v), Axis::Y) => Some(v.y),
        (Value::Vector(v), Axis::Z) => Some(v.z),
        (Value::Rotation(r), Axis::X) => Some(r.x),
        (Value::Rotation(r), Axis::Y) => Some(r.y),
        (Value::Rotation(r), Axis::Z) => Some(r.z),
        (Value::Rotation(r), Axis::S) => Some(r.s),
        _ => None,
    }
}

fn with_component(value: &Value, axis: Axis, f: f64) -> Option<Value> {
    let mut value = value.clone();
    match (&mut value, axis) {
        (Value::Vector(v), Axis::X) => v.x = f,
        (Value::Vector(v), Axis::Y) => v.y = f,
        (Value::Vector(v), Axis::Z) => v.z = f,
        (Value::Rotation(r), Axis::X) => r.x = f,
        (Value::Rotation(r), Axis::Y) => r.y = f,
        (Value::Rotation(r), Axis::Z) => r.z = f,
        (Value::Rotation(r), Axis::S) => r.s = f,
        _ => return None,
    }
    Some(value)
}

/// Negative indices count from the end.
fn list_index(len: usize, index: i32) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 {
        len + i64::from(index)
    } else {
        i64::from(index)
    };
    if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

/// Implicit conversions LSL performs on call arguments without complaint.
fn implicitly_converts(from: LslType, to: LslType) -> bool {
    from == to
        || matches!(
            (from, to),
            (LslType::Integer, LslType::Float)
                | (LslType::String, LslType::Key)
                | (LslType::Key, LslType::String)
        )
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        self.eval_with_hint(expr, context, None).await
    }

    /// `hint` is the type the surrounding context expects; it only decides
    /// which zero to produce when a lookup fails.
    #[async_recursion]
    pub async fn eval_with_hint(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
        hint: Option<LslType>,
    ) -> EvalResult<Value> {
        match expr {
            Expression::Literal { value } => Ok(Self::eval_literal(value)),
            Expression::Identifier { name } => Ok(self.eval_identifier(name, &context, hint)),
            Expression::Binary { op, left, right } => {
                self.eval_binary_op(*op, left, right, context).await
            }
            Expression::Unary { op, operand } => {
                let value = self.eval_expression(operand, context.clone()).await?;
                Ok(apply_unary(*op, &value).unwrap_or_else(|| {
                    context.warn(
                        DiagnosticKind::TypeMismatch,
                        format!("operator {} is not defined for {}", op, value.type_of()),
                    );
                    Value::default_of(value.type_of())
                }))
            }
            Expression::IncDec { op, prefix, target } => {
                self.eval_inc_dec(*op, *prefix, target, context).await
            }
            Expression::Call { name, args } => {
                self.eval_function_call(name, args, context, hint).await
            }
            Expression::VectorLiteral { x, y, z } => {
                let x = self.eval_float(x, context.clone()).await?;
                let y = self.eval_float(y, context.clone()).await?;
                let z = self.eval_float(z, context).await?;
                Ok(Value::Vector(Vector::new(x, y, z)))
            }
            Expression::RotationLiteral { x, y, z, s } => {
                let x = self.eval_float(x, context.clone()).await?;
                let y = self.eval_float(y, context.clone()).await?;
                let z = self.eval_float(z, context.clone()).await?;
                let s = self.eval_float(s, context).await?;
                Ok(Value::Rotation(Rotation::new(x, y, z, s)))
            }
            Expression::ListLiteral { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expression(item, context.clone()).await?);
                }
                Ok(Value::list(values))
            }
            Expression::Component { target, axis } => {
                let value = self.eval_expression(target, context.clone()).await?;
                Ok(match component(&value, *axis) {
                    Some(f) => Value::Float(f),
                    None => {
                        context.warn(
                            DiagnosticKind::TypeMismatch,
                            format!("{} has no component .{}", value.type_of(), axis),
                        );
                        Value::Float(0.0)
                    }
                })
            }
            Expression::Subscript { list, index } => {
                let items = self.eval_expression(list, context.clone()).await?.as_list();
                let index = self.eval_expression(index, context.clone()).await?.as_integer();
                Ok(match list_index(items.len(), index) {
                    Some(i) => items[i].clone(),
                    None => {
                        context.warn(
                            DiagnosticKind::IndexOutOfRange,
                            format!("index {} out of range for list of {}", index, items.len()),
                        );
                        fallback(hint)
                    }
                })
            }
            Expression::Slice { list, start, end } => {
                let items = self.eval_expression(list, context.clone()).await?.as_list();
                let start = self.eval_expression(start, context.clone()).await?.as_integer();
                let end = self.eval_expression(end, context).await?.as_integer();
                Ok(Value::List(lists::sub_list(&items, start, end)))
            }
            Expression::Cast { ty, expr } => Ok(self
                .eval_with_hint(expr, context, Some(*ty))
                .await?
                .coerce(*ty)),
            Expression::Assign { target, op, value } => {
                self.eval_assign(target, *op, value, context).await
            }
        }
    }

    fn eval_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    fn eval_identifier(
        &self,
        name: &str,
        context: &ExecutionContext,
        hint: Option<LslType>,
    ) -> Value {
        context.resolve(name).unwrap_or_else(|e| {
            context.warn(DiagnosticKind::UnknownIdentifier, e.to_string());
            fallback(hint)
        })
    }

    async fn eval_float(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<f64> {
        Ok(self
            .eval_with_hint(expr, context, Some(LslType::Float))
            .await?
            .as_float())
    }

    async fn eval_binary_op(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let left = self.eval_expression(left, context.clone()).await?;
        match op {
            BinaryOperator::And if !left.is_truthy() => return Ok(Value::Integer(0)),
            BinaryOperator::Or if left.is_truthy() => return Ok(Value::Integer(1)),
            _ => {}
        }
        let right = self.eval_expression(right, context.clone()).await?;
        Ok(self.apply_or_warn(op, &left, &right, &context))
    }

    fn apply_or_warn(
        &self,
        op: BinaryOperator,
        left: &Value,
        right: &Value,
        context: &ExecutionContext,
    ) -> Value {
        apply_binary(op, left, right).unwrap_or_else(|| {
            context.warn(
                DiagnosticKind::TypeMismatch,
                format!(
                    "operator {} is not defined for {} and {}",
                    op,
                    left.type_of(),
                    right.type_of()
                ),
            );
            Value::default_of(left.type_of())
        })
    }

    /// Static type of an assignment target, used as the right-hand side hint.
    fn target_type(&self, target: &LValue, context: &ExecutionContext) -> Option<LslType> {
        match target {
            LValue::Identifier { name } => context.variable_type(name),
            LValue::Component { .. } => Some(LslType::Float),
            LValue::Element { .. } => None,
        }
    }

    #[async_recursion]
    async fn read_lvalue(
        &self,
        target: &LValue,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let hint = self.target_type(target, &context);
        let value = match target {
            LValue::Identifier { name } => self.eval_identifier(name, &context, hint),
            LValue::Component { name, axis } => {
                let base = self.eval_identifier(name, &context, None);
                match component(&base, *axis) {
                    Some(f) => Value::Float(f),
                    None => {
                        context.warn(
                            DiagnosticKind::TypeMismatch,
                            format!("`{}` has no component .{}", name, axis),
                        );
                        Value::Float(0.0)
                    }
                }
            }
            LValue::Element { name, index } => {
                let items = self.eval_identifier(name, &context, None).as_list();
                let index = self.eval_expression(index, context.clone()).await?.as_integer();
                match list_index(items.len(), index) {
                    Some(i) => items[i].clone(),
                    None => {
                        context.warn(
                            DiagnosticKind::IndexOutOfRange,
                            format!("index {} out of range for `{}`", index, name),
                        );
                        Value::default()
                    }
                }
            }
        };
        Ok(value)
    }

    /// Stores `value` and returns what was actually stored after coercion.
    #[async_recursion]
    async fn write_lvalue(
        &self,
        target: &LValue,
        value: Value,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match target {
            LValue::Identifier { name } => Ok(context.assign(name, value)),
            LValue::Component { name, axis } => {
                let base = self.eval_identifier(name, &context, None);
                let f = value.as_float();
                match with_component(&base, *axis, f) {
                    Some(updated) => {
                        context.assign(name, updated);
                    }
                    None => context.warn(
                        DiagnosticKind::TypeMismatch,
                        format!("`{}` has no component .{}", name, axis),
                    ),
                }
                Ok(Value::Float(f))
            }
            LValue::Element { name, index } => {
                let mut items = self.eval_identifier(name, &context, None).as_list();
                let index = self.eval_expression(index, context.clone()).await?.as_integer();
                match list_index(items.len(), index) {
                    Some(i) => {
                        items.splice(i..=i, value.as_list());
                        context.assign(name, Value::List(items));
                    }
                    None => context.warn(
                        DiagnosticKind::IndexOutOfRange,
                        format!("index {} out of range for `{}`", index, name),
                    ),
                }
                Ok(value)
            }
        }
    }

    pub async fn eval_assign(
        &self,
        target: &LValue,
        op: AssignOp,
        value: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let hint = self.target_type(target, &context);
        let rhs = self.eval_with_hint(value, context.clone(), hint).await?;
        let value = match op.binary() {
            None => rhs,
            Some(bop) => {
                let current = self.read_lvalue(target, context.clone()).await?;
                self.apply_or_warn(bop, &current, &rhs, &context)
            }
        };
        self.write_lvalue(target, value, context).await
    }

    async fn eval_inc_dec(
        &self,
        op: IncDecOp,
        prefix: bool,
        target: &LValue,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let old = self.read_lvalue(target, context.clone()).await?;
        let delta = match op {
            IncDecOp::Increment => 1,
            IncDecOp::Decrement => -1,
        };
        let new = match &old {
            Value::Integer(i) => Value::Integer(i.wrapping_add(delta)),
            Value::Float(f) => Value::Float(f + f64::from(delta)),
            other => {
                context.warn(
                    DiagnosticKind::TypeMismatch,
                    format!("{} cannot be applied to {}", op, other.type_of()),
                );
                return Ok(other.clone());
            }
        };
        let stored = self.write_lvalue(target, new, context).await?;
        Ok(if prefix { stored } else { old })
    }

    /// User functions shadow host functions of the same name.
    async fn eval_function_call(
        &self,
        name: &str,
        args: &[Expression],
        context: Arc<ExecutionContext>,
        hint: Option<LslType>,
    ) -> EvalResult<Value> {
        if let Some(function) = context.script().function(name) {
            return self.call_user_function(name, function, args, context.clone()).await;
        }
        if let Some(function) = context.host().get(name).cloned() {
            return self.call_host_function(&function, args, context).await;
        }
        for arg in args {
            self.eval_expression(arg, context.clone()).await?;
        }
        context.warn(
            DiagnosticKind::UnknownFunction,
            format!("unknown function `{}`", name),
        );
        Ok(fallback(hint))
    }

    /// Evaluates arguments left to right, coerced to the declared types.
    /// Missing arguments are zero-filled and extra ones dropped, with a
    /// warning either way.
    async fn eval_arguments(
        &self,
        name: &str,
        params: &[LslType],
        args: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(params.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self
                .eval_with_hint(arg, context.clone(), params.get(i).copied())
                .await?;
            if let Some(ty) = params.get(i) {
                if !implicitly_converts(value.type_of(), *ty) {
                    context.warn(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "argument {} of `{}` expects {}, got {}",
                            i + 1,
                            name,
                            ty,
                            value.type_of()
                        ),
                    );
                }
                values.push(value.coerce(*ty));
            }
        }
        if args.len() != params.len() {
            context.warn(
                DiagnosticKind::ArityMismatch,
                format!(
                    "`{}` takes {} argument(s), {} given",
                    name,
                    params.len(),
                    args.len()
                ),
            );
            values.extend(params[values.len()..].iter().map(|ty| Value::default_of(*ty)));
        }
        Ok(values)
    }

    async fn call_user_function(
        &self,
        name: &str,
        function: &FunctionDef,
        args: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let params: Vec<LslType> = function.params.iter().map(|p| p.ty).collect();
        let values = self.eval_arguments(name, &params, args, context.clone()).await?;

        let limit = context.max_call_depth();
        if context.depth() >= limit {
            return Err(EvalError::CallDepthExceeded(limit));
        }
        let mut frame = Frame::new(name, function.return_type);
        for (param, value) in function.params.iter().zip(values) {
            frame.set(&param.name, param.ty, value);
        }
        let _frame = context.push_frame(frame);
        trace!(function = name, depth = context.depth(), "call");

        let result = StatementEvaluator::default()
            .eval_body(&function.body, context.clone())
            .await?;
        let returned = match result {
            StatementResult::Control(ControlFlow::Return(value)) => value,
            StatementResult::Control(ControlFlow::StateChange(state)) => {
                context.request_state(state);
                None
            }
            _ => None,
        };
        Ok(match (function.return_type, returned) {
            (Some(ty), Some(value)) => value.coerce(ty),
            (Some(ty), None) => Value::default_of(ty),
            (None, _) => Value::Integer(0),
        })
    }

    async fn call_host_function(
        &self,
        function: &HostFunction,
        args: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let values = self
            .eval_arguments(function.name, function.params, args, context.clone())
            .await?;
        let output = {
            let call = HostCall {
                name: function.name,
                env: context.env(),
                args: &values,
                detected: context.detected(),
            };
            (function.handler)(&call)
        };
        let default = function
            .return_type
            .map(Value::default_of)
            .unwrap_or_default();
        match output {
            Ok(output) => {
                if let Some(duration) = output.sleep {
                    tokio::time::sleep(duration).await;
                }
                Ok(match function.return_type {
                    Some(ty) => output.value.coerce(ty),
                    None => Value::Integer(0),
                })
            }
            Err(e) => {
                let kind = match e {
                    HostError::InvalidArgument { .. } => DiagnosticKind::TypeMismatch,
                    HostError::Failed { .. } => DiagnosticKind::AsyncFailure,
                };
                context.warn(kind, e.to_string());
                Ok(default)
            }
        }
    }
}
