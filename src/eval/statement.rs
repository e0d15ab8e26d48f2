use std::sync::Arc;

use async_recursion::async_recursion;

use super::{
    context::ExecutionContext,
    evaluator::{EvalError, EvalResult},
    expression::ExpressionEvaluator,
    value::Value,
};
use crate::ast::{Expression, Statement};
use crate::output::DiagnosticKind;
use tracing::trace;

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Normal,

    /// Signal bubbling up to the construct that consumes it.
    Control(ControlFlow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Option<Value>),
    StateChange(String),
    Jump(String),
}

pub struct StatementEvaluator {
    pub expression_evaluator: Arc<ExpressionEvaluator>,
}

impl Default for StatementEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(ExpressionEvaluator::new()))
    }
}

/// Position of `@label;` among the direct children of a block.
fn find_label(statements: &[Statement], label: &str) -> Option<usize> {
    statements
        .iter()
        .position(|s| matches!(s, Statement::Label { name } if name == label))
}

/// Path to `@label;` anywhere below `statements`. Each step indexes a block
/// statement, then `0`/`1` for an `if` branch or `0` for a loop body.
fn label_path(statements: &[Statement], label: &str) -> Option<Vec<usize>> {
    statements.iter().enumerate().find_map(|(i, statement)| {
        let mut path = statement_label_path(statement, label)?;
        path.insert(0, i);
        Some(path)
    })
}

fn statement_label_path(statement: &Statement, label: &str) -> Option<Vec<usize>> {
    let child = |step: usize, path: Option<Vec<usize>>| {
        path.map(|mut path| {
            path.insert(0, step);
            path
        })
    };
    match statement {
        Statement::Label { name } if name == label => Some(Vec::new()),
        Statement::Compound { body } => label_path(body, label),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => child(0, statement_label_path(then_branch, label)).or_else(|| {
            let else_branch = else_branch.as_deref()?;
            child(1, statement_label_path(else_branch, label))
        }),
        Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. } => child(0, statement_label_path(body, label)),
        _ => None,
    }
}

impl StatementEvaluator {
    pub fn new(expression_evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self {
            expression_evaluator,
        }
    }

    /// Runs a handler or function body. A jump no enclosing block resolves
    /// continues at its label wherever it sits in the body; a label the body
    /// does not contain is fatal.
    pub async fn eval_body(
        &self,
        statements: &[Statement],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let cap = context.loop_iteration_cap();
        let mut jumps: u64 = 0;
        let mut result = self.eval_block(statements, context.clone()).await?;
        while let StatementResult::Control(ControlFlow::Jump(label)) = result {
            let Some(path) = label_path(statements, &label) else {
                return Err(EvalError::UndefinedLabel(label));
            };
            jumps += 1;
            if jumps > cap {
                context.warn(
                    DiagnosticKind::LoopCapExceeded,
                    format!("jump to `{}` aborted after {} iterations", label, cap),
                );
                return Ok(StatementResult::Normal);
            }
            trace!(label = %label, ?path, "jump into nested block");
            result = self.resume_block(statements, &path, context.clone()).await?;
        }
        Ok(result)
    }

    #[async_recursion]
    pub async fn eval_statement(
        &self,
        statement: &Statement,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        match statement {
            Statement::Declaration { name, ty, init } => {
                let value = match init {
                    Some(init) => self
                        .expression_evaluator
                        .eval_with_hint(init, context.clone(), Some(*ty))
                        .await?
                        .coerce(*ty),
                    None => Value::default_of(*ty),
                };
                context.declare(name, *ty, value);
                Ok(StatementResult::Normal)
            }
            Statement::Assignment { target, op, value } => {
                self.expression_evaluator
                    .eval_assign(target, *op, value, context)
                    .await?;
                Ok(StatementResult::Normal)
            }
            Statement::Expression { expr } => {
                self.eval_expression(expr, context).await?;
                Ok(StatementResult::Normal)
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, context.clone()).await? {
                    self.eval_statement(then_branch, context).await
                } else if let Some(else_branch) = else_branch {
                    self.eval_statement(else_branch, context).await
                } else {
                    Ok(StatementResult::Normal)
                }
            }
            Statement::While { condition, body } => {
                self.eval_loop(None, Some(condition), &[], body, false, context)
                    .await
            }
            Statement::DoWhile { body, condition } => {
                self.eval_loop(None, Some(condition), &[], body, true, context)
                    .await
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                let init = Some(init.as_slice());
                self.eval_loop(init, condition.as_ref(), step, body, false, context)
                    .await
            }
            Statement::Return { value } => self.eval_return(value.as_ref(), context).await,
            Statement::StateChange { state } => Ok(StatementResult::Control(
                ControlFlow::StateChange(state.clone()),
            )),
            Statement::Jump { label } => {
                Ok(StatementResult::Control(ControlFlow::Jump(label.clone())))
            }
            Statement::Label { .. } | Statement::Empty => Ok(StatementResult::Normal),
            Statement::Compound { body } => self.eval_block(body, context).await,
            Statement::Break => Ok(StatementResult::Control(ControlFlow::Break)),
            Statement::Continue => Ok(StatementResult::Control(ControlFlow::Continue)),
        }
    }

    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        self.expression_evaluator.eval_expression(expr, context).await
    }

    async fn eval_condition(
        &self,
        condition: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<bool> {
        Ok(self.eval_expression(condition, context).await?.is_truthy())
    }

    async fn eval_return(
        &self,
        value: Option<&Expression>,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let value = match value {
            Some(expr) => {
                let return_type = context.return_type();
                let value = self
                    .expression_evaluator
                    .eval_with_hint(expr, context, return_type)
                    .await?;
                Some(match return_type {
                    Some(ty) => value.coerce(ty),
                    None => value,
                })
            }
            None => None,
        };
        Ok(StatementResult::Control(ControlFlow::Return(value)))
    }

    /// A `state` requested by a user function, surfaced once control is back
    /// in the handler.
    fn deferred_state(&self, context: &ExecutionContext) -> Option<StatementResult> {
        context
            .take_deferred_state()
            .map(|state| StatementResult::Control(ControlFlow::StateChange(state)))
    }

    /// Shared driver for `while`, `do ... while` and `for`. `init` and `step`
    /// are evaluated for their side effects only.
    async fn eval_loop(
        &self,
        init: Option<&[Expression]>,
        condition: Option<&Expression>,
        step: &[Expression],
        body: &Statement,
        test_after: bool,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        for expr in init.unwrap_or_default() {
            self.eval_expression(expr, context.clone()).await?;
        }
        let cap = context.loop_iteration_cap();
        let mut iterations: u64 = 0;
        let mut first = true;
        loop {
            let skip_test = test_after && first;
            first = false;
            if !skip_test {
                if let Some(condition) = condition {
                    if !self.eval_condition(condition, context.clone()).await? {
                        break;
                    }
                }
            }
            iterations += 1;
            if iterations > cap {
                context.warn(
                    DiagnosticKind::LoopCapExceeded,
                    format!("loop aborted after {} iterations", cap),
                );
                break;
            }

            match self.eval_statement(body, context.clone()).await? {
                StatementResult::Normal | StatementResult::Control(ControlFlow::Continue) => {}
                StatementResult::Control(ControlFlow::Break) => break,
                other => return Ok(other),
            }
            if let Some(state) = self.deferred_state(&context) {
                return Ok(state);
            }
            for expr in step {
                self.eval_expression(expr, context.clone()).await?;
            }
        }
        Ok(StatementResult::Normal)
    }

    /// Executes statements in order. Jumps to a label among this block's
    /// children are taken here; anything else bubbles to the enclosing block.
    pub async fn eval_block(
        &self,
        statements: &[Statement],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        self.run_block(statements, 0, None, context).await
    }

    /// Block driver starting at `pc`. `resumed` is the result of the
    /// statement at `pc` when execution re-entered it through a jump.
    #[async_recursion]
    async fn run_block(
        &self,
        statements: &[Statement],
        mut pc: usize,
        mut resumed: Option<StatementResult>,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let cap = context.loop_iteration_cap();
        let mut backward_jumps: u64 = 0;
        while pc < statements.len() {
            let result = match resumed.take() {
                Some(result) => result,
                None => self.eval_statement(&statements[pc], context.clone()).await?,
            };
            if let Some(state) = self.deferred_state(&context) {
                return Ok(state);
            }
            match result {
                StatementResult::Normal => pc += 1,
                StatementResult::Control(ControlFlow::Jump(label)) => {
                    let Some(target) = find_label(statements, &label) else {
                        return Ok(StatementResult::Control(ControlFlow::Jump(label)));
                    };
                    if target <= pc {
                        backward_jumps += 1;
                        if backward_jumps > cap {
                            context.warn(
                                DiagnosticKind::LoopCapExceeded,
                                format!("jump to `{}` aborted after {} iterations", label, cap),
                            );
                            return Ok(StatementResult::Normal);
                        }
                    }
                    pc = target + 1;
                }
                other => return Ok(other),
            }
        }
        Ok(StatementResult::Normal)
    }

    /// Continues execution at the label `path` leads to, then finishes every
    /// enclosing construct as if control had reached the label normally.
    #[async_recursion]
    async fn resume_block(
        &self,
        statements: &[Statement],
        path: &[usize],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let Some((&index, rest)) = path.split_first() else {
            return Ok(StatementResult::Normal);
        };
        let statement = statements
            .get(index)
            .ok_or_else(|| EvalError::Internal(format!("jump path index {} out of range", index)))?;
        let result = self.resume_statement(statement, rest, context.clone()).await?;
        self.run_block(statements, index, Some(result), context).await
    }

    #[async_recursion]
    async fn resume_statement(
        &self,
        statement: &Statement,
        path: &[usize],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let rest = path.get(1..).unwrap_or_default();
        match statement {
            Statement::Compound { body } => self.resume_block(body, path, context).await,
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                let branch = match path.first() {
                    Some(0) => Some(then_branch.as_ref()),
                    Some(1) => else_branch.as_deref(),
                    _ => None,
                };
                match branch {
                    Some(branch) => self.resume_statement(branch, rest, context).await,
                    None => Err(EvalError::Internal("jump path names no if branch".into())),
                }
            }
            Statement::While { condition, body } | Statement::DoWhile { body, condition } => {
                let result = self.resume_statement(body, rest, context.clone()).await?;
                self.resume_loop(result, Some(condition), &[], body, context)
                    .await
            }
            Statement::For {
                condition,
                step,
                body,
                ..
            } => {
                let result = self.resume_statement(body, rest, context.clone()).await?;
                self.resume_loop(result, condition.as_ref(), step, body, context)
                    .await
            }
            // The label itself.
            _ => Ok(StatementResult::Normal),
        }
    }

    /// Finishes a loop whose body was entered through a jump: step, then the
    /// usual test-first iteration.
    async fn resume_loop(
        &self,
        body_result: StatementResult,
        condition: Option<&Expression>,
        step: &[Expression],
        body: &Statement,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        match body_result {
            StatementResult::Normal | StatementResult::Control(ControlFlow::Continue) => {}
            StatementResult::Control(ControlFlow::Break) => return Ok(StatementResult::Normal),
            other => return Ok(other),
        }
        if let Some(state) = self.deferred_state(&context) {
            return Ok(state);
        }
        for expr in step {
            self.eval_expression(expr, context.clone()).await?;
        }
        self.eval_loop(None, condition, step, body, false, context)
            .await
    }
}
