use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::ast::{EventHandlerDef, GlobalVar};
use crate::event::Event;

use super::{
    context::{ExecutionContext, Frame},
    statement::{ControlFlow, StatementEvaluator, StatementResult},
    value::Value,
};

/// Fatal script errors. Everything recoverable is reported as a warning
/// diagnostic and evaluation continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("Stack-heap collision: call depth exceeded {0}")]
    CallDepthExceeded(usize),
    #[error("Unknown state `{0}`")]
    UnknownState(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// What the scheduler has to do after a handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Completed,
    StateChange(String),
}

#[derive(Default)]
pub struct Evaluator {
    statement_evaluator: StatementEvaluator,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates global initializers in declaration order; later globals may
    /// read earlier ones.
    pub async fn initialize_globals(
        &self,
        globals: &[GlobalVar],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<()> {
        for global in globals {
            let value = match &global.init {
                Some(init) => self
                    .statement_evaluator
                    .expression_evaluator
                    .eval_with_hint(init, context.clone(), Some(global.ty))
                    .await?
                    .coerce(global.ty),
                None => Value::default_of(global.ty),
            };
            context.declare(&global.name, global.ty, value);
        }
        Ok(())
    }

    /// Top level entry point: runs one handler body in a fresh frame with the
    /// event arguments bound to the handler parameters.
    #[instrument(level = "debug", skip_all, fields(event = %event.name()))]
    pub async fn eval_event_handler(
        &self,
        handler: &EventHandlerDef,
        event: &Event,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<HandlerOutcome> {
        let mut frame = Frame::new(event.name(), None);
        for (i, param) in handler.params.iter().enumerate() {
            let value = event
                .args
                .get(i)
                .cloned()
                .unwrap_or_else(|| Value::default_of(param.ty));
            frame.set(&param.name, param.ty, value);
        }
        let _frame = context.push_frame(frame);

        let result = self
            .statement_evaluator
            .eval_body(&handler.body, context.clone())
            .await?;
        let outcome = match result {
            StatementResult::Control(ControlFlow::StateChange(state)) => {
                HandlerOutcome::StateChange(state)
            }
            _ => match context.take_deferred_state() {
                Some(state) => HandlerOutcome::StateChange(state),
                None => HandlerOutcome::Completed,
            },
        };
        Ok(outcome)
    }
}
