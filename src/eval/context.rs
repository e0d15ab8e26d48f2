use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::ast::{LslType, Script};
use crate::event::DetectedObject;
use crate::host::{HostEnv, HostRegistry};
use crate::output::DiagnosticKind;

use super::constants;
use super::value::Value;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
    #[error("Cannot assign to constant `{0}`")]
    Constant(String),
}

/// A typed variable binding. Stores always coerce to `ty`.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub ty: LslType,
    pub value: Value,
}

/// One call-stack entry: an event handler or user-function activation.
/// Blocks do not get their own frame; a local declared anywhere in the body
/// lives until the handler or function returns.
#[derive(Debug, Clone)]
pub struct Frame {
    pub owner: String,
    pub return_type: Option<LslType>,
    variables: HashMap<String, Slot>,
}

impl Frame {
    pub fn new(owner: &str, return_type: Option<LslType>) -> Self {
        Self {
            owner: owner.to_string(),
            return_type,
            variables: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.variables.get(name)
    }

    /// Creates or replaces `name`.
    pub fn set(&mut self, name: &str, ty: LslType, value: Value) {
        let value = value.coerce(ty);
        self.variables.insert(name.to_string(), Slot { ty, value });
    }

    /// Stores into an existing binding, returning the coerced value.
    pub fn update(&mut self, name: &str, value: Value) -> Option<Value> {
        let slot = self.variables.get_mut(name)?;
        slot.value = value.coerce(slot.ty);
        Some(slot.value.clone())
    }

    pub fn variables(&self) -> BTreeMap<String, Value> {
        self.variables
            .iter()
            .map(|(name, slot)| (name.clone(), slot.value.clone()))
            .collect()
    }
}

/// Globals plus the chain of active frames. Every frame's parent is the
/// global frame: LSL functions see globals and their own locals only.
#[derive(Debug, Clone)]
pub struct CallStack {
    globals: Frame,
    frames: Vec<Frame>,
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStack {
    pub fn new() -> Self {
        Self {
            globals: Frame::new("<globals>", None),
            frames: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Slot> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Top frame, then globals, then built-in constants.
    pub fn resolve(&self, name: &str) -> Result<Value, ScopeError> {
        if let Some(slot) = self.lookup(name) {
            return Ok(slot.value.clone());
        }
        constants::lookup(name)
            .cloned()
            .ok_or_else(|| ScopeError::VariableNotFound(name.to_string()))
    }

    pub fn slot_type(&self, name: &str) -> Option<LslType> {
        self.lookup(name).map(|slot| slot.ty)
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Result<Value, ScopeError> {
        if let Some(stored) = self.frames.last_mut().and_then(|f| f.update(name, value.clone())) {
            return Ok(stored);
        }
        if let Some(stored) = self.globals.update(name, value) {
            return Ok(stored);
        }
        if constants::lookup(name).is_some() {
            return Err(ScopeError::Constant(name.to_string()));
        }
        Err(ScopeError::VariableNotFound(name.to_string()))
    }

    /// Binds in the top frame, or in globals while no frame is active.
    pub fn declare(&mut self, name: &str, ty: LslType, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.set(name, ty, value),
            None => self.globals.set(name, ty, value),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn globals(&self) -> BTreeMap<String, Value> {
        self.globals.variables()
    }
}

/// Pops the frame it was created for when dropped, including on early
/// return through `?`.
pub struct FrameGuard {
    stack: Arc<Mutex<CallStack>>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.stack.lock().pop();
    }
}

/// Everything one event dispatch needs. The call stack is shared with the
/// engine so globals persist between events; the detected table lives only
/// as long as the dispatch.
pub struct ExecutionContext {
    script: Arc<Script>,
    host: Arc<HostRegistry>,
    env: Arc<HostEnv>,
    stack: Arc<Mutex<CallStack>>,
    detected: Vec<DetectedObject>,
    pending_state: Mutex<Option<String>>,
}

impl ExecutionContext {
    pub fn new(
        script: Arc<Script>,
        host: Arc<HostRegistry>,
        env: Arc<HostEnv>,
        stack: Arc<Mutex<CallStack>>,
        detected: Vec<DetectedObject>,
    ) -> Self {
        Self {
            script,
            host,
            env,
            stack,
            detected,
            pending_state: Mutex::new(None),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn host(&self) -> &HostRegistry {
        &self.host
    }

    pub fn env(&self) -> &HostEnv {
        &self.env
    }

    pub fn detected(&self) -> &[DetectedObject] {
        &self.detected
    }

    pub fn loop_iteration_cap(&self) -> u64 {
        self.env.config.loop_iteration_cap
    }

    pub fn max_call_depth(&self) -> usize {
        self.env.config.max_call_depth
    }

    pub fn warn(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.env.warn(kind, message);
    }

    pub fn resolve(&self, name: &str) -> Result<Value, ScopeError> {
        self.stack.lock().resolve(name)
    }

    pub fn variable_type(&self, name: &str) -> Option<LslType> {
        self.stack.lock().slot_type(name)
    }

    /// Stores `value`. An unknown name is bound in the current frame with the
    /// value's own type; a constant is left untouched. Both warn.
    pub fn assign(&self, name: &str, value: Value) -> Value {
        let result = self.stack.lock().assign(name, value.clone());
        match result {
            Ok(stored) => stored,
            Err(e @ ScopeError::VariableNotFound(_)) => {
                self.warn(DiagnosticKind::UnknownIdentifier, e.to_string());
                self.stack.lock().declare(name, value.type_of(), value.clone());
                value
            }
            Err(e @ ScopeError::Constant(_)) => {
                self.warn(DiagnosticKind::TypeMismatch, e.to_string());
                value
            }
        }
    }

    pub fn declare(&self, name: &str, ty: LslType, value: Value) {
        self.stack.lock().declare(name, ty, value);
    }

    pub fn push_frame(&self, frame: Frame) -> FrameGuard {
        self.stack.lock().push(frame);
        FrameGuard {
            stack: self.stack.clone(),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().depth()
    }

    pub fn return_type(&self) -> Option<LslType> {
        self.stack.lock().top().and_then(|frame| frame.return_type)
    }

    /// Records a `state` request made inside a user function.
    pub fn request_state(&self, state: String) {
        *self.pending_state.lock() = Some(state);
    }

    /// Takes the deferred state request once control is back in the handler
    /// frame itself.
    pub fn take_deferred_state(&self) -> Option<String> {
        if self.depth() > 1 {
            return None;
        }
        self.pending_state.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_redeclaration_replaces_binding() {
        let mut frame = Frame::new("state_entry", None);
        frame.set("x", LslType::Integer, Value::Integer(1));
        frame.set("x", LslType::String, Value::from("again"));
        assert_eq!(frame.get("x").unwrap().ty, LslType::String);
        assert_eq!(frame.variables().len(), 1);
    }

    #[test]
    fn test_update_coerces_to_slot_type() {
        let mut frame = Frame::new("f", None);
        frame.set("f", LslType::Float, Value::Integer(2));
        assert_eq!(frame.get("f").unwrap().value, Value::Float(2.0));
        assert_eq!(frame.update("f", Value::Integer(3)), Some(Value::Float(3.0)));
        assert_eq!(frame.update("missing", Value::Integer(3)), None);
    }

    #[test]
    fn test_resolution_order() {
        let mut stack = CallStack::new();
        stack.declare("g", LslType::Integer, Value::Integer(1));
        stack.push(Frame::new("handler", None));
        assert_eq!(stack.resolve("g"), Ok(Value::Integer(1)));

        stack.declare("g", LslType::Integer, Value::Integer(2));
        assert_eq!(stack.resolve("g"), Ok(Value::Integer(2)));
        assert_eq!(stack.resolve("TRUE"), Ok(Value::Integer(1)));
        assert_eq!(
            stack.resolve("nope"),
            Err(ScopeError::VariableNotFound("nope".into()))
        );

        stack.pop();
        assert_eq!(stack.resolve("g"), Ok(Value::Integer(1)));
    }

    #[test]
    fn test_functions_do_not_see_caller_locals() {
        let mut stack = CallStack::new();
        let mut handler = Frame::new("handler", None);
        handler.set("local", LslType::Integer, Value::Integer(5));
        stack.push(handler);
        stack.push(Frame::new("helper", Some(LslType::Integer)));
        assert!(stack.resolve("local").is_err());
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_assign_errors() {
        let mut stack = CallStack::new();
        assert_eq!(
            stack.assign("PI", Value::Float(3.0)),
            Err(ScopeError::Constant("PI".into()))
        );
        stack.declare("count", LslType::Integer, Value::Integer(0));
        assert_eq!(stack.assign("count", Value::Float(2.9)), Ok(Value::Integer(2)));
        assert_eq!(stack.globals().get("count"), Some(&Value::Integer(2)));
    }
}
