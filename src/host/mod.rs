//! # Host Library
//!
//! The `ll*` / `os*` functions a script can call. Each function is a plain
//! [`HostHandler`] registered in a [`HostRegistry`] with its signature and an
//! effect class:
//!
//! | Effect | Meaning |
//! |---|---|
//! | [`HostEffect::Pure`] | result depends only on arguments |
//! | [`HostEffect::SideEffect`] | touches object state, chat, listeners, timers |
//! | [`HostEffect::AsyncCompletion`] | returns a key now; an event arrives later |
//! | [`HostEffect::Sleeping`] | suspends the calling handler |
//!
//! Handlers are synchronous. Anything slow is handed to a background service
//! which reports back through the event queue; a handler asks the evaluator
//! to sleep through [`HostOutput::sleep`].

pub mod env;

mod async_ops;
mod chat;
pub mod lists;
mod math;
mod object;
mod ossl;
mod sensor;
mod strings;
mod time;

pub use env::{HostEnv, ObjectState, Permissions};

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::ast::LslType;
use crate::event::{DetectedObject, LslEvent};
use crate::eval::value::{Rotation, Value, Vector};

pub type HostResult<T> = Result<T, HostError>;

pub type HostHandler = fn(&HostCall) -> HostResult<HostOutput>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("Invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },
    #[error("{function} failed: {message}")]
    Failed { function: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HostEffect {
    Pure,
    SideEffect,
    AsyncCompletion { event: LslEvent },
    Sleeping,
}

#[derive(Clone)]
pub struct HostFunction {
    pub name: &'static str,
    pub params: &'static [LslType],
    pub return_type: Option<LslType>,
    pub effect: HostEffect,
    pub handler: HostHandler,
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("effect", &self.effect)
            .finish()
    }
}

impl HostFunction {
    pub fn new(
        name: &'static str,
        params: &'static [LslType],
        return_type: Option<LslType>,
        effect: HostEffect,
        handler: HostHandler,
    ) -> Self {
        Self {
            name,
            params,
            return_type,
            effect,
            handler,
        }
    }
}

/// What a handler hands back to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct HostOutput {
    pub value: Value,
    pub sleep: Option<Duration>,
}

impl HostOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            sleep: None,
        }
    }

    /// Void functions evaluate to integer 0 when their value is used.
    pub fn void() -> Self {
        Self::value(0)
    }

    pub fn sleep(duration: Duration) -> Self {
        Self {
            value: Value::Integer(0),
            sleep: Some(duration),
        }
    }
}

/// Arguments and environment for one host call. Arguments are already
/// coerced to the declared parameter types.
pub struct HostCall<'a> {
    pub name: &'a str,
    pub env: &'a HostEnv,
    pub args: &'a [Value],
    pub detected: &'a [DetectedObject],
}

impl<'a> HostCall<'a> {
    fn arg(&self, index: usize) -> &Value {
        static MISSING: Value = Value::Integer(0);
        self.args.get(index).unwrap_or(&MISSING)
    }

    pub fn int(&self, index: usize) -> i32 {
        self.arg(index).as_integer()
    }

    pub fn float(&self, index: usize) -> f64 {
        self.arg(index).as_float()
    }

    pub fn string(&self, index: usize) -> String {
        match self.arg(index) {
            Value::String(s) | Value::Key(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn vector(&self, index: usize) -> Vector {
        self.arg(index).as_vector()
    }

    pub fn rotation(&self, index: usize) -> Rotation {
        self.arg(index).as_rotation()
    }

    pub fn list(&self, index: usize) -> Vec<Value> {
        self.arg(index).as_list()
    }

    /// Row `index` of the detected table for the running event.
    pub fn detected(&self, index: usize) -> Option<&DetectedObject> {
        usize::try_from(self.int(index))
            .ok()
            .and_then(|i| self.detected.get(i))
    }

    pub fn invalid(&self, message: impl Into<String>) -> HostError {
        HostError::InvalidArgument {
            function: self.name.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HostRegistry {
    functions: HashMap<&'static str, HostFunction>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        chat::register(&mut registry);
        time::register(&mut registry);
        sensor::register(&mut registry);
        object::register(&mut registry);
        math::register(&mut registry);
        strings::register(&mut registry);
        lists::register(&mut registry);
        async_ops::register(&mut registry);
        ossl::register(&mut registry);
        registry
    }

    pub fn register(&mut self, function: HostFunction) {
        self.functions.insert(function.name, function);
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::output::MemorySink;

    pub fn env() -> (HostEnv, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (HostEnv::new(EngineConfig::default(), sink.clone()), sink)
    }

    /// Calls a registered builtin with already-typed arguments.
    pub fn call(env: &HostEnv, name: &str, args: Vec<Value>) -> HostOutput {
        call_detected(env, name, args, &[])
    }

    pub fn call_detected(
        env: &HostEnv,
        name: &str,
        args: Vec<Value>,
        detected: &[DetectedObject],
    ) -> HostOutput {
        let registry = HostRegistry::with_builtins();
        let function = registry.get(name).unwrap();
        let args: Vec<Value> = args
            .iter()
            .zip(function.params)
            .map(|(v, ty)| v.coerce(*ty))
            .collect();
        let call = HostCall {
            name,
            env,
            args: &args,
            detected,
        };
        (function.handler)(&call).unwrap()
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = HostRegistry::with_builtins();
        for name in [
            "llSay",
            "llListen",
            "llSetTimerEvent",
            "llSensor",
            "llGetPos",
            "llVecMag",
            "llGetSubString",
            "llList2String",
            "llHTTPRequest",
            "osGetNotecard",
        ] {
            assert!(registry.get(name).is_some(), "{} missing", name);
        }
        assert!(registry.get("llNotAThing").is_none());
    }

    #[test]
    fn test_async_functions_return_keys() {
        let registry = HostRegistry::with_builtins();
        for f in registry.names() {
            let f = registry.get(f).unwrap();
            if let HostEffect::AsyncCompletion { .. } = f.effect {
                assert!(
                    matches!(f.return_type, Some(LslType::Key) | None),
                    "{} should return a key",
                    f.name
                );
            }
        }
    }
}
