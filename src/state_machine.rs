//! Which state is current and which handler an event maps to.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::ast::{EventHandlerDef, Script};
use crate::eval::{EvalError, EvalResult};

pub const DEFAULT_STATE: &str = "default";

pub struct StateMachine {
    script: Arc<Script>,
    current: RwLock<String>,
}

impl StateMachine {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            current: RwLock::new(DEFAULT_STATE.to_string()),
        }
    }

    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    /// Handler for `event` in the current state. Events without one are
    /// dropped by the caller; that is not an error in LSL.
    pub fn handler(&self, event: &str) -> Option<&EventHandlerDef> {
        let state = self.current.read();
        self.script.handler(&state, event)
    }

    /// `Ok(false)` when `target` is already current and nothing should happen.
    pub fn check_transition(&self, target: &str) -> EvalResult<bool> {
        if self.script.state(target).is_none() {
            return Err(EvalError::UnknownState(target.to_string()));
        }
        Ok(*self.current.read() != target)
    }

    pub fn enter(&self, target: &str) {
        let mut current = self.current.write();
        debug!(from = %*current, to = target, "state change");
        *current = target.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_script;
    use pretty_assertions::assert_eq;

    fn machine() -> StateMachine {
        let script = parse_script(
            r#"default { touch_start(integer n) { state busy; } }
               state busy { state_entry() { } }"#,
        )
        .unwrap();
        StateMachine::new(Arc::new(script))
    }

    #[test]
    fn test_lookup_follows_current_state() {
        let machine = machine();
        assert_eq!(machine.current(), "default");
        assert!(machine.handler("touch_start").is_some());
        assert!(machine.handler("state_entry").is_none());

        assert_eq!(machine.check_transition("busy"), Ok(true));
        machine.enter("busy");
        assert!(machine.handler("state_entry").is_some());
        assert!(machine.handler("touch_start").is_none());
    }

    #[test]
    fn test_same_state_and_unknown_state() {
        let machine = machine();
        assert_eq!(machine.check_transition("default"), Ok(false));
        assert_eq!(
            machine.check_transition("nowhere"),
            Err(EvalError::UnknownState("nowhere".into()))
        );
    }
}
