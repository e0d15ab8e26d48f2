//! Semantic checks run on a parsed (or JSON-loaded) script before the engine
//! accepts it.

use tracing::debug;

use crate::ast::{Script, Statement, DEFAULT_STATE};
use crate::event::LslEvent;

use super::core::ParseError;

#[tracing::instrument(level = "debug", skip(script))]
pub fn validate(script: &Script) -> Result<(), ParseError> {
    if !script.states.contains_key(DEFAULT_STATE) {
        return Err(ParseError::validation("script has no `default` state"));
    }

    for (state_name, state) in &script.states {
        for (event_name, handler) in &state.handlers {
            let event = LslEvent::lookup(event_name).ok_or_else(|| {
                ParseError::validation(format!(
                    "state `{}` declares unknown event `{}`",
                    state_name, event_name
                ))
            })?;
            let expected = event.params();
            if handler.params.len() != expected.len() {
                return Err(ParseError::validation(format!(
                    "handler `{}` in state `{}` takes {} parameter(s), expected {}",
                    event_name,
                    state_name,
                    handler.params.len(),
                    expected.len()
                )));
            }
            for (param, ty) in handler.params.iter().zip(expected) {
                if param.ty != *ty {
                    return Err(ParseError::validation(format!(
                        "parameter `{}` of `{}` in state `{}` must be {}, found {}",
                        param.name, event_name, state_name, ty, param.ty
                    )));
                }
            }
            check_state_targets(script, &handler.body)?;
        }
    }

    for function in script.functions.values() {
        check_state_targets(script, &function.body)?;
    }

    debug!(
        "validated script: {} state(s), {} function(s), {} global(s)",
        script.states.len(),
        script.functions.len(),
        script.globals.len()
    );
    Ok(())
}

fn check_state_targets(script: &Script, body: &[Statement]) -> Result<(), ParseError> {
    body.iter().try_for_each(|stmt| check_statement(script, stmt))
}

fn check_statement(script: &Script, stmt: &Statement) -> Result<(), ParseError> {
    match stmt {
        Statement::StateChange { state } if !script.states.contains_key(state) => Err(
            ParseError::validation(format!("`state {};` targets an undefined state", state)),
        ),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            check_statement(script, then_branch)?;
            match else_branch {
                Some(else_branch) => check_statement(script, else_branch),
                None => Ok(()),
            }
        }
        Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. } => check_statement(script, body),
        Statement::Compound { body } => check_state_targets(script, body),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_source;

    fn check(src: &str) -> Result<(), ParseError> {
        validate(&parse_source(src).unwrap())
    }

    #[test]
    fn test_valid_script() {
        assert!(
            check("default { state_entry() {} listen(integer c, string n, key k, string m) {} }")
                .is_ok()
        );
    }

    #[test]
    fn test_missing_default() {
        let err = check("state other { state_entry() {} }").unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_unknown_event() {
        assert!(check("default { on_click() {} }").is_err());
    }

    #[test]
    fn test_wrong_arity_and_type() {
        assert!(check("default { touch_start() {} }").is_err());
        assert!(check("default { touch_start(string s) {} }").is_err());
    }

    #[test]
    fn test_undefined_state_target() {
        assert!(check("default { timer() { if (1) { state nowhere; } } }").is_err());
        let source = "default { timer() { state away; } } state away { state_entry() {} }";
        assert!(check(source).is_ok());
    }
}
