//! OpenSimulator extensions.

use regex::Regex;

use crate::ast::LslType::{self, Integer, Key, List, String as Str};
use crate::eval::constants::EOF;
use crate::eval::value::{is_valid_key, Value};
use crate::output::DiagnosticKind;

use super::{
    HostCall,
    HostEffect::{Pure, SideEffect},
    HostFunction, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    registry.register(HostFunction::new(
        "osGetNotecard",
        &[Str],
        Some(LslType::String),
        SideEffect,
        os_get_notecard,
    ));
    registry.register(HostFunction::new(
        "osGetNotecardLine",
        &[Str, Integer],
        Some(LslType::String),
        SideEffect,
        os_get_notecard_line,
    ));
    registry.register(HostFunction::new(
        "osGetNumberOfNotecardLines",
        &[Str],
        Some(LslType::Integer),
        SideEffect,
        os_get_number_of_notecard_lines,
    ));
    registry.register(HostFunction::new(
        "osKey2Name",
        &[Key],
        Some(LslType::String),
        SideEffect,
        os_key2name,
    ));
    registry.register(HostFunction::new(
        "osIsUUID",
        &[Str],
        Some(LslType::Integer),
        Pure,
        os_is_uuid,
    ));
    registry.register(HostFunction::new(
        "osRegexIsMatch",
        &[Str, Str],
        Some(LslType::Integer),
        Pure,
        os_regex_is_match,
    ));
    registry.register(HostFunction::new(
        "osFormatString",
        &[Str, List],
        Some(LslType::String),
        Pure,
        os_format_string,
    ));
    registry.register(HostFunction::new(
        "osGetSimulatorVersion",
        &[],
        Some(LslType::String),
        Pure,
        os_get_simulator_version,
    ));
}

fn notecard(call: &HostCall) -> Option<Vec<String>> {
    let name = call.string(0);
    let lines = call.env.dataserver.notecard(&name);
    if lines.is_none() {
        call.env.warn(
            DiagnosticKind::AsyncFailure,
            format!("notecard `{}` not found", name),
        );
    }
    lines
}

fn os_get_notecard(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(
        notecard(call).map(|lines| lines.join("\n")).unwrap_or_default(),
    ))
}

fn os_get_notecard_line(call: &HostCall) -> HostResult<HostOutput> {
    let line = notecard(call)
        .and_then(|lines| usize::try_from(call.int(1)).ok().and_then(|i| lines.get(i).cloned()))
        .unwrap_or_else(|| EOF.to_string());
    Ok(HostOutput::value(line))
}

fn os_get_number_of_notecard_lines(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(
        notecard(call).map_or(0, |lines| lines.len() as i32),
    ))
}

fn os_key2name(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.key_name(&call.string(0))))
}

fn os_is_uuid(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(is_valid_key(call.string(0).trim())))
}

fn os_regex_is_match(call: &HostCall) -> HostResult<HostOutput> {
    let pattern = call.string(1);
    let regex = Regex::new(&pattern).map_err(|e| call.invalid(e.to_string()))?;
    Ok(HostOutput::value(regex.is_match(&call.string(0))))
}

/// Replaces `{0}`, `{1}`, ... with list elements.
pub fn format_string(format: &str, args: &[Value]) -> String {
    let mut out = format.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i), &arg.to_string());
    }
    out
}

fn os_format_string(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(format_string(&call.string(0), &call.list(1))))
}

fn os_get_simulator_version(_call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(format!(
        "{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::super::testing::call;
    use super::*;
    use crate::config::EngineConfig;
    use crate::host::HostEnv;
    use crate::output::MemorySink;

    fn env_with_notecard() -> HostEnv {
        let mut notecards = HashMap::new();
        notecards.insert(
            "settings".to_string(),
            vec!["color=red".to_string(), "size=2".to_string()],
        );
        let config = EngineConfig {
            notecards,
            ..Default::default()
        };
        HostEnv::new(config, Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_notecard_reads() {
        let env = env_with_notecard();
        let all = call(&env, "osGetNotecard", vec![Value::from("settings")]).value;
        assert_eq!(all, Value::from("color=red\nsize=2"));
        let line = call(
            &env,
            "osGetNotecardLine",
            vec![Value::from("settings"), Value::Integer(1)],
        );
        assert_eq!(line.value, Value::from("size=2"));
        let past = call(
            &env,
            "osGetNotecardLine",
            vec![Value::from("settings"), Value::Integer(5)],
        );
        assert_eq!(past.value, Value::from(EOF));
        let count = call(&env, "osGetNumberOfNotecardLines", vec![Value::from("missing")]);
        assert_eq!(count.value, Value::Integer(0));
        assert_eq!(env.diagnostics().len(), 1);
    }

    #[test]
    fn test_format_and_regex() {
        assert_eq!(
            format_string("{0} has {1} items", &[Value::from("box"), Value::Integer(3)]),
            "box has 3 items"
        );
        let env = env_with_notecard();
        let matched = call(
            &env,
            "osRegexIsMatch",
            vec![Value::from("abc123"), Value::from(r"\d+")],
        );
        assert_eq!(matched.value, Value::Integer(1));
    }
}
