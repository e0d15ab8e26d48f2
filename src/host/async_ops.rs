//! Functions whose result arrives later as an event.

use crate::ast::LslType::{self, Integer, Key, List, String as Str};
use crate::event::{Event, LslEvent};
use crate::eval::constants::{DEBUG_CHANNEL, EOF, LINK_SET, LINK_THIS};
use crate::eval::value::{Value, NULL_KEY};
use crate::output::ChatVolume;
use crate::service::http::HttpRequest;

use super::{
    HostCall,
    HostEffect::{AsyncCompletion, SideEffect},
    HostFunction, HostOutput, HostRegistry, HostResult,
};

const HTTP_METHOD: i32 = 0;
const HTTP_MIMETYPE: i32 = 1;

const DATA_ONLINE: i32 = 1;
const DATA_NAME: i32 = 2;
const DATA_BORN: i32 = 3;
const DATA_RATING: i32 = 4;
const DATA_PAYINFO: i32 = 8;

pub(super) fn register(registry: &mut HostRegistry) {
    let dataserver = AsyncCompletion {
        event: LslEvent::Dataserver,
    };
    registry.register(HostFunction::new(
        "llHTTPRequest",
        &[Str, List, Str],
        Some(LslType::Key),
        AsyncCompletion {
            event: LslEvent::HttpResponse,
        },
        ll_http_request,
    ));
    registry.register(HostFunction::new(
        "llGetNotecardLine",
        &[Str, Integer],
        Some(LslType::Key),
        dataserver,
        ll_get_notecard_line,
    ));
    registry.register(HostFunction::new(
        "llGetNumberOfNotecardLines",
        &[Str],
        Some(LslType::Key),
        dataserver,
        ll_get_number_of_notecard_lines,
    ));
    registry.register(HostFunction::new(
        "llRequestAgentData",
        &[Key, Integer],
        Some(LslType::Key),
        dataserver,
        ll_request_agent_data,
    ));
    registry.register(HostFunction::new(
        "llRequestPermissions",
        &[Key, Integer],
        None,
        AsyncCompletion {
            event: LslEvent::RunTimePermissions,
        },
        ll_request_permissions,
    ));
    registry.register(HostFunction::new(
        "llGetPermissions",
        &[],
        Some(LslType::Integer),
        SideEffect,
        ll_get_permissions,
    ));
    registry.register(HostFunction::new(
        "llGetPermissionsKey",
        &[],
        Some(LslType::Key),
        SideEffect,
        ll_get_permissions_key,
    ));
    registry.register(HostFunction::new(
        "llMessageLinked",
        &[Integer, Integer, Str, Key],
        None,
        AsyncCompletion {
            event: LslEvent::LinkMessage,
        },
        ll_message_linked,
    ));
}

fn new_query_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reads `[HTTP_METHOD, "POST", HTTP_MIMETYPE, "..."]` style options.
fn http_request(url: String, options: &[Value], body: String) -> HttpRequest {
    let mut request = HttpRequest::get(&url);
    request.body = body;
    let mut i = 0;
    while i < options.len() {
        let value = options.get(i + 1).map(Value::to_string);
        match (options[i].as_integer(), value) {
            (HTTP_METHOD, Some(method)) => request.method = method,
            (HTTP_MIMETYPE, Some(mimetype)) => request.mimetype = mimetype,
            _ => {}
        }
        i += 2;
    }
    request
}

fn ll_http_request(call: &HostCall) -> HostResult<HostOutput> {
    let id = new_query_id();
    let request = http_request(call.string(0), &call.list(1), call.string(2));
    call.env.http.request(id.clone(), request);
    Ok(HostOutput::value(Value::Key(id)))
}

/// Missing notecards are reported on the debug channel and answered with EOF.
fn notecard_or_report(call: &HostCall, name: &str) -> Option<Vec<String>> {
    let lines = call.env.dataserver.notecard(name);
    if lines.is_none() {
        call.env.chat(
            DEBUG_CHANNEL,
            &format!("Couldn't find notecard {}", name),
            ChatVolume::Say,
        );
    }
    lines
}

fn ll_get_notecard_line(call: &HostCall) -> HostResult<HostOutput> {
    let id = new_query_id();
    let name = call.string(0);
    let data = notecard_or_report(call, &name)
        .and_then(|lines| {
            usize::try_from(call.int(1))
                .ok()
                .and_then(|i| lines.get(i).cloned())
        })
        .unwrap_or_else(|| EOF.to_string());
    call.env.dataserver.reply(&id, data);
    Ok(HostOutput::value(Value::Key(id)))
}

fn ll_get_number_of_notecard_lines(call: &HostCall) -> HostResult<HostOutput> {
    let id = new_query_id();
    let name = call.string(0);
    let data = match notecard_or_report(call, &name) {
        Some(lines) => lines.len().to_string(),
        None => EOF.to_string(),
    };
    call.env.dataserver.reply(&id, data);
    Ok(HostOutput::value(Value::Key(id)))
}

fn ll_request_agent_data(call: &HostCall) -> HostResult<HostOutput> {
    let id = new_query_id();
    let agent = call.string(0);
    let name = call.env.key_name(&agent);
    let known = !name.is_empty();
    let data = match call.int(1) {
        DATA_ONLINE => (known as i32).to_string(),
        DATA_NAME => name,
        DATA_BORN => "2006-01-01".to_string(),
        DATA_RATING => "0,0,0,0,0,0".to_string(),
        DATA_PAYINFO => "0".to_string(),
        other => {
            return Err(call.invalid(format!("unsupported data request {}", other)));
        }
    };
    call.env.dataserver.reply(&id, data);
    Ok(HostOutput::value(Value::Key(id)))
}

/// Every request is granted at once.
fn ll_request_permissions(call: &HostCall) -> HostResult<HostOutput> {
    let agent = call.string(0);
    let mask = call.int(1);
    call.env.grant_permissions(&agent, mask);
    call.env.enqueue(Event::new(
        LslEvent::RunTimePermissions,
        vec![Value::Integer(mask)],
    ));
    Ok(HostOutput::void())
}

fn ll_get_permissions(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.permissions().mask))
}

fn ll_get_permissions_key(call: &HostCall) -> HostResult<HostOutput> {
    let permissions = call.env.permissions();
    let key = if permissions.mask == 0 {
        NULL_KEY.to_string()
    } else {
        permissions.agent
    };
    Ok(HostOutput::value(Value::Key(key)))
}

/// The object is a single prim (link number 0), so only `LINK_SET`,
/// `LINK_THIS` and 0 reach this script.
fn ll_message_linked(call: &HostCall) -> HostResult<HostOutput> {
    let target = call.int(0);
    if matches!(target, LINK_SET | LINK_THIS | 0) {
        call.env.enqueue(Event::new(
            LslEvent::LinkMessage,
            vec![
                Value::Integer(0),
                Value::Integer(call.int(1)),
                Value::String(call.string(2)),
                Value::key(&call.string(3)),
            ],
        ));
    }
    Ok(HostOutput::void())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, env};
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_options() {
        let request = http_request(
            "http://example.test".into(),
            &[
                Value::Integer(HTTP_METHOD),
                Value::from("POST"),
                Value::Integer(HTTP_MIMETYPE),
                Value::from("application/json"),
            ],
            "{}".into(),
        );
        assert_eq!(request.method, "POST");
        assert_eq!(request.mimetype, "application/json");
        assert_eq!(request.body, "{}");
    }

    #[tokio::test]
    async fn test_missing_notecard_reports_and_eofs() {
        let (env, sink) = env();
        let id = call(
            &env,
            "llGetNotecardLine",
            vec![Value::from("nope"), Value::Integer(0)],
        )
        .value;
        let messages = sink.messages();
        assert_eq!(messages[0].channel, DEBUG_CHANNEL);
        assert_eq!(messages[0].text, "Couldn't find notecard nope");

        env.queue.wait(Duration::from_secs(1)).await;
        let event = env.queue.pop().unwrap();
        assert_eq!(event.kind, LslEvent::Dataserver);
        assert_eq!(event.args, vec![id, Value::from(EOF)]);
    }

    #[test]
    fn test_permissions_granted() {
        let (env, _) = env();
        let owner = env.object().owner_key;
        call(
            &env,
            "llRequestPermissions",
            vec![Value::Key(owner.clone()), Value::Integer(0x10)],
        );
        assert_eq!(call(&env, "llGetPermissions", vec![]).value, Value::Integer(0x10));
        assert_eq!(call(&env, "llGetPermissionsKey", vec![]).value, Value::Key(owner));
        let event = env.queue.pop().unwrap();
        assert_eq!(event.kind, LslEvent::RunTimePermissions);
    }

    #[test]
    fn test_message_linked_targets() {
        let (env, _) = env();
        let send = |link: i32| {
            call(
                &env,
                "llMessageLinked",
                vec![
                    Value::Integer(link),
                    Value::Integer(7),
                    Value::from("hi"),
                    Value::key(NULL_KEY),
                ],
            )
        };
        send(LINK_SET);
        send(2);
        assert_eq!(env.queue.len(), 1);
        let event = env.queue.pop().unwrap();
        assert_eq!(event.args[1], Value::Integer(7));
    }
}
