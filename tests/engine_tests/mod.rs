use std::collections::HashMap;

use linden::config::{HttpStub, HttpMode};
use linden::{DetectedObject, DiagnosticKind, EngineConfig, Value, Vector};
use pretty_assertions::assert_eq;

use crate::{run_for, settle, should_run_live_http_tests, start, start_with};

const AVATAR: &str = "a0000000-0000-0000-0000-000000000001";

#[tokio::test]
async fn test_listen_filters() {
    let (engine, sink) = start(
        r#"default {
               state_entry() { llListen(7, "", NULL_KEY, ""); llListen(8, "Ava", NULL_KEY, "ping"); }
               listen(integer channel, string name, key id, string message) {
                   llSay(0, (string)channel + ":" + name + ":" + message);
               }
           }"#,
    )
    .await;
    settle(&engine).await;

    assert_eq!(engine.inject_channel_message(7, "Bob", AVATAR, "hello").unwrap(), 1);
    assert_eq!(engine.inject_channel_message(8, "Bob", AVATAR, "ping").unwrap(), 0);
    assert_eq!(engine.inject_channel_message(8, "Ava", AVATAR, "pong").unwrap(), 0);
    assert_eq!(engine.inject_channel_message(8, "Ava", AVATAR, "ping").unwrap(), 1);
    assert_eq!(engine.inject_channel_message(9, "Ava", AVATAR, "ping").unwrap(), 0);
    settle(&engine).await;

    assert_eq!(sink.texts(), vec!["7:Bob:hello", "8:Ava:ping"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_listeners_survive_state_change_by_default() {
    let source = r#"default {
               state_entry() { llListen(5, "", NULL_KEY, ""); state other; }
           }
           state other {
               listen(integer channel, string name, key id, string message) { llSay(0, message); }
           }"#;
    let (engine, sink) = start(source).await;
    settle(&engine).await;
    engine.inject_channel_message(5, "Ava", AVATAR, "still here").unwrap();
    settle(&engine).await;
    assert_eq!(sink.texts(), vec!["still here"]);
    engine.stop().await.unwrap();

    let config = EngineConfig {
        clear_listeners_on_state_change: true,
        ..Default::default()
    };
    let (engine, sink) = start_with(source, config).await;
    settle(&engine).await;
    assert_eq!(engine.inject_channel_message(5, "Ava", AVATAR, "gone").unwrap(), 0);
    settle(&engine).await;
    assert!(sink.texts().is_empty());
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_http_stub_response() {
    let mut stubs = HashMap::new();
    stubs.insert(
        "http://example.test/status".to_string(),
        HttpStub {
            status: 200,
            body: "ok".to_string(),
        },
    );
    let mut config = EngineConfig::default();
    config.http.stubs = stubs;

    let (engine, sink) = start_with(
        r#"key req;
           default {
               state_entry() {
                   req = llHTTPRequest("http://example.test/status", [], "");
                   llHTTPRequest("http://example.test/missing", [], "");
               }
               http_response(key id, integer status, list meta, string body) {
                   llSay(0, (string)(id == req) + " " + (string)status + " " + body);
               }
           }"#,
        config,
    )
    .await;
    run_for(&engine, 100).await;

    let mut texts = sink.texts();
    texts.sort();
    assert_eq!(texts, vec!["0 404 Not Found", "1 200 ok"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_http_live_failure_reports_499() {
    if !should_run_live_http_tests() {
        return;
    }
    let mut config = EngineConfig::default();
    config.http.mode = HttpMode::Live;
    let (engine, sink) = start_with(
        r#"default {
               state_entry() { llHTTPRequest("http://127.0.0.1:9/unreachable", [], ""); }
               http_response(key id, integer status, list meta, string body) { llSay(0, (string)status); }
           }"#,
        config,
    )
    .await;
    run_for(&engine, 2000).await;
    assert_eq!(sink.texts(), vec!["499"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_notecard_lines_via_dataserver() {
    let mut config = EngineConfig::default();
    config.notecards.insert(
        "config".to_string(),
        vec!["alpha".to_string(), "beta".to_string()],
    );
    let (engine, sink) = start_with(
        r#"integer line;
           key query;
           default {
               state_entry() { query = llGetNotecardLine("config", line); }
               dataserver(key id, string data) {
                   if (id != query) return;
                   if (data == EOF) { llSay(0, "done"); return; }
                   llSay(0, data);
                   query = llGetNotecardLine("config", ++line);
               }
           }"#,
        config,
    )
    .await;
    run_for(&engine, 200).await;
    assert_eq!(sink.texts(), vec!["alpha", "beta", "done"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_link_message_and_permissions() {
    let (engine, sink) = start(
        r#"default {
               state_entry() {
                   llMessageLinked(LINK_SET, 42, "payload", NULL_KEY);
                   llRequestPermissions(llGetOwner(), 0x4);
               }
               link_message(integer sender, integer num, string str, key id) {
                   llSay(0, (string)num + " " + str);
               }
               run_time_permissions(integer perm) { llSay(0, "perm " + (string)perm); }
           }"#,
    )
    .await;
    settle(&engine).await;
    assert_eq!(sink.texts(), vec!["42 payload", "perm 4"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_sensor_repeat_cancelled_on_state_change() {
    let (engine, sink) = start(
        r#"integer sweeps;
           default {
               state_entry() { llSensorRepeat("", NULL_KEY, AGENT, 20.0, PI, 0.02); }
               sensor(integer n) {
                   sweeps++;
                   llSay(0, llDetectedName(0));
                   if (sweeps == 2) state quiet;
               }
           }
           state quiet {
               sensor(integer n) { llSay(0, "leaked"); }
               no_sensor() { llSay(0, "leaked"); }
           }"#,
    )
    .await;
    engine.place_entity(DetectedObject::avatar(
        "Ava",
        AVATAR,
        Vector::new(130.0, 128.0, 20.0),
    ));
    run_for(&engine, 300).await;

    assert_eq!(sink.texts(), vec!["Ava", "Ava"]);
    assert_eq!(engine.current_state(), "quiet");
    assert!(!engine.env().sensors.is_repeating());
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_no_sensor_when_nothing_in_range() {
    let (engine, sink) = start(
        r#"default {
               state_entry() { llSensor("", NULL_KEY, AGENT, 5.0, PI); }
               sensor(integer n) { llSay(0, "found"); }
               no_sensor() { llSay(0, "nobody"); }
           }"#,
    )
    .await;
    engine.place_entity(DetectedObject::avatar(
        "Far",
        AVATAR,
        Vector::new(200.0, 128.0, 20.0),
    ));
    settle(&engine).await;
    assert_eq!(sink.texts(), vec!["nobody"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_queue_overflow_drops_with_warning() {
    let config = EngineConfig {
        queue_capacity: 2,
        ..Default::default()
    };
    let (engine, sink) = start_with(
        r#"default {
               state_entry() {
                   integer i;
                   for (i = 0; i < 4; i++) llMessageLinked(LINK_THIS, i, "", NULL_KEY);
               }
               link_message(integer sender, integer num, string str, key id) { llSay(0, (string)num); }
           }"#,
        config,
    )
    .await;
    settle(&engine).await;

    assert_eq!(sink.texts(), vec!["0", "1"]);
    let overflows = engine
        .diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::QueueOverflow)
        .count();
    assert_eq!(overflows, 2);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_runs_ast_json() {
    let script = linden::parse_script(
        r#"default { state_entry() { llOwnerSay("from json " + (string)(2 + 3)); } }"#,
    )
    .unwrap();
    let json = serde_json::to_string(&script).unwrap();
    let (engine, sink) = start(&json).await;
    settle(&engine).await;
    assert_eq!(sink.texts(), vec!["from json 5"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_undefined_label_is_fatal() {
    let (engine, sink) = start(
        r#"default { state_entry() { jump nowhere; llSay(0, "never"); } }"#,
    )
    .await;
    settle(&engine).await;
    assert_eq!(engine.status(), linden::EngineStatus::Failed);
    assert!(sink.texts().is_empty());
    assert_eq!(
        engine.diagnostics().last().map(|d| d.kind),
        Some(DiagnosticKind::Fatal)
    );
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_injected_event_arguments_are_coerced() {
    let (engine, sink) = start(
        r#"default { link_message(integer sender, integer num, string str, key id) {
               llSay(0, (string)(num + 1) + " " + str + " " + (string)id);
           } }"#,
    )
    .await;
    settle(&engine).await;
    engine
        .inject_event(
            "link_message",
            vec![Value::Integer(1), Value::from("41"), Value::Integer(7)],
        )
        .unwrap();
    settle(&engine).await;
    assert_eq!(
        sink.texts(),
        vec!["42 7 00000000-0000-0000-0000-000000000000"]
    );
    engine.stop().await.unwrap();
}
