use linden::{EngineStatus, Value};
use pretty_assertions::assert_eq;

use crate::{run_for, settle, start};

#[tokio::test]
async fn test_hello_world() {
    let (engine, sink) = start(r#"default { state_entry() { llSay(0, "hi"); } }"#).await;
    settle(&engine).await;

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, 0);
    assert_eq!(messages[0].text, "hi");
    assert!(engine.env().queue.is_empty());
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_counter_to_three() {
    let (engine, sink) = start(
        r#"integer n;
           default {
               state_entry() { llSetTimerEvent(0.01); }
               timer() {
                   n = n + 1;
                   llSay(0, (string)n);
                   if (n >= 3) llSetTimerEvent(0.0);
               }
           }"#,
    )
    .await;
    run_for(&engine, 300).await;

    assert_eq!(sink.texts(), vec!["1", "2", "3"]);
    assert_eq!(engine.env().timer.period(), None);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_state_transition_clears_queue() {
    let (engine, sink) = start(
        r#"default {
               state_entry() { llSetTimerEvent(0.01); }
               timer() { state other; }
           }
           state other {
               state_entry() { llSay(0, "arrived"); }
               timer() { llSay(0, "should-not-fire"); }
           }"#,
    )
    .await;
    run_for(&engine, 200).await;

    assert_eq!(sink.texts(), vec!["arrived"]);
    assert_eq!(engine.current_state(), "other");
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_list_append_by_value() {
    let (engine, sink) = start(
        r#"list a = [1,2];
           default { state_entry() {
               list b = a + [3];
               llSay(0, (string)llGetListLength(a) + "," + (string)llGetListLength(b));
           } }"#,
    )
    .await;
    settle(&engine).await;
    assert_eq!(sink.texts(), vec!["2,3"]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_vector_math() {
    let (engine, sink) = start(
        r#"default { state_entry() { vector v = <3.0, 4.0, 0.0>; llSay(0, (string)llVecMag(v)); } }"#,
    )
    .await;
    settle(&engine).await;
    let texts = sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with('5'), "got {}", texts[0]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_unhandled_event_ignored() {
    let (engine, sink) = start(r#"default { state_entry() { llSay(0, "up"); } }"#).await;
    settle(&engine).await;
    engine
        .inject_event("touch_start", vec![Value::Integer(1)])
        .unwrap();
    settle(&engine).await;

    assert_eq!(sink.texts(), vec!["up"]);
    assert!(engine.diagnostics().is_empty());
    assert_eq!(engine.status(), EngineStatus::Running);
    engine.stop().await.unwrap();
}
