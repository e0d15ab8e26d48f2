use linden::analyzer::ParseError;
use linden::ast::{BinaryOperator, Expression, LslType, Statement};
use linden::parse_script;
use pretty_assertions::assert_eq;

#[test]
fn it_parses_a_full_script() {
    let input = r#"
        // Greeter with a second state
        integer count = 0;
        string greeting = "Hello";
        list names;

        string greet(string who) {
            return greeting + ", " + who;
        }

        default {
            state_entry() {
                llListen(0, "", NULL_KEY, "");
                llSetTimerEvent(1.0);
            }

            listen(integer channel, string name, key id, string message) {
                names += [name];
                llSay(0, greet(name));
            }

            timer() {
                if (++count >= 3) state done;
            }
        }

        state done {
            state_entry() { llOwnerSay("heard " + (string)llGetListLength(names)); }
        }
    "#;

    let script = parse_script(input).unwrap();
    assert_eq!(script.globals.len(), 3);
    assert_eq!(script.globals[0].ty, LslType::Integer);
    assert_eq!(script.globals[2].init, None);

    let greet = script.function("greet").unwrap();
    assert_eq!(greet.return_type, Some(LslType::String));
    assert_eq!(greet.params.len(), 1);

    assert_eq!(script.states.len(), 2);
    let listen = script.handler("default", "listen").unwrap();
    assert_eq!(listen.params[3].ty, LslType::String);
    assert!(script.handler("done", "state_entry").is_some());
}

#[test]
fn it_respects_operator_precedence() {
    let script = parse_script(
        r#"default { state_entry() { integer x = 1 + 2 * 3; } }"#,
    )
    .unwrap();
    let body = &script.handler("default", "state_entry").unwrap().body;
    assert_eq!(
        body[0],
        Statement::Declaration {
            name: "x".into(),
            ty: LslType::Integer,
            init: Some(Expression::binary(
                BinaryOperator::Add,
                Expression::integer(1),
                Expression::binary(
                    BinaryOperator::Multiply,
                    Expression::integer(2),
                    Expression::integer(3)
                ),
            )),
        }
    );
}

#[test]
fn it_parses_labels_and_jumps() {
    let script = parse_script(
        r#"default { state_entry() { @top; jump top; } }"#,
    )
    .unwrap();
    let body = &script.handler("default", "state_entry").unwrap().body;
    assert_eq!(body[0], Statement::Label { name: "top".into() });
    assert_eq!(body[1], Statement::Jump { label: "top".into() });
}

#[test]
fn it_rejects_a_script_without_default() {
    assert!(matches!(
        parse_script("state other { state_entry() { } }"),
        Err(ParseError::Validation(_))
    ));
}

#[test]
fn it_rejects_unknown_events_and_states() {
    assert!(matches!(
        parse_script("default { on_tick() { } }"),
        Err(ParseError::Validation(_))
    ));
    assert!(matches!(
        parse_script("default { state_entry() { state nowhere; } }"),
        Err(ParseError::Validation(_))
    ));
}

#[test]
fn it_reports_syntax_errors() {
    let err = parse_script("default { state_entry() { llSay(0, \"x\") } }").unwrap_err();
    assert!(matches!(err, ParseError::ParseError { .. }));
}
