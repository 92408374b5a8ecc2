// Session tests for sprig
//
// A session re-parses everything submitted so far and only runs what is new,
// carrying variable state from one submission to the next.

use pretty_assertions::assert_eq;
use sprig::error::ErrorKind;
use sprig::evaluator::Evaluator;
use sprig::session::Session;
use sprig::value::Value;
use std::io::Cursor;

type TestSession = Session<Vec<u8>, Cursor<Vec<u8>>>;

fn session_with_input(input: &str) -> TestSession {
    Session::with_evaluator(Evaluator::with_io(
        Vec::new(),
        Cursor::new(input.as_bytes().to_vec()),
    ))
}

fn output_of(session: &TestSession) -> String {
    String::from_utf8(session.evaluator().output().clone()).expect("output should be UTF-8")
}

#[test]
fn variables_survive_between_submissions() {
    let mut session = session_with_input("");
    session.submit("x = 1").unwrap();
    session.submit("y = x + 1").unwrap();
    session.submit("puts x, y").unwrap();

    assert_eq!(output_of(&session), "1\n2\n");
    assert_eq!(session.evaluator().variable("y"), Some(&Value::Integer(2)));
}

#[test]
fn only_new_statements_run() {
    let mut session = session_with_input("");
    session.submit("puts \"first\"").unwrap();
    session.submit("puts \"second\"").unwrap();

    assert_eq!(output_of(&session), "first\nsecond\n");
    assert_eq!(session.source(), "puts \"first\"\nputs \"second\"\n");
}

#[test]
fn functions_defined_earlier_can_be_called_later() {
    let mut session = session_with_input("");
    session
        .submit("def $square(n)\n  n * n\nend")
        .unwrap();
    session.submit("puts $square(7)").unwrap();

    assert_eq!(output_of(&session), "49\n");
}

#[test]
fn parse_errors_discard_the_chunk() {
    let mut session = session_with_input("");
    session.submit("x = 10").unwrap();

    let error = session.submit("x = x +").unwrap_err();
    assert_eq!(error.kind, ErrorKind::ParseError);
    assert_eq!(error.line, 2);
    assert_eq!(session.source(), "x = 10\n");
    assert_eq!(session.attempted_source(), "x = 10\nx = x +\n");

    session.submit("puts x").unwrap();
    assert_eq!(output_of(&session), "10\n");
}

#[test]
fn runtime_errors_keep_the_chunk() {
    let mut session = session_with_input("");
    session.submit("x = 1").unwrap();

    let error = session.submit("puts 1 + missing").unwrap_err();
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert!(session.source().contains("missing"));

    // The failed statement is not run again.
    session.submit("puts x").unwrap();
    assert_eq!(output_of(&session), "1\n");
}

#[test]
fn blocks_submitted_whole_run_once() {
    let mut session = session_with_input("");
    session.submit("i = 0").unwrap();
    session
        .submit("while i < 3\n  i = i + 1\nend\nputs i")
        .unwrap();
    session.submit("puts i * 2").unwrap();

    assert_eq!(output_of(&session), "3\n6\n");
}

#[test]
fn gets_and_session_reads_share_one_input() {
    let mut session = session_with_input("typed\nnext line\n");
    session.submit("name = gets").unwrap();

    let mut line = String::new();
    session.read_line(&mut line).unwrap();
    assert_eq!(line, "next line\n");
    assert_eq!(
        session.evaluator().variable("name"),
        Some(&Value::String("typed".to_string()))
    );
}
