// Evaluator behaviour tests for sprig
//
// Programs run against an in-memory output buffer and a scripted input, so
// every test checks exactly what a script would print.

use pretty_assertions::assert_eq;
use sprig::error::{ErrorKind, SprigError};
use sprig::evaluator::Evaluator;
use sprig::runner::parse_source;
use sprig::value::{Tag, Value};
use std::io::Cursor;

type TestEvaluator = Evaluator<Vec<u8>, Cursor<Vec<u8>>>;

fn evaluator_with_input(input: &str) -> TestEvaluator {
    Evaluator::with_io(Vec::new(), Cursor::new(input.as_bytes().to_vec()))
}

/// Runs `source` with `input` as stdin. Returns the evaluator, for looking
/// at variables and output, together with the run result.
fn execute(source: &str, input: &str) -> (TestEvaluator, Result<(), SprigError>) {
    let program = parse_source(source).expect("program should parse");
    let mut evaluator = evaluator_with_input(input);
    let result = evaluator.run(&program.scopes, &program.instructions);
    (evaluator, result)
}

fn output_of(evaluator: &TestEvaluator) -> String {
    String::from_utf8(evaluator.output().clone()).expect("output should be UTF-8")
}

fn run_ok(source: &str) -> String {
    let (evaluator, result) = execute(source, "");
    if let Err(error) = result {
        panic!("program failed: {}", error);
    }
    output_of(&evaluator)
}

fn run_err(source: &str) -> SprigError {
    let (_, result) = execute(source, "");
    result.expect_err("program should fail")
}

// ============================================================================
// Values and arithmetic
// ============================================================================

#[test]
fn integer_addition_stays_integer() {
    let (evaluator, result) = execute("x = 1 + 2", "");
    assert!(result.is_ok());
    assert_eq!(evaluator.variable("x"), Some(&Value::Integer(3)));
}

#[test]
fn whole_float_results_become_integers() {
    let (evaluator, _) = execute("x = 1.0 + 2.0\ny = 6.0 / 2", "");
    let x = evaluator.variable("x").cloned().unwrap();
    assert_eq!(x.tag(), Tag::Integer);
    assert_eq!(x, Value::Integer(3));
    assert_eq!(evaluator.variable("y"), Some(&Value::Integer(3)));
}

#[test]
fn fractional_float_results_stay_float() {
    let (evaluator, _) = execute("x = 1.5 + 2.0\ny = 7.0 / 2", "");
    assert_eq!(evaluator.variable("x"), Some(&Value::Float(3.5)));
    assert_eq!(evaluator.variable("y"), Some(&Value::Float(3.5)));
}

#[test]
fn integer_division_modulo_and_power() {
    let output = run_ok("puts 7 / 2, (0 - 7) / 2, 7 % 3, 2 ** 10, 2 ** -1");
    assert_eq!(output, "3\n-4\n1\n1024\n0.5\n");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let error = run_err("x = 1\ny = x / 0");
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(error.line, 2);
    assert!(error.message.contains("Division by zero on line 2"));
}

#[test]
fn arithmetic_on_strings_names_the_side() {
    let error = run_err("s = \"one\"\nx = 1 + s");
    assert_eq!(
        error.message,
        "The expression to the right of the '+' on line 2 is not a number"
    );
}

#[test]
fn assignment_inside_an_expression() {
    let (evaluator, _) = execute("y = (x = 3) + 1", "");
    assert_eq!(evaluator.variable("x"), Some(&Value::Integer(3)));
    assert_eq!(evaluator.variable("y"), Some(&Value::Integer(4)));
}

// ============================================================================
// Conditions and boolean operators
// ============================================================================

#[test]
fn equality_compares_across_number_kinds() {
    let output = run_ok("puts 1 == 1.0, \"a\" is \"a\", nil == false, 2 != 3");
    assert_eq!(output, "true\ntrue\nfalse\ntrue\n");
}

#[test]
fn ordering_strings_fails_on_the_left_operand() {
    let error = run_err("x = 1\ny = \"a\" > \"b\"");
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(
        error.message,
        "The expression to the left of the '>' on line 2 is not a number"
    );
}

#[test]
fn ordering_checks_the_right_operand_too() {
    let error = run_err("s = \"b\"\nok = 1 <= s");
    assert_eq!(
        error.message,
        "The expression to the right of the '<=' on line 2 is not a number"
    );
}

#[test]
fn boolean_operators_evaluate_both_sides() {
    let source = "\
def $side
  $count = $count + 1
  true
end
$count = 0
x = false and $side
y = true or $side
z = false && $side || $side
puts $count, x, y";
    assert_eq!(run_ok(source), "4\nfalse\ntrue\n");
}

#[test]
fn boolean_operators_return_an_operand() {
    let (evaluator, _) = execute("a = nil or false\nb = nil and true\nc = true && nil", "");
    assert_eq!(evaluator.variable("a"), Some(&Value::Boolean(false)));
    assert_eq!(evaluator.variable("b"), Some(&Value::Nil));
    assert_eq!(evaluator.variable("c"), Some(&Value::Nil));
}

#[test]
fn boolean_operators_reject_other_kinds() {
    let error = run_err("x = 1\nputs x and true");
    assert_eq!(
        error.message,
        "The expression to the left of the 'and' on line 2 is not a boolean value"
    );
}

#[test]
fn negation() {
    assert_eq!(run_ok("puts !true, not nil, not 1 > 2"), "false\ntrue\ntrue\n");

    let error = run_err("x = 1\nputs !x");
    assert!(error.message.contains("after the '!' on line 2 is not a boolean value"));
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn print_joins_with_spaces_without_newline() {
    assert_eq!(run_ok("print 1, \"a\", nil, 2.5, 3.0"), "1 a nil 2.5 3.0");
}

#[test]
fn puts_writes_one_value_per_line() {
    assert_eq!(run_ok("puts\nputs 1, nil\nputs \"x\""), "\n1\nnil\nx\n");
}

#[test]
fn if_runs_the_first_matching_branch() {
    let source = "\
if 1 > 2
  print \"a\"
elif 3 > 2
  print \"b\"
else
  print \"c\"
end";
    assert_eq!(run_ok(source), "b");
}

#[test]
fn else_branch_and_no_branch() {
    assert_eq!(run_ok("if false\nputs 1\nelse\nputs 2\nend"), "2\n");
    assert_eq!(run_ok("if nil\nputs 1\nelif false\nputs 2\nend\nputs 3"), "3\n");
}

#[test]
fn while_loops_until_falsy() {
    let source = "\
i = 0
while i < 3
  print i
  i = i + 1
end";
    assert_eq!(run_ok(source), "012");
}

#[test]
fn multiple_assignment_pads_with_nil() {
    let (evaluator, _) = execute("a, b = 1\nc, d = 3, 4", "");
    assert_eq!(evaluator.variable("a"), Some(&Value::Integer(1)));
    assert_eq!(evaluator.variable("b"), Some(&Value::Nil));
    assert_eq!(evaluator.variable("c"), Some(&Value::Integer(3)));
    assert_eq!(evaluator.variable("d"), Some(&Value::Integer(4)));
}

#[test]
fn surplus_values_are_never_evaluated() {
    let source = "\
def $f
  puts \"called\"
end
a = 1, $f()
puts a";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn empty_right_hand_side_assigns_nil() {
    let (evaluator, _) = execute("x = 5\nx =", "");
    assert_eq!(evaluator.variable("x"), Some(&Value::Nil));
}

#[test]
fn gets_reads_lines_without_terminators() {
    let source = "\
a = gets
gets
b = gets
c = gets
puts a, b, c";
    let (evaluator, result) = execute(source, "hello\r\nskipped\nworld\n");
    assert!(result.is_ok());
    assert_eq!(output_of(&evaluator), "hello\nworld\nnil\n");
    assert_eq!(
        evaluator.variable("a").map(Value::tag),
        Some(Tag::String)
    );
}

#[test]
fn undefined_variable_reports_its_line() {
    let error = run_err("x = 1\nputs 1 + zz");
    assert_eq!(error.line, 2);
    assert!(error.message.contains("Undefined variable 'zz' on line 2"));
}

// ============================================================================
// Functions and scoping
// ============================================================================

#[test]
fn globals_are_visible_inside_functions() {
    let source = "\
$g = 5
def show
  puts $g
  $g = $g + 1
end
show
puts $g";
    assert_eq!(run_ok(source), "5\n6\n");
}

#[test]
fn caller_locals_are_not_visible_in_expressions() {
    let source = "\
y = 1
def f
  1 + y
end
f";
    let error = run_err(source);
    assert_eq!(error.line, 3);
    assert!(error.message.contains("Undefined variable 'y' on line 3"));
}

#[test]
fn a_local_named_like_a_caller_local_starts_as_nil() {
    let source = "\
y = 1
def f
  puts y
end
f";
    assert_eq!(run_ok(source), "nil\n");
}

#[test]
fn parameters_bind_positionally() {
    let source = "\
def show(a, b)
  puts a, b
end
show(1)
show(1, 2, 3)";
    assert_eq!(run_ok(source), "1\nnil\n1\n2\n");
}

#[test]
fn call_yields_the_last_evaluated_value() {
    let source = "\
def $fact(n)
  if n <= 1
    1
  else
    n * $fact(n - 1)
  end
end
puts $fact(5)";
    assert_eq!(run_ok(source), "120\n");
}

#[test]
fn global_functions_can_recurse() {
    let source = "\
def $countdown(n)
  if n > 0
    puts n
    $countdown(n - 1)
  end
end
$countdown(3)";
    assert_eq!(run_ok(source), "3\n2\n1\n");
}

#[test]
fn top_level_functions_are_not_callable_from_other_functions() {
    let source = "\
def helper
  puts \"helper\"
end
def outer
  helper
end
puts outer";
    assert_eq!(run_ok(source), "nil\n");
}

#[test]
fn non_function_reference_ignores_arguments() {
    let source = "\
def $boom
  puts \"boom\"
end
x = 4
puts x($boom())";
    assert_eq!(run_ok(source), "4\n");
}

#[test]
fn frames_are_popped_after_a_failing_call() {
    let source = "\
def $bad
  s = \"x\"
  1 + s
end
$bad";
    let (evaluator, result) = execute(source, "");
    let error = result.expect_err("call should fail");
    assert_eq!(error.line, 3);
    assert_eq!(evaluator.frame_count(), 1);
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    // Deep recursion needs more stack than a test thread gets by default.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let (evaluator, result) = execute("def $loop\n  $loop\nend\n$loop", "");
            (evaluator.frame_count(), result.map_err(|error| error.message))
        })
        .expect("thread should spawn");

    let (frames, result) = handle.join().expect("thread should not panic");
    let message = result.expect_err("recursion should be stopped");
    assert!(message.contains("Stack level too deep calling '$loop' on line 2"));
    assert_eq!(frames, 1);
}

// ============================================================================
// Re-runs
// ============================================================================

#[test]
fn migration_keeps_shared_names_and_drops_the_rest() {
    let first = parse_source("x = 1\ny = 2\n$g = 3").unwrap();
    let second = parse_source("x = x + 10\n$g = $g * 2\nputs z").unwrap();

    let mut evaluator = evaluator_with_input("");
    evaluator.run(&first.scopes, &first.instructions).unwrap();
    evaluator
        .migrate_and_run(&second.scopes, &second.instructions)
        .unwrap();

    assert_eq!(evaluator.variable("x"), Some(&Value::Integer(11)));
    assert_eq!(evaluator.variable("$g"), Some(&Value::Integer(6)));
    assert_eq!(evaluator.variable("y"), None);
    assert_eq!(evaluator.variable("z"), Some(&Value::Nil));
    assert_eq!(output_of(&evaluator), "nil\n");
}

#[test]
fn migrate_without_previous_run_behaves_like_run() {
    let program = parse_source("x = 2\nputs x").unwrap();
    let mut evaluator = evaluator_with_input("");
    evaluator
        .migrate_and_run(&program.scopes, &program.instructions)
        .unwrap();
    assert_eq!(output_of(&evaluator), "2\n");
}

#[test]
fn runs_are_deterministic() {
    let source = "\
$total = 0
i = 1
while i <= 10
  $total = $total + i * 1.5
  i = i + 1
end
print $total, i";
    let first = run_ok(source);
    let second = run_ok(source);
    assert_eq!(first, "82.5 11");
    assert_eq!(first, second);
}
