//! End-to-end scenarios: compile-and-run whole programs through the
//! public `ember_rt::interpret` entry point, the same path the CLI uses.

use ember_rt::InterpretResult;

fn run(source: &str) -> InterpretResult {
    ember_rt::interpret(source)
}

#[test]
fn arithmetic_precedence_and_grouping() {
    let source = "\
var result = 2 + 3 * 4 - (10 / 2);
print(result);
var power = 2 ** 3 ** 2;
print(power);
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn variable_declaration_and_assignment() {
    let source = "\
var x = 1;
var y = 2, z;
x = x + y;
print(x);
print(z);
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn recursive_fibonacci() {
    let source = "\
def fib(n):
    if n < 2:
        return n;
    end
    return fib(n - 1) + fib(n - 2);
end

var i = 0;
while i < 10:
    print(fib(i));
    i = i + 1;
end
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn list_append_index_and_mutate() {
    let source = "\
var xs = [1, 2, 3];
append(xs, 4);
print(xs[0]);
print(xs[3]);
xs[0] = 99;
print(xs[0]);
delete(xs, 1);
print(xs);
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn negative_list_index_is_a_runtime_error() {
    let source = "var xs = [1, 2, 3]; print(xs[-1]);";
    assert_eq!(run(source), InterpretResult::RuntimeError);
}

#[test]
fn while_with_break_and_continue() {
    let source = "\
var i = 0;
var total = 0;
while i < 10:
    i = i + 1;
    if i % 2 == 0:
        continue;
    end
    if i > 7:
        break;
    end
    total = total + i;
end
print(total);
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn string_concat_and_escape_printing() {
    let source = r#"
var greeting = "Hello, " + "world!";
print(greeting);
print("line one\nline two\ttabbed");
"#;
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn short_circuit_evaluation_skips_the_erroring_branch() {
    // If `and`/`or` were not short-circuiting, the right-hand side would
    // run and raise an undefined-variable runtime error.
    let source = "\
if false and (undefined_name > 0):
    print(\"unreachable\");
end
if true or (undefined_name > 0):
    print(\"reached\");
end
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn floor_division_and_modulo_follow_divisor_sign() {
    let source = "\
print(-7 // 2);
print(-7 % 2);
print(7 // -2);
print(7 % -2);
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn closures_are_a_non_goal_so_nested_def_sees_only_globals_and_params() {
    let source = "\
var shared = 10;
def outer():
    def inner(x):
        return x + shared;
    end
    return inner(5);
end
print(outer());
";
    assert_eq!(run(source), InterpretResult::Ok);
}

#[test]
fn sanitized_source_runs_the_same_as_explicitly_terminated_source() {
    let loose = "\
var x = 1
var y = 2
print(x + y)
";
    let sanitized = ember_sanitizer::sanitize(loose);
    assert_eq!(run(&sanitized), InterpretResult::Ok);
}

#[test]
fn compile_errors_never_reach_the_vm() {
    assert_eq!(run("def f(:\nend\n"), InterpretResult::CompileError);
    assert_eq!(run("var 1x = 2;"), InterpretResult::CompileError);
}

#[test]
fn declarations_are_not_allowed_inside_if_or_while_bodies() {
    assert_eq!(run("if true: var x = 1; end"), InterpretResult::CompileError);
    assert_eq!(run("while false: var x = 1; end"), InterpretResult::CompileError);
}

#[test]
fn runtime_errors_report_a_stack_trace_and_stop_cleanly() {
    let source = "\
def boom():
    return undefined_name;
end
print(boom());
";
    assert_eq!(run(source), InterpretResult::RuntimeError);
}
