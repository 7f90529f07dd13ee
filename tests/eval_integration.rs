use snek::eval::{Evaluator, Execution, Interpreter};
use snek::types::CompilerFlags;

/// Helper: run one interactive unit in a fresh interpreter.
fn eval(unit: &str) -> Execution {
    Interpreter::new().execute(unit, CompilerFlags::empty())
}

/// Helper: run a script, then return what it printed.
fn script(source: &str) -> String {
    let exec = Interpreter::new().run_script(source, CompilerFlags::empty());
    assert!(exec.succeeded(), "script failed: {}", exec.stderr);
    exec.stdout
}

/// Helper: run units one after another in the same interpreter.
fn eval_units(units: &[&str]) -> Vec<Execution> {
    let mut interp = Interpreter::new();
    units
        .iter()
        .map(|unit| interp.execute(unit, CompilerFlags::empty()))
        .collect()
}

// ========== Echo of expression results ==========

#[test]
fn echo_integer() {
    assert_eq!(eval("42").stdout, "42\n");
}

#[test]
fn echo_negative_number() {
    assert_eq!(eval("-7").stdout, "-7\n");
}

#[test]
fn echo_string_repr() {
    assert_eq!(eval("'hello world'").stdout, "'hello world'\n");
    assert_eq!(eval("\"it's\"").stdout, "\"it's\"\n");
}

#[test]
fn echo_skips_none() {
    assert_eq!(eval("None").stdout, "");
    assert_eq!(eval("print('x')").stdout, "x\n");
}

#[test]
fn echo_containers() {
    assert_eq!(eval("[1, 'a', (2,), {'k': None}]").stdout, "[1, 'a', (2,), {'k': None}]\n");
}

#[test]
fn script_mode_does_not_echo() {
    assert_eq!(script("1 + 1\n"), "");
}

// ========== Arithmetic ==========

#[test]
fn integer_division_floors_by_default() {
    assert_eq!(eval("1 / 2").stdout, "0\n");
    assert_eq!(eval("-7 / 2").stdout, "-4\n");
}

#[test]
fn true_division_under_flag() {
    let exec = Interpreter::new().execute("1 / 2", CompilerFlags::DIVISION);
    assert_eq!(exec.stdout, "0.5\n");
}

#[test]
fn float_division_is_always_true() {
    assert_eq!(eval("1.0 / 4").stdout, "0.25\n");
}

#[test]
fn modulo_and_power() {
    assert_eq!(eval("-7 % 3").stdout, "2\n");
    assert_eq!(eval("2 ** 10").stdout, "1024\n");
}

#[test]
fn zero_division_traceback() {
    let exec = eval("1 / 0");
    assert!(exec.stderr.starts_with("Traceback (most recent call last):\n"));
    assert!(exec.stderr.ends_with("ZeroDivisionError: integer division or modulo by zero\n"));
}

#[test]
fn oversized_repetition_is_a_traceback() {
    let exec = eval("'a' * 9999999999999");
    assert!(exec.stderr.ends_with("OverflowError: repeated sequence is too long\n"));
    assert_eq!(eval("len([0] * 3)").stdout, "3\n");
}

#[test]
fn string_formatting() {
    assert_eq!(eval("'%s=%d' % ('x', 3)").stdout, "'x=3'\n");
    assert_eq!(eval("'{} and {}'.format(1, 'b')").stdout, "'1 and b'\n");
}

// ========== Statements and blocks ==========

#[test]
fn if_elif_else() {
    let src = "x = 5\nif x < 3:\n    print('small')\nelif x < 10:\n    print('medium')\nelse:\n    print('large')\n";
    assert_eq!(script(src), "medium\n");
}

#[test]
fn for_loop_over_range_with_accumulator() {
    assert_eq!(script("total = 0\nfor i in range(5):\n    total += i\nprint(total)\n"), "10\n");
}

#[test]
fn while_with_break_and_else() {
    let src = "n = 0\nwhile True:\n    n += 1\n    if n == 3:\n        break\nelse:\n    print('never')\nprint(n)\n";
    assert_eq!(script(src), "3\n");
}

#[test]
fn tuple_unpacking() {
    assert_eq!(script("a, b = 1, 2\na, b = b, a\nprint(a, b)\n"), "2 1\n");
}

#[test]
fn chained_comparison() {
    assert_eq!(eval("1 < 2 < 3").stdout, "True\n");
    assert_eq!(eval("1 < 3 < 2").stdout, "False\n");
}

#[test]
fn assert_failure_reports_message() {
    let exec = eval("assert 1 == 2, 'nope'");
    assert!(exec.stderr.ends_with("AssertionError: nope\n"));
}

#[test]
fn raise_custom_message() {
    let exec = eval("raise ValueError('bad value')");
    assert!(exec.stderr.ends_with("ValueError: bad value\n"));
}

#[test]
fn del_removes_binding() {
    let execs = eval_units(&["x = 1", "del x", "x"]);
    assert!(execs[1].succeeded());
    assert!(execs[2].stderr.contains("NameError: name 'x' is not defined"));
}

#[test]
fn import_of_unknown_module() {
    assert!(eval("import os").stderr.contains("ImportError: No module named os"));
}

// ========== Functions and classes ==========

#[test]
fn recursive_function() {
    let src = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\nprint(fact(10))\n";
    assert_eq!(script(src), "3628800\n");
}

#[test]
fn default_and_keyword_arguments() {
    let src = "def greet(name, greeting='hello'):\n    return greeting + ', ' + name\nprint(greet('bob'))\nprint(greet('amy', greeting='hi'))\n";
    assert_eq!(script(src), "hello, bob\nhi, amy\n");
}

#[test]
fn runaway_recursion_is_caught() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let src = "def f(n):\n    return f(n + 1)\nf(0)\n";
            Interpreter::new().run_script(src, CompilerFlags::empty())
        })
        .unwrap();
    let exec = handle.join().unwrap();
    assert!(exec.stderr.contains("RuntimeError: maximum recursion depth exceeded"));
}

#[test]
fn class_inheritance_and_isinstance() {
    let src = "class Animal:\n    def speak(self):\n        return 'generic'\nclass Dog(Animal):\n    def speak(self):\n        return 'woof'\nd = Dog()\nprint(d.speak(), isinstance(d, Animal))\n";
    assert_eq!(script(src), "woof True\n");
}

#[test]
fn missing_attribute() {
    let execs = eval_units(&["class A:\n    pass\n", "A().missing"]);
    assert!(execs[1].stderr.contains("AttributeError"));
}

// ========== Builtins ==========

#[test]
fn len_and_sorted() {
    assert_eq!(eval("len([3, 1, 2])").stdout, "3\n");
    assert_eq!(eval("sorted([3, 1, 2], reverse=True)").stdout, "[3, 2, 1]\n");
}

#[test]
fn dict_operations() {
    let execs = eval_units(&["d = {'a': 1}", "d['b'] = 2", "sorted(d.keys())", "d.get('z', 0)"]);
    assert_eq!(execs[2].stdout, "['a', 'b']\n");
    assert_eq!(execs[3].stdout, "0\n");
}

#[test]
fn missing_key_error() {
    assert!(eval("{}['nope']").stderr.ends_with("KeyError: 'nope'\n"));
}

#[test]
fn builtin_argument_count_error() {
    assert!(eval("len()").stderr.contains("TypeError: len() takes exactly 1 argument (0 given)"));
}

#[test]
fn min_max_sum() {
    assert_eq!(eval("(min(4, 2, 8), max([4, 2, 8]), sum(range(4)))").stdout, "(2, 8, 6)\n");
}

#[test]
fn list_mutation_is_shared() {
    let execs = eval_units(&["a = [1]", "b = a", "b.append(2)", "a"]);
    assert_eq!(execs[3].stdout, "[1, 2]\n");
}

// ========== Session-level state ==========

#[test]
fn names_include_user_bindings_and_builtins() {
    let mut interp = Interpreter::new();
    interp.execute("answer = 42", CompilerFlags::empty());
    let names = interp.names();
    assert!(names.iter().any(|n| n == "answer"));
    assert!(names.iter().any(|n| n == "len"));
}

#[test]
fn future_import_inside_script_sets_flags() {
    let exec = Interpreter::new().run_script(
        "from __future__ import division\nprint(1 / 2)\n",
        CompilerFlags::empty(),
    );
    assert_eq!(exec.stdout, "0.5\n");
    assert!(exec.flags.contains(CompilerFlags::DIVISION));
}

#[test]
fn unknown_future_feature_is_syntax_error() {
    let exec = eval("from __future__ import telepathy");
    assert!(exec.stderr.contains("SyntaxError: future feature telepathy is not defined"));
}
