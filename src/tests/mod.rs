//! End-to-end scenarios driving the embedding surface the way a host
//! would: parse, evaluate, force values, apply changes, re-evaluate.

use crate::language::span::{location_at, Range};
use crate::runtime::error::RuntimeError;
use crate::runtime::interpreter::{EvalResult, Interpreter, InterpreterConfig};
use crate::runtime::source_change::{SourceChange, SourceEdit};
use crate::runtime::value::{CallResult, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn eval(source: &str) -> EvalResult {
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    interpreter.evaluate().expect("evaluate")
}

fn eval_value(source: &str) -> Value {
    eval(source).value
}

/// The range of the nth (1-based) occurrence of `needle` in `source`.
fn range_of(source: &str, needle: &str, nth: usize) -> Range {
    let mut from = 0;
    let mut occurrence = 0;
    loop {
        let start = from + source[from..].find(needle).expect("needle occurrence");
        occurrence += 1;
        if occurrence == nth {
            return Range::new(
                location_at(source, start),
                location_at(source, start + needle.len()),
            );
        }
        from = start + needle.len();
    }
}

fn edit(source: &str, needle: &str, nth: usize, replacement: &str) -> SourceChange {
    SourceChange::edit(range_of(source, needle, nth), replacement)
}

#[test]
fn s1_addition_evaluates_without_changes() {
    let result = eval("x = 1 + 2 return x");
    assert_eq!(result.value, Value::number(3.0));
    assert!(result.source_change.is_none());
}

#[test]
fn s2_forcing_an_addition_offers_both_literals() {
    let source = "y = 1 + 2";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    interpreter.evaluate().expect("evaluate");

    let y = interpreter.environment().get("y");
    let change = y.force(&Value::number(10.0)).expect("forceable");
    assert_eq!(
        change,
        SourceChange::Or(vec![
            edit(source, "1", 1, "8"),
            edit(source, "2", 1, "9"),
        ])
    );
}

#[test]
fn s3_table_field_round_trip() {
    let result = eval_value("t = {} t.a = 5 return t.a");
    assert_eq!(result, Value::number(5.0));
}

#[test]
fn s4_numeric_for_accumulates() {
    let result = eval_value("s = 0 for i = 1, 3 do s = s + i end return s");
    assert_eq!(result, Value::number(6.0));
}

#[test]
fn s5_recursive_factorial() {
    let result = eval_value(
        "function f(n) if n <= 1 then return 1 end return n * f(n - 1) end return f(5)",
    );
    assert_eq!(result, Value::number(120.0));
}

#[test]
fn s6_short_circuit_selection_chain() {
    let truthy = eval_value("a = true and \"x\" or \"y\" return a");
    assert_eq!(truthy, Value::from("x"));

    let source = "a = true and \"x\" or \"y\" return a";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    interpreter.evaluate().expect("evaluate");
    interpreter
        .apply_source_changes(vec![SourceEdit::new(range_of(source, "true", 1), "false")])
        .expect("apply");
    let result = interpreter.evaluate().expect("evaluate");
    assert_eq!(result.value, Value::from("y"));
}

// ---- spec properties ----

#[test]
fn re_evaluation_is_pure() {
    let source = "x = 2 * 3 c = force(x, 42) return x";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    let first = interpreter.evaluate().expect("evaluate");
    let second = interpreter.evaluate().expect("evaluate");
    assert_eq!(first.value, second.value);
    assert!(first.source_change.is_some());
    assert_eq!(first.source_change, second.source_change);
}

#[test]
fn literal_origins_are_sound() {
    let source = "return 42";
    let result = eval(source);
    let origin = result.value.origin();
    let crate::runtime::origin::Origin::Literal(literal) = origin else {
        panic!("expected a literal origin");
    };
    let text = &source[literal.range.start.byte..literal.range.end.byte];
    assert_eq!(result.value.to_literal().unwrap(), text);
}

#[test]
fn force_round_trips_through_the_source() {
    let source = "y = 1 + 2 return y";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    let result = interpreter.evaluate().expect("evaluate");
    assert_eq!(result.value, Value::number(3.0));

    let change = result.value.force(&Value::number(10.0)).expect("forceable");
    interpreter.apply_source_change(&change).expect("apply");
    let result = interpreter.evaluate().expect("re-evaluate");
    assert_eq!(result.value, Value::number(10.0));
    assert_eq!(interpreter.source_code(), "y = 8 + 2 return y");
}

#[test]
fn short_circuit_skips_side_effects() {
    let counter = Rc::new(Cell::new(0));
    let mut interpreter =
        Interpreter::with_source("x = false and touch(1) y = true or touch(2) return x")
            .expect("parse");
    let seen = counter.clone();
    interpreter.environment().add_native("touch", move |ctx| {
        seen.set(seen.get() + 1);
        Ok(CallResult::new(ctx.args.clone()))
    });
    let result = interpreter.evaluate().expect("evaluate");
    assert_eq!(result.value, Value::from(false));
    assert_eq!(counter.get(), 0);
}

#[test]
fn block_locals_close_with_their_block() {
    let result = eval_value("local x = 1 do local x = 2 end return x");
    assert_eq!(result, Value::number(1.0));
}

#[test]
fn repeat_locals_are_visible_in_the_condition() {
    let result = eval_value(
        "n = 0 repeat local done = n > 1 n = n + 1 until done return n",
    );
    assert_eq!(result, Value::number(3.0));
}

#[test]
fn break_exits_exactly_one_loop() {
    let result = eval_value(
        "outer = 0 inner = 0 \
         while outer < 3 do \
           outer = outer + 1 \
           while true do \
             inner = inner + 1 \
             if true then break end \
           end \
         end \
         return outer * 10 + inner",
    );
    assert_eq!(result, Value::number(33.0));
}

#[test]
fn break_at_top_level_is_a_loop_misuse() {
    let mut interpreter = Interpreter::with_source("break").expect("parse");
    let err = interpreter.evaluate().expect_err("should fail");
    assert!(matches!(err, RuntimeError::LoopMisuse { .. }));
}

// ---- language behaviour beyond the numbered scenarios ----

#[test]
fn multiple_assignment_aligns_and_pads() {
    assert_eq!(
        eval_value("a, b, c = 1, 2 return b"),
        Value::number(2.0)
    );
    assert_eq!(eval_value("a, b, c = 1, 2 return c"), Value::nil());
    assert_eq!(eval_value("a = 1, 2, 3 return a"), Value::number(1.0));
}

#[test]
fn trailing_call_expands_in_assignments() {
    let result = eval_value(
        "function pair() return 1, 2 end a, b = pair() return a + b",
    );
    assert_eq!(result, Value::number(3.0));
}

#[test]
fn non_trailing_call_truncates_to_one_value() {
    let result = eval_value(
        "function pair() return 1, 2 end a, b = pair(), 10 return b",
    );
    assert_eq!(result, Value::number(10.0));
}

#[test]
fn parentheses_truncate_multiple_values() {
    let result = eval_value(
        "function pair() return 1, 2 end a, b = (pair()) return b",
    );
    assert_eq!(result, Value::nil());
}

#[test]
fn method_calls_bind_self() {
    let result = eval_value(
        "t = { value = 7 } \
         function t:get() return self.value end \
         return t:get()",
    );
    assert_eq!(result, Value::number(7.0));
}

#[test]
fn dotted_function_declarations_attach_to_tables() {
    let result = eval_value(
        "m = {} function m.double(n) return n * 2 end return m.double(21)",
    );
    assert_eq!(result, Value::number(42.0));
}

#[test]
fn variadic_functions_collect_extra_arguments() {
    let result = eval_value(
        "function sum(...) local t = { ... } local s = 0 \
         for i, v in ipairs(t) do s = s + v end return s end \
         return sum(1, 2, 3, 4)",
    );
    assert_eq!(result, Value::number(10.0));
}

#[test]
fn for_in_iterates_sequences() {
    let result = eval_value(
        "t = { 10, 20, 30 } s = 0 for i, v in ipairs(t) do s = s + v end return s",
    );
    assert_eq!(result, Value::number(60.0));
}

#[test]
fn closures_capture_their_defining_scope() {
    let result = eval_value(
        "function counter() local n = 0 \
         return function() n = n + 1 return n end end \
         c = counter() c() c() return c()",
    );
    assert_eq!(result, Value::number(3.0));
}

#[test]
fn table_aliasing_preserves_identity() {
    let result = eval_value("a = {} b = a b.x = 1 return a.x");
    assert_eq!(result, Value::number(1.0));

    let result = eval_value("a = {} b = a return a == b");
    assert_eq!(result, Value::from(true));

    let result = eval_value("a = {} b = {} return a == b");
    assert_eq!(result, Value::from(false));
}

#[test]
fn numeric_for_respects_negative_steps() {
    let result = eval_value("s = 0 for i = 3, 1, -1 do s = s * 10 + i end return s");
    assert_eq!(result, Value::number(321.0));
}

#[test]
fn concat_stringifies_numbers() {
    assert_eq!(
        eval_value("return \"n = \" .. 1"),
        Value::from("n = 1")
    );
    assert_eq!(eval_value("return 1 .. 2"), Value::from("12"));
}

#[test]
fn string_escapes_travel_through_the_lexer() {
    assert_eq!(
        eval_value("return \"a\\tb\\110\""),
        Value::from("a\tbn")
    );
}

#[test]
fn forcing_a_short_circuit_result_targets_the_selected_operand() {
    let source = "a = true and 5 return a";
    let result = eval(source);
    assert_eq!(result.value, Value::number(5.0));
    let change = result.value.force(&Value::number(7.0)).expect("forceable");
    assert_eq!(change, edit(source, "5", 1, "7"));
}

#[test]
fn forced_concat_edits_survive_application() {
    let source = "greeting = \"hello \" .. \"world\" return greeting";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    let result = interpreter.evaluate().expect("evaluate");
    assert_eq!(result.value, Value::from("hello world"));

    let change = result
        .value
        .force(&Value::from("hello moon"))
        .expect("forceable");
    interpreter.apply_source_change(&change).expect("apply");
    let result = interpreter.evaluate().expect("re-evaluate");
    assert_eq!(result.value, Value::from("hello moon"));
}

#[test]
fn native_force_surfaces_changes_through_eval_result() {
    let source = "x = 4 force(x, 9) return x";
    let result = eval(source);
    assert_eq!(result.value, Value::number(4.0));
    assert_eq!(
        result.source_change,
        Some(edit(source, "4", 1, "9"))
    );
}

#[test]
fn goto_reports_a_runtime_error() {
    let mut interpreter =
        Interpreter::with_source("::top:: x = 1 goto top").expect("parse");
    let err = interpreter.evaluate().expect_err("should fail");
    assert!(matches!(err, RuntimeError::Runtime { .. }));
}

#[test]
fn calling_a_non_function_is_a_call_error() {
    let mut interpreter = Interpreter::with_source("x = 1 x()").expect("parse");
    let err = interpreter.evaluate().expect_err("should fail");
    assert!(matches!(err, RuntimeError::CallError { .. }));
}

#[test]
fn type_errors_carry_the_operator() {
    let mut interpreter = Interpreter::with_source("return {} + 1").expect("parse");
    let err = interpreter.evaluate().expect_err("should fail");
    let RuntimeError::TypeError { op, operands, .. } = err else {
        panic!("expected a type error");
    };
    assert_eq!(op, "add");
    assert_eq!(operands, "table and number");
}

#[test]
fn tick_cancellation_aborts_evaluation() {
    let mut interpreter =
        Interpreter::with_source("n = 0 while true do n = n + 1 end").expect("parse");
    let budget = Cell::new(100);
    interpreter.config_mut().tick = Some(Rc::new(move || {
        budget.set(budget.get() - 1);
        budget.get() > 0
    }));
    let err = interpreter.evaluate().expect_err("should cancel");
    assert!(matches!(err, RuntimeError::Cancelled));
}

#[test]
fn trace_sink_receives_call_traces() {
    let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter =
        Interpreter::with_source("function f() return 1 end return f()").expect("parse");
    interpreter.set_config(InterpreterConfig {
        trace_calls: true,
        trace_sink: Some(sink.clone()),
        ..InterpreterConfig::default()
    });
    interpreter.evaluate().expect("evaluate");
    let traced = String::from_utf8(sink.borrow().clone()).expect("utf8");
    assert!(traced.contains("Calling function: f"));
}

#[test]
fn parse_errors_surface_in_with_source() {
    let err = Interpreter::with_source("if x then").expect_err("should fail");
    assert!(matches!(err, RuntimeError::ParseFailed { .. }));
}

#[test]
fn evaluate_requires_parsed_source() {
    let mut interpreter = Interpreter::new();
    assert!(interpreter.evaluate().is_err());
    assert!(interpreter.parse("x = 1").is_ok());
    assert!(interpreter.evaluate().is_ok());
}

#[test]
fn overlapping_host_edits_are_fatal() {
    let source = "x = 123";
    let mut interpreter = Interpreter::with_source(source).expect("parse");
    let err = interpreter
        .apply_source_changes(vec![
            SourceEdit::new(range_of(source, "12", 1), "9"),
            SourceEdit::new(range_of(source, "23", 1), "8"),
        ])
        .expect_err("should fail");
    assert!(matches!(err, RuntimeError::Runtime { .. }));
}

#[test]
fn globals_survive_across_parses() {
    let mut interpreter = Interpreter::with_source("x = 41").expect("parse");
    interpreter.evaluate().expect("evaluate");
    assert!(interpreter.parse("return x + 1").is_ok());
    let result = interpreter.evaluate().expect("evaluate");
    assert_eq!(result.value, Value::number(42.0));
}
