mod common;

use common::get_test_session;

use approx::assert_relative_eq;
use eecalc::ast::ArithmeticError;
use eecalc::pretty_print::PrettyPrint;
use eecalc::unit::{combination_rules, find_unit, Combination, UnitMismatch};
use eecalc::variable_bank::VariableError;
use eecalc::{BaseUnit, EecalcError, Quantity, RuntimeError, Session, Unit};

fn expect_output_with_session(session: &mut Session, input: &str, expected_output: &str) {
    let quantity = session.evaluate(input).unwrap();
    assert_eq!(quantity.to_string(), expected_output, "input: {input}");
}

fn expect_output(input: &str, expected_output: &str) {
    let mut session = get_test_session();
    expect_output_with_session(&mut session, input, expected_output)
}

fn expect_failure(input: &str, msg_part: &str) {
    let mut session = get_test_session();
    if let Err(e) = session.evaluate(input) {
        let error_message = e.to_string();
        assert!(
            error_message.contains(msg_part),
            "'{error_message}' does not contain '{msg_part}'"
        );
    } else {
        panic!("expected '{input}' to fail");
    }
}

fn runtime_error(session: &mut Session, input: &str) -> RuntimeError {
    session
        .evaluate(input)
        .unwrap_err()
        .runtime_error()
        .cloned()
        .expect("a runtime error")
}

#[test]
fn test_power_times_time() {
    let mut session = Session::new();
    let value = session.parse("1W * 10s").unwrap();
    assert_eq!(value.pretty_print(), "10J");
    assert!(value.is_constant());

    expect_output_with_session(&mut session, "1W * 10s", "10J");
}

#[test]
fn test_adding_volts_and_amps() {
    let mut session = Session::new();
    assert_eq!(
        runtime_error(&mut session, "5V + 3A"),
        RuntimeError::UnitMismatch(UnitMismatch {
            lhs: Unit::new(BaseUnit::Volts),
            rhs: Unit::new(BaseUnit::Amps),
        })
    );
    expect_failure("5V + 3A", "Unit mismatch between Volts and Amps");
}

#[test]
fn test_variables() {
    let mut session = Session::new();
    expect_output_with_session(&mut session, "x = 5V", "5V");
    expect_output_with_session(&mut session, "x * 2", "10V");

    assert_eq!(
        runtime_error(&mut session, "x = 3A"),
        RuntimeError::Variable(VariableError::UnitConflict {
            name: "x".into(),
            fixed: Unit::new(BaseUnit::Volts),
            assigned: Unit::new(BaseUnit::Amps),
        })
    );

    // the failed assignment left the variable alone
    expect_output_with_session(&mut session, "x", "5V");
    expect_output_with_session(&mut session, "x = x + 1V", "6V");
    expect_output_with_session(&mut session, "x", "6V");
}

#[test]
fn test_division_by_zero() {
    let mut session = Session::new();
    assert!(matches!(
        session.evaluate("10 / 0"),
        Err(EecalcError::ParseError(_))
    ));
    assert!(matches!(
        runtime_error(&mut session, "10 / 0"),
        RuntimeError::Arithmetic(ArithmeticError::DivisionByZero { .. })
    ));
}

#[test]
fn test_exponentiation() {
    expect_output("2^3", "8");
    expect_output("2^-2", "0.25");
    expect_output("(1 + 2)^2", "9");
    expect_output("-2^2", "-4");

    expect_failure("2^0.5", "Exponent must be an integer");
    expect_failure("(2m)^2", "Exponentiation is only defined for scalars");
    expect_failure("2^(1V)", "Exponentiation is only defined for scalars");
}

#[test]
fn test_circuit_quantities() {
    expect_output("supply / load", "3A");
    expect_output("supply * (supply / load)", "36W");
    expect_output("supply * (supply / load) * dt", "18J");
    expect_output("abs(-supply)", "12V");
    expect_output("2R * 3F", "6s");
    expect_output("1R * 2s", "2H");
    expect_output("20m / 4s", "5m/s");
    expect_output("5m/s * 4s", "20m");
    expect_output("10N * 2m", "20J");
    expect_output("5kR * 2mA", "10V");
    expect_output("supply / 4kR", "0.003A");
    expect_output("3ms", "0.003s");

    expect_failure("supply + load", "Unit mismatch between Volts and Ohms");
    expect_failure("supply * load", "Unit mismatch between Volts and Ohms");
    expect_failure("current", "Undefined variable: 'current'");
}

#[test]
fn test_assignments_are_stored_on_evaluation() {
    let mut session = Session::new();
    let value = session.parse("i = 2A").unwrap();
    assert!(session.variables().get("i").is_err());

    let quantity = session.evaluate_value(&value).unwrap();
    assert_eq!(quantity, Quantity::new(2.0, Unit::new(BaseUnit::Amps)));

    let names: Vec<_> = session.variables().iter().map(|v| v.name()).collect();
    assert_eq!(names, ["i"]);
}

#[test]
fn test_trees_observe_later_assignments() {
    let mut session = Session::new();
    session.evaluate("r = 10R").unwrap();
    let value = session.parse("r * 2A").unwrap();

    assert_relative_eq!(session.evaluate_value(&value).unwrap().value(), 20.0);
    session.evaluate("r = 2.5R").unwrap();
    assert_relative_eq!(session.evaluate_value(&value).unwrap().value(), 5.0);
}

#[test]
fn test_sessions_are_independent() {
    let mut first = Session::new();
    let mut second = Session::new();
    first.evaluate("x = 1V").unwrap();

    assert!(second.evaluate("x").is_err());
    expect_output_with_session(&mut second, "x = 1A", "1A");
    expect_output_with_session(&mut first, "x", "1V");
}

#[test]
fn test_unit_algebra_properties() {
    for unit in BaseUnit::all().filter(|u| *u != BaseUnit::Scalar) {
        let (found, _) = find_unit(unit.shorthand(), 0);
        assert_eq!(found, unit);
    }

    for rule in combination_rules() {
        let (a, b, product) = (
            Unit::new(rule.lhs),
            Unit::new(rule.rhs),
            Unit::new(rule.product),
        );
        assert_eq!(a.combine(b, Combination::Multiply), Ok(product));
        assert_eq!(product.combine(a, Combination::Divide), Ok(b));
        assert_eq!(product.combine(b, Combination::Divide), Ok(a));
    }
}

#[test]
fn test_addition_preserves_units() {
    let mut session = Session::new();
    for unit in BaseUnit::all() {
        let shorthand = unit.shorthand();
        let sum = session
            .evaluate(&format!("1{shorthand} + 2{shorthand}"))
            .unwrap();
        assert_eq!(sum.unit(), Unit::new(unit));
        assert_relative_eq!(sum.value(), 3.0);
    }
}
