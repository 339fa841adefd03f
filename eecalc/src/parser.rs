//! EECalc Parser
//!
//! Grammar:
//! ```txt
//! input       ::=   assignment | expression
//! assignment  ::=   word "=" expression
//!
//! expression  ::=   term
//! term        ::=   factor ( ( "+" | "-" ) factor ) *
//! factor      ::=   unary ( ( "*" | "/" ) unary ) *
//! unary       ::=   ( "-" unary ) | power
//! power       ::=   primary ( "^" unary ) ?      (right-associative: 2^3^2 == 2^(3^2))
//! primary     ::=   number unit ? | "abs" "(" expression ")" | word | unit | "(" expression ")"
//!
//! unit        ::=   the longest run of adjacent words and operators that spells a unit
//!                   shorthand, optionally behind a metric prefix ("mA", "4.7kR")
//! number      ::=   [0-9]+ ( "." [0-9]* ) *
//! word        ::=   alphabetic +
//! ```
//!
//! The tokenizer attaches a leading `-` to a following number. Those tokens are split
//! back into a `-` operator and an unsigned number before parsing, so that `5-3` is a
//! subtraction and `-2^2` is `-(2^2)`.
//!
//! Every node is unit-checked as soon as it is built, and nodes with constant operands
//! are folded. Errors raised while doing so are reported at the operator's span.

use compact_str::{format_compact, CompactString};
use thiserror::Error;

use crate::ast::{BinaryOperator, RuntimeError, UnaryOperator, Value, VariableRef};
use crate::span::Span;
use crate::tokenizer::{tokenize, Token, TokenKind, TokenizerError, TokenizerErrorKind};
use crate::unit::{find_prefixed_unit, Unit, UnitMatch};
use crate::variable_bank::{VariableBank, VariableError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error(transparent)]
    TokenizerError(TokenizerErrorKind),

    #[error("Unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: CompactString,
        expected: &'static str,
    },

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(CompactString),

    #[error(transparent)]
    RuntimeError(RuntimeError),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    fn new(kind: ParseErrorKind, span: Span) -> Self {
        ParseError { kind, span }
    }

    fn unexpected(token: &Token, expected: &'static str) -> Self {
        let found = if token.kind == TokenKind::EndOfInput {
            CompactString::from("end of input")
        } else {
            format_compact!("'{}'", token.lexeme)
        };
        ParseError::new(ParseErrorKind::UnexpectedToken { found, expected }, token.span)
    }

    fn runtime(error: impl Into<RuntimeError>, span: Span) -> Self {
        ParseError::new(ParseErrorKind::RuntimeError(error.into()), span)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// Splits `-3`-style number tokens into a `-` operator and the unsigned literal.
fn split_signed_numbers<'a>(tokens: Vec<Token<'a>>) -> Vec<Token<'a>> {
    let mut result = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token.lexeme.strip_prefix('-') {
            Some(unsigned) if token.kind == TokenKind::Number => {
                let split = token.span.start + 1;
                result.push(Token {
                    kind: TokenKind::Operator,
                    lexeme: "-",
                    span: Span::new(token.span.start, split),
                });
                result.push(Token {
                    kind: TokenKind::Number,
                    lexeme: unsigned,
                    span: Span::new(split, token.span.end),
                });
            }
            _ => result.push(token),
        }
    }
    result
}

pub struct Parser<'a, 'b> {
    tokens: Vec<Token<'a>>,
    current: usize,
    bank: &'b mut VariableBank,
}

impl<'a, 'b> Parser<'a, 'b> {
    /// `tokens` must not contain the end-of-input token, it is appended here.
    pub fn new(input: &'a str, tokens: Vec<Token<'a>>, bank: &'b mut VariableBank) -> Self {
        let mut tokens = split_signed_numbers(tokens);
        tokens.push(Token {
            kind: TokenKind::EndOfInput,
            lexeme: "",
            span: Span::new(input.len(), input.len()),
        });

        Parser {
            tokens,
            current: 0,
            bank,
        }
    }

    pub fn parse(&mut self) -> Result<Value> {
        let value = if self.peek().kind == TokenKind::Word && self.peek_nth(1).is_operator("=") {
            self.assignment()?
        } else {
            self.expression()?
        };

        if self.is_at_end() {
            Ok(value)
        } else {
            Err(ParseError::unexpected(
                &self.peek(),
                "an operator or the end of input",
            ))
        }
    }

    fn assignment(&mut self) -> Result<Value> {
        let name = self.peek();
        self.advance();
        let equal_sign = self.peek();
        self.advance();

        let rhs = self.expression()?;

        let id = self
            .bank
            .declare(name.lexeme, rhs.unit())
            .map_err(|e| ParseError::runtime(e, name.span.extend(&equal_sign.span)))?;

        let target = VariableRef {
            name: name.lexeme.into(),
            id,
            unit: rhs.unit(),
        };
        Ok(Value::assignment(target, rhs))
    }

    pub fn expression(&mut self) -> Result<Value> {
        self.term()
    }

    /// Helper function to parse left-associative binary operations
    /// - arg `op_symbols` specifies the operator symbols of the current level
    /// - arg `op` maps a matched symbol to its operator
    /// - arg `next_parser` parses the operands between the symbols
    fn parse_binop(
        &mut self,
        op_symbols: &[&str],
        op: impl Fn(&str) -> BinaryOperator,
        next_parser: impl Fn(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        let mut value = next_parser(self)?;
        while let Some(matched) = self.match_any(op_symbols) {
            let rhs = next_parser(self)?;
            value = Value::binary(op(matched.lexeme), value, rhs)
                .map_err(|e| ParseError::runtime(e, matched.span))?;
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Value> {
        self.parse_binop(
            &["+", "-"],
            |symbol| match symbol {
                "+" => BinaryOperator::Add,
                _ => BinaryOperator::Subtract,
            },
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Value> {
        self.parse_binop(
            &["*", "/"],
            |symbol| match symbol {
                "*" => BinaryOperator::Multiply,
                _ => BinaryOperator::Divide,
            },
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Value> {
        if self.match_exact("-").is_some() {
            let operand = self.unary()?;
            Ok(Value::unary(UnaryOperator::Negate, operand))
        } else {
            self.power()
        }
    }

    /// `^` is right-associative and binds tighter than a leading minus.
    fn power(&mut self) -> Result<Value> {
        let base = self.primary()?;
        if let Some(caret) = self.match_exact("^") {
            let exponent = self.unary()?;
            Value::binary(BinaryOperator::Power, base, exponent)
                .map_err(|e| ParseError::runtime(e, caret.span))
        } else {
            Ok(base)
        }
    }

    fn primary(&mut self) -> Result<Value> {
        let token = self.peek();

        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value: f64 = token.lexeme.parse().map_err(|_| {
                    ParseError::new(ParseErrorKind::InvalidNumber(token.lexeme.into()), token.span)
                })?;
                match self.unit_suffix() {
                    Some(suffix) => Ok(Value::constant(
                        suffix.scale(value),
                        Unit::new(suffix.base_unit),
                    )),
                    None => Ok(Value::constant(value, Unit::scalar())),
                }
            }
            TokenKind::Word => self.word(),
            TokenKind::Operator if token.lexeme == "(" => {
                self.advance();
                let value = self.expression()?;
                if self.match_exact(")").is_none() {
                    return Err(ParseError::unexpected(&self.peek(), "')'"));
                }
                Ok(value)
            }
            TokenKind::Operator if matches!(token.lexeme, "+" | "*" | "/" | "^") => Err(
                ParseError::unexpected(&token, "an operand ('-' is the only unary operator)"),
            ),
            _ => Err(ParseError::unexpected(
                &token,
                "a number, a variable, a unit or '('",
            )),
        }
    }

    fn word(&mut self) -> Result<Value> {
        let token = self.peek();
        let is_call = self.peek_nth(1).is_operator("(");

        if token.lexeme == "abs" && is_call {
            self.advance();
            self.advance();
            let operand = self.expression()?;
            if self.match_exact(")").is_none() {
                return Err(ParseError::unexpected(&self.peek(), "')'"));
            }
            return Ok(Value::unary(UnaryOperator::AbsoluteValue, operand));
        }

        let bound_unit = self.bank.get(token.lexeme).ok().map(|entry| entry.unit());
        if let Some(unit) = bound_unit {
            let id = self
                .bank
                .id_of(token.lexeme)
                .map_err(|e| ParseError::runtime(e, token.span))?;
            self.advance();
            return Ok(Value::Variable(VariableRef {
                name: token.lexeme.into(),
                id,
                unit,
            }));
        }

        if let Some(suffix) = self.unit_suffix() {
            return Ok(Value::constant(
                suffix.scale(1.0),
                Unit::new(suffix.base_unit),
            ));
        }

        if is_call {
            Err(ParseError::unexpected(
                &token,
                "'abs', the only supported function",
            ))
        } else {
            Err(ParseError::runtime(
                VariableError::Undefined(token.lexeme.into()),
                token.span,
            ))
        }
    }

    /// Consumes the tokens that spell a unit shorthand, starting at the current token.
    ///
    /// The first token may be separated from what precedes it by whitespace, the rest
    /// have to be adjacent. The longest confirmed match wins; tokens that only formed
    /// a partial match are left in place.
    fn unit_suffix(&mut self) -> Option<UnitMatch> {
        let mut candidate = CompactString::default();
        let mut confirmed = None;
        let mut previous: Option<Token> = None;

        for (index, token) in self.tokens.iter().enumerate().skip(self.current) {
            if !matches!(token.kind, TokenKind::Word | TokenKind::Operator) {
                break;
            }
            if previous.is_some_and(|p| p.span.end != token.span.start) {
                break;
            }

            let already_matched = candidate.len();
            candidate.push_str(token.lexeme);

            let (found, longer_match_available) =
                find_prefixed_unit(&candidate, already_matched);
            if let Some(found) = found {
                confirmed = Some((found, index + 1));
            }
            if !longer_match_available {
                break;
            }
            previous = Some(*token);
        }

        let (suffix, next) = confirmed?;
        self.current = next;
        Some(suffix)
    }

    fn match_exact(&mut self, symbol: &str) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_operator(symbol) {
            self.advance();
            Some(token)
        } else {
            None
        }
    }

    fn match_any(&mut self, symbols: &[&str]) -> Option<Token<'a>> {
        symbols.iter().find_map(|symbol| self.match_exact(symbol))
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn peek(&self) -> Token<'a> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Token<'a> {
        let last = self.tokens.len() - 1;
        self.tokens[std::cmp::min(self.current + n, last)]
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfInput
    }
}

/// Tokenizes and parses a single line of input into a unit-checked value tree.
///
/// Variables are resolved against `bank`. An assignment reserves its target in the
/// bank, the value is only stored once the returned tree is evaluated.
pub fn parse(input: &str, bank: &mut VariableBank) -> Result<Value> {
    let tokens = tokenize(input).map_err(|TokenizerError { kind, span }| {
        ParseError::new(ParseErrorKind::TokenizerError(kind), span)
    })?;

    Parser::new(input, tokens, bank).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{binop, constant, unop, ArithmeticError};
    use crate::pretty_print::PrettyPrint;
    use crate::quantity::Quantity;
    use crate::unit::{BaseUnit, UnitMismatch};

    use approx::assert_relative_eq;

    fn bank_with_x() -> VariableBank {
        let mut bank = VariableBank::new();
        bank.assign("x", Quantity::new(5.0, Unit::new(BaseUnit::Volts)))
            .unwrap();
        bank
    }

    fn variable(bank: &VariableBank, name: &str) -> Value {
        Value::Variable(VariableRef {
            name: name.into(),
            id: bank.id_of(name).unwrap(),
            unit: bank.get(name).unwrap().unit(),
        })
    }

    #[track_caller]
    fn parse_as(inputs: &[&str], expected: Value) {
        for input in inputs {
            let mut bank = bank_with_x();
            let value = parse(input, &mut bank).expect("parse error");
            assert_eq!(value, expected, "Failed on {input}");
        }
    }

    #[track_caller]
    fn should_fail(inputs: &[&str]) {
        for input in inputs {
            let mut bank = bank_with_x();
            if let Ok(v) = parse(input, &mut bank) {
                panic!("Expected parse failure on {input:?} but got: {v:#?}")
            }
        }
    }

    #[track_caller]
    fn should_fail_with(inputs: &[&str], error_kind: ParseErrorKind) {
        for input in inputs {
            let mut bank = bank_with_x();
            match parse(input, &mut bank) {
                Err(error) => assert_eq!(error.kind, error_kind, "Failed on {input}"),
                Ok(v) => panic!("Expected parse failure on {input:?} but got: {v:#?}"),
            }
        }
    }

    #[track_caller]
    fn snap_error(input: &str) -> String {
        let mut bank = bank_with_x();
        match parse(input, &mut bank) {
            Err(error) => format!("{} at {}", error, error.span),
            Ok(v) => panic!("Expected parse failure on {input:?} but got: {v:#?}"),
        }
    }

    #[test]
    fn numbers_with_unit_suffixes() {
        parse_as(&["1", "1.0", " 1 "], constant!(1.0));
        parse_as(&["0.5", "00.50"], constant!(0.5));
        parse_as(&["5V", "5 V", "5.0V"], constant!(5.0, Volts));
        parse_as(&["3A"], constant!(3.0, Amps));
        parse_as(&["1m/s", "1 m/s"], constant!(1.0, MetersPerSecond));
        parse_as(&["2m"], constant!(2.0, Meters));
    }

    #[test]
    fn metric_prefixes() {
        parse_as(&["3mA", "3 mA"], constant!(0.003, Amps));
        parse_as(&["10uF", "10µF"], constant!(0.00001, Farads));
        parse_as(&["2kR"], constant!(2000.0, Ohms));
        parse_as(&["3ms"], constant!(0.003, Seconds));
        parse_as(&["5mm/s"], constant!(0.005, MetersPerSecond));
        parse_as(&["mV"], constant!(0.001, Volts));

        // shorthands are read without a prefix whenever possible
        parse_as(&["3m"], constant!(3.0, Meters));
        parse_as(&["3m/s"], constant!(3.0, MetersPerSecond));

        let mut bank = VariableBank::new();
        let value = parse("5kR * 2mA", &mut bank).unwrap();
        assert_relative_eq!(value.evaluate(&mut bank).unwrap().value(), 10.0);
        assert_eq!(value.unit(), Unit::new(BaseUnit::Volts));

        insta::assert_snapshot!(snap_error("3kx"), @"Unexpected 'kx', expected an operator or the end of input at 1..3");
    }

    #[test]
    fn suffix_lookahead_falls_back_to_shorter_match() {
        // 'm/' is only a partial match, the division stays in place
        parse_as(&["4m/2"], constant!(2.0, Meters));
        parse_as(&["6m / 2s"], constant!(3.0, MetersPerSecond));
        parse_as(&["6m/ 2s"], constant!(3.0, MetersPerSecond));
    }

    #[test]
    fn bare_unit_words() {
        parse_as(&["V", "(V)"], constant!(1.0, Volts));
        parse_as(&["m/s"], constant!(1.0, MetersPerSecond));
        parse_as(&["10 * s"], constant!(10.0, Seconds));
    }

    #[test]
    fn constant_folding() {
        parse_as(&["1W * 10s", "10s * 1W"], constant!(10.0, Joules));
        parse_as(&["10V / 2R"], constant!(5.0, Amps));
        parse_as(&["2R * 3A"], constant!(6.0, Volts));
        parse_as(&["12J / 4N"], constant!(3.0, Meters));
        parse_as(&["2^3"], constant!(8.0));
        parse_as(&["abs(2V - 5V)"], constant!(3.0, Volts));
    }

    #[test]
    fn precedence_and_associativity() {
        parse_as(&["2 + 3 * 4", "2 + (3 * 4)"], constant!(14.0));
        parse_as(&["(2 + 3) * 4"], constant!(20.0));
        parse_as(&["10 - 2 - 3"], constant!(5.0));
        parse_as(&["8 / 2 / 2"], constant!(2.0));
        parse_as(&["2^3^2"], constant!(512.0));
        parse_as(&["2^-1"], constant!(0.5));
        parse_as(&["-2^2", "-(2^2)"], constant!(-4.0));
        parse_as(&["(-2)^2"], constant!(4.0));
        parse_as(&["2 * -3", "-2 * 3", "--2 * -3"], constant!(-6.0));
    }

    #[test]
    fn signed_literals_after_operands() {
        parse_as(&["5-3", "5 -3", "5 - 3", "5- 3"], constant!(2.0));
        parse_as(&["-3"], constant!(-3.0));
        parse_as(&["-.5V"], constant!(-0.5, Volts));
    }

    #[test]
    fn variables() {
        let bank = bank_with_x();
        let x = variable(&bank, "x");

        parse_as(&["x"], x.clone());
        parse_as(&["x * 2"], binop!(x.clone(), Multiply, constant!(2.0), Volts));
        parse_as(&["x / 1A"], binop!(x.clone(), Divide, constant!(1.0, Amps), Ohms));
        parse_as(&["-x"], unop!(Negate, x.clone()));
        parse_as(&["abs(x)"], unop!(AbsoluteValue, x));
    }

    #[test]
    fn assignment() {
        let mut bank = VariableBank::new();
        let value = parse("y = 2V * 3", &mut bank).unwrap();
        assert_eq!(value.unit(), Unit::new(BaseUnit::Volts));
        assert_eq!(value.pretty_print(), "y = 6V");

        // nothing is stored before the tree is evaluated
        assert!(bank.get("y").is_err());
        value.evaluate(&mut bank).unwrap();
        assert_eq!(
            bank.get("y").unwrap().quantity(),
            Some(Quantity::new(6.0, Unit::new(BaseUnit::Volts)))
        );

        let value = parse("y = y + 1V", &mut bank).unwrap();
        assert_eq!(value.pretty_print(), "y = (y + 1V)");
    }

    #[test]
    fn assignment_with_conflicting_unit() {
        let error = parse("x = 3A", &mut bank_with_x()).unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::RuntimeError(RuntimeError::Variable(VariableError::UnitConflict {
                name: "x".into(),
                fixed: Unit::new(BaseUnit::Volts),
                assigned: Unit::new(BaseUnit::Amps),
            }))
        );
        assert_eq!(error.span, Span::new(0, 3));
    }

    #[test]
    fn unit_mismatch_is_reported_at_the_operator() {
        let error = parse("5V + 3A", &mut VariableBank::new()).unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::RuntimeError(RuntimeError::UnitMismatch(UnitMismatch {
                lhs: Unit::new(BaseUnit::Volts),
                rhs: Unit::new(BaseUnit::Amps),
            }))
        );
        assert_eq!(error.span, Span::new(3, 4));

        should_fail(&["x + 1A", "x * x", "1m/s * 1m/s", "2m^2", "V^2"]);
    }

    #[test]
    fn arithmetic_errors_while_folding() {
        should_fail_with(
            &["2^0.5"],
            ParseErrorKind::RuntimeError(ArithmeticError::NonIntegerExponent(0.5).into()),
        );

        insta::assert_snapshot!(snap_error("10 / 0"), @"Division by zero: 10 / 0 at 3..4");
        insta::assert_snapshot!(snap_error("1 / (2 - 2)"), @"Division by zero: 1 / 0 at 2..3");
    }

    #[test]
    fn undefined_variables() {
        should_fail_with(
            &["y", "2 * y", "y = y"],
            ParseErrorKind::RuntimeError(VariableError::Undefined("y".into()).into()),
        );
        insta::assert_snapshot!(snap_error("1V + foo"), @"Undefined variable: 'foo' at 5..8");
    }

    #[test]
    fn unexpected_tokens() {
        insta::assert_snapshot!(snap_error("+5"), @"Unexpected '+', expected an operand ('-' is the only unary operator) at 0..1");
        insta::assert_snapshot!(snap_error("5 5"), @"Unexpected '5', expected an operator or the end of input at 2..3");
        insta::assert_snapshot!(snap_error("5Vx"), @"Unexpected 'Vx', expected an operator or the end of input at 1..3");
        insta::assert_snapshot!(snap_error("2 = 3"), @"Unexpected '=', expected an operator or the end of input at 2..3");
        insta::assert_snapshot!(snap_error("(1 + 2"), @"Unexpected end of input, expected ')' at 6..6");
        insta::assert_snapshot!(snap_error("1 +"), @"Unexpected end of input, expected a number, a variable, a unit or '(' at 3..3");
        insta::assert_snapshot!(snap_error("sin(3)"), @"Unexpected 'sin', expected 'abs', the only supported function at 0..3");

        should_fail(&["", "()", "1 * * 2", "x = y = 3", "1,2", "abs 3", "abs(1"]);
    }

    #[test]
    fn invalid_input() {
        should_fail_with(
            &["1.2.3"],
            ParseErrorKind::InvalidNumber("1.2.3".into()),
        );
        insta::assert_snapshot!(snap_error("5 $"), @"Unexpected symbol: '$' at 2..3");
    }
}
