use crate::span::Span;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenizerErrorKind {
    #[error("Unexpected symbol: '{character}'")]
    UnexpectedSymbol { character: char },

    #[error("Cannot resume scanning at byte {position}, it is inside a character")]
    NotACharBoundary { position: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}")]
pub struct TokenizerError {
    pub kind: TokenizerErrorKind,
    pub span: Span,
}

type Result<T, E = TokenizerError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A numeric literal, possibly with a leading `-` and a decimal point.
    Number,
    /// An identifier or unit shorthand candidate.
    Word,
    /// One of `+ - * / ^ ( ) = ,`.
    Operator,
    EndOfInput,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Number => "Number",
            TokenKind::Word => "Word",
            TokenKind::Operator => "Operator",
            TokenKind::EndOfInput => "EOF",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Span,
}

impl Token<'_> {
    pub fn is_operator(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.lexeme == symbol
    }
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:?}", self.kind, self.lexeme)
    }
}

fn is_single_character_operator(c: char) -> bool {
    matches!(c, '+' | '*' | '/' | '^' | '(' | ')' | '=' | ',')
}

/// Scans a single line of input into [`Token`]s.
///
/// The tokenizer holds no cursor of its own. Every call to [`Tokenizer::next_token`]
/// receives the byte position to resume from and hands back the position right
/// after the token it produced, so re-scanning from any earlier position is always
/// possible.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer<'a> {
    input: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Tokenizer { input }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn next_token(&self, position: usize) -> Result<(Token<'a>, usize)> {
        let position = position.min(self.input.len());
        let Some(rest) = self.input.get(position..) else {
            return Err(TokenizerError {
                kind: TokenizerErrorKind::NotACharBoundary { position },
                span: Span::new(position, position),
            });
        };
        let start = position + (rest.len() - rest.trim_start().len());

        if start >= self.input.len() {
            let end = self.input.len();
            return Ok((
                Token {
                    kind: TokenKind::EndOfInput,
                    lexeme: "",
                    span: Span::new(end, end),
                },
                end,
            ));
        }

        let mut kind = None;
        let mut end = start;
        let mut chars = self.input[start..].char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            let next = chars.peek().map(|&(_, c)| c);

            let char_kind = if c.is_ascii_digit() {
                TokenKind::Number
            } else if c == '-' {
                if kind.is_none() && next.is_some_and(|n| n.is_ascii_digit() || n == '.') {
                    TokenKind::Number
                } else {
                    TokenKind::Operator
                }
            } else if c == '.' && kind == Some(TokenKind::Number) {
                TokenKind::Number
            } else if is_single_character_operator(c) {
                TokenKind::Operator
            } else if c.is_alphabetic() {
                TokenKind::Word
            } else if c.is_whitespace() {
                break;
            } else {
                return Err(TokenizerError {
                    kind: TokenizerErrorKind::UnexpectedSymbol { character: c },
                    span: Span::single_character(start + offset, c),
                });
            };

            match kind {
                None => {
                    kind = Some(char_kind);
                    end = start + offset + c.len_utf8();
                    if char_kind == TokenKind::Operator {
                        break;
                    }
                }
                // A change of type ends the token. The character is left for the next call.
                Some(current) if current != char_kind => break,
                Some(_) => {
                    end = start + offset + c.len_utf8();
                }
            }
        }

        let kind = kind.unwrap_or(TokenKind::EndOfInput);

        Ok((
            Token {
                kind,
                lexeme: &self.input[start..end],
                span: Span::new(start, end),
            },
            end,
        ))
    }

    /// All tokens of the input in order, without the terminating [`TokenKind::EndOfInput`].
    pub fn extract_tokens(&self) -> Result<Vec<Token<'a>>> {
        let mut tokens = vec![];
        let mut position = 0;
        loop {
            let (token, next_position) = self.next_token(position)?;
            if token.kind == TokenKind::EndOfInput {
                break;
            }
            tokens.push(token);
            position = next_position;
        }
        Ok(tokens)
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    Tokenizer::new(input).extract_tokens()
}

#[cfg(test)]
fn tokenize_reduced(input: &str) -> Result<Vec<(String, TokenKind, (usize, usize))>, String> {
    Ok(tokenize(input)
        .map_err(|e| format!("Error at {}: `{e}`", e.span))?
        .iter()
        .map(|token| {
            (
                token.lexeme.to_string(),
                token.kind,
                (token.span.start, token.span.end),
            )
        })
        .collect())
}

#[cfg(test)]
fn tokenize_reduced_pretty(input: &str) -> Result<String, String> {
    use std::fmt::Write;
    let mut ret = String::new();
    for (lexeme, kind, pos) in tokenize_reduced(input)? {
        writeln!(ret, "{lexeme:?}, {kind:?}, {pos:?}").unwrap();
    }
    Ok(ret)
}

#[test]
fn test_tokenize_basic() {
    use TokenKind::*;

    assert_eq!(
        tokenize_reduced("1W * 10s").unwrap(),
        [
            ("1".to_string(), Number, (0, 1)),
            ("W".to_string(), Word, (1, 2)),
            ("*".to_string(), Operator, (3, 4)),
            ("10".to_string(), Number, (5, 7)),
            ("s".to_string(), Word, (7, 8)),
        ]
    );

    assert_eq!(
        tokenize_reduced("  12 + 34  ").unwrap(),
        [
            ("12".to_string(), Number, (2, 4)),
            ("+".to_string(), Operator, (5, 6)),
            ("34".to_string(), Number, (7, 9)),
        ]
    );

    assert_eq!(
        tokenize_reduced("(x)").unwrap(),
        [
            ("(".to_string(), Operator, (0, 1)),
            ("x".to_string(), Word, (1, 2)),
            (")".to_string(), Operator, (2, 3)),
        ]
    );

    assert!(tokenize_reduced("").unwrap().is_empty());
    assert!(tokenize_reduced("   ").unwrap().is_empty());
}

#[test]
fn test_tokenize_numbers() {
    use TokenKind::*;

    assert_eq!(
        tokenize_reduced("3.25").unwrap(),
        [("3.25".to_string(), Number, (0, 4))]
    );

    // A leading minus directly followed by a digit or '.' is part of the literal ...
    assert_eq!(
        tokenize_reduced("-3 -.5").unwrap(),
        [
            ("-3".to_string(), Number, (0, 2)),
            ("-.5".to_string(), Number, (3, 6)),
        ]
    );

    // ... but a minus in the middle of a number starts a new token.
    assert_eq!(
        tokenize_reduced("5-3").unwrap(),
        [
            ("5".to_string(), Number, (0, 1)),
            ("-3".to_string(), Number, (1, 3)),
        ]
    );

    assert_eq!(
        tokenize_reduced("5 - x").unwrap(),
        [
            ("5".to_string(), Number, (0, 1)),
            ("-".to_string(), Operator, (2, 3)),
            ("x".to_string(), Word, (4, 5)),
        ]
    );

    // Malformed literals are a parser concern.
    assert_eq!(
        tokenize_reduced("1.2.3").unwrap(),
        [("1.2.3".to_string(), Number, (0, 5))]
    );
}

#[test]
fn test_tokenize_type_changes() {
    insta::assert_snapshot!(
        tokenize_reduced_pretty("x2y").unwrap(),
        @r###"
    "x", Word, (0, 1)
    "2", Number, (1, 2)
    "y", Word, (2, 3)
    "###
    );

    insta::assert_snapshot!(
        tokenize_reduced_pretty("1m/s").unwrap(),
        @r###"
    "1", Number, (0, 1)
    "m", Word, (1, 2)
    "/", Operator, (2, 3)
    "s", Word, (3, 4)
    "###
    );

    insta::assert_snapshot!(
        tokenize_reduced_pretty("x=2^3").unwrap(),
        @r###"
    "x", Word, (0, 1)
    "=", Operator, (1, 2)
    "2", Number, (2, 3)
    "^", Operator, (3, 4)
    "3", Number, (4, 5)
    "###
    );

    // Operators are always single characters.
    insta::assert_snapshot!(
        tokenize_reduced_pretty("((").unwrap(),
        @r###"
    "(", Operator, (0, 1)
    "(", Operator, (1, 2)
    "###
    );
}

#[test]
fn test_tokenize_errors() {
    insta::assert_snapshot!(
        tokenize_reduced_pretty("5 $").unwrap_err(),
        @"Error at 2..3: `Unexpected symbol: '$'`"
    );

    insta::assert_snapshot!(
        tokenize_reduced_pretty(".5").unwrap_err(),
        @"Error at 0..1: `Unexpected symbol: '.'`"
    );

    insta::assert_snapshot!(
        tokenize_reduced_pretty("x.y").unwrap_err(),
        @"Error at 1..2: `Unexpected symbol: '.'`"
    );

    insta::assert_snapshot!(
        tokenize_reduced_pretty("a_b").unwrap_err(),
        @"Error at 1..2: `Unexpected symbol: '_'`"
    );
}

#[test]
fn test_end_of_input_is_idempotent() {
    let tokenizer = Tokenizer::new("7 ");

    let (token, position) = tokenizer.next_token(0).unwrap();
    assert_eq!(token.lexeme, "7");
    assert_eq!(position, 1);

    let (token, position) = tokenizer.next_token(position).unwrap();
    assert_eq!(token.kind, TokenKind::EndOfInput);
    assert_eq!(position, 2);

    for _ in 0..3 {
        let (again, again_position) = tokenizer.next_token(position).unwrap();
        assert_eq!(again, token);
        assert_eq!(again_position, position);
    }
}

#[test]
fn test_restart_from_earlier_position() {
    let tokenizer = Tokenizer::new("10V + 2V");

    let (first, after_first) = tokenizer.next_token(0).unwrap();
    let (second, _) = tokenizer.next_token(after_first).unwrap();
    assert_eq!((first.lexeme, second.lexeme), ("10", "V"));

    let (replayed, _) = tokenizer.next_token(after_first).unwrap();
    assert_eq!(replayed, second);
}

#[test]
fn test_positions_inside_characters_and_past_the_end() {
    let tokenizer = Tokenizer::new("Ω5");

    assert_eq!(
        tokenizer.next_token(1).unwrap_err(),
        TokenizerError {
            kind: TokenizerErrorKind::NotACharBoundary { position: 1 },
            span: Span::new(1, 1),
        }
    );

    let (token, position) = tokenizer.next_token(2).unwrap();
    assert_eq!((token.lexeme, token.kind, position), ("5", TokenKind::Number, 3));

    let (token, position) = tokenizer.next_token(10).unwrap();
    assert_eq!((token.kind, position), (TokenKind::EndOfInput, 3));
}
