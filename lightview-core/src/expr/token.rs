//! Expression tokenizer.
//!
//! Words are paths and callee names; they may contain `/` and `.`, so an
//! operator that shares a character with the path alphabet has to be
//! separated from its operands by whitespace (`$/a / 2`, not `$/a/2`).

use serde_json::Value as Json;

use crate::cdomc::parse_cdomc;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Word(String),
    Number(f64),
    Str(String),
    /// An inline `{...}` or `[...]` literal.
    Json(Json),
    LParen,
    RParen,
    Comma,
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    /// Byte offsets into the source.
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Split `source` into tokens. `symbols` are the registered operator
/// symbols, longest first.
pub(crate) fn tokenize(source: &str, symbols: &[String]) -> Result<Vec<Token>> {
    Lexer {
        src: source,
        pos: 0,
        symbols,
        tokens: Vec::new(),
    }
    .run()
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '$' | '.')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '/')
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    symbols: &'a [String],
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    /// True where an operand is expected: at the start, after an operator,
    /// an opening paren or a comma.
    fn operand_position(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Op(_) | TokenKind::LParen | TokenKind::Comma)
        )
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            let start = self.pos;
            let kind = match c {
                '(' => {
                    self.pos += 1;
                    TokenKind::LParen
                }
                ')' => {
                    self.pos += 1;
                    TokenKind::RParen
                }
                ',' => {
                    self.pos += 1;
                    TokenKind::Comma
                }
                '\'' | '"' => TokenKind::Str(self.string(c)?),
                '{' | '[' => TokenKind::Json(self.json()?),
                c if c.is_ascii_digit() => TokenKind::Number(self.number()?),
                '.' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                    TokenKind::Number(self.number()?)
                }
                '-' if self.operand_position()
                    && self.peek_second().is_some_and(|d| d.is_ascii_digit() || d == '.') =>
                {
                    self.pos += 1;
                    TokenKind::Number(-self.number()?)
                }
                c if is_word_start(c) => TokenKind::Word(self.word()),
                _ => self.operator()?,
            };
            self.tokens.push(Token {
                kind,
                start,
                end: self.pos,
            });
        }
        Ok(self.tokens)
    }

    fn string(&mut self, quote: char) -> Result<String> {
        let start = self.pos;
        self.pos += quote.len_utf8();
        let mut out = String::new();
        let mut chars = self.rest().chars();
        while let Some(c) = chars.next() {
            self.pos += c.len_utf8();
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some(escaped) = chars.next() else { break };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
        Err(Error::parse("Unterminated string", start))
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let digits = |pos: &mut usize| {
            while bytes.get(*pos).is_some_and(u8::is_ascii_digit) {
                *pos += 1;
            }
        };

        let mut pos = self.pos;
        digits(&mut pos);
        if bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
            pos += 1;
            digits(&mut pos);
        }
        if matches!(bytes.get(pos), Some(b'e' | b'E')) {
            let mut exp = pos + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                pos = exp;
                digits(&mut pos);
            }
        }

        self.pos = pos;
        self.src[start..pos]
            .parse()
            .map_err(|_| Error::parse("Invalid number", start))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        let mut prev: Option<char> = None;
        while let Some(c) = self.peek() {
            match c {
                '[' => {
                    self.bracket();
                    prev = Some(']');
                    continue;
                }
                // `my-list` is one word, `count-1` is a subtraction.
                '-' if prev.is_some_and(|p| p.is_alphanumeric() || p == '_')
                    && self.peek_second().is_some_and(char::is_alphabetic) => {}
                c if is_word_char(c) => {}
                _ => break,
            }
            self.pos += c.len_utf8();
            prev = Some(c);
        }
        self.src[start..self.pos].to_string()
    }

    /// Consume a `[...]` key segment inside a word.
    fn bracket(&mut self) {
        let mut quote: Option<char> = None;
        for c in self.rest().chars() {
            self.pos += c.len_utf8();
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == ']' => return,
                None => {}
            }
        }
    }

    fn json(&mut self) -> Result<Json> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (offset, c) in self.rest().char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        self.pos = end;
                        return parse_cdomc(&self.src[start..end]).map_err(|err| match err {
                            Error::Parse { message, position } => Error::Parse {
                                message,
                                position: start + position,
                            },
                            other => other,
                        });
                    }
                }
                _ => {}
            }
        }
        Err(Error::parse("Unterminated literal", start))
    }

    fn operator(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let rest = self.rest();

        // A symbol in operand position directly followed by `(` is a callee,
        // as in `/(6, 2)`.
        let symbol = if rest.starts_with("/(") {
            Some("/".to_string())
        } else {
            self.symbols.iter().find(|s| rest.starts_with(s.as_str())).cloned()
        };
        let Some(symbol) = symbol else {
            let c = rest.chars().next().unwrap_or_default();
            return Err(Error::parse(format!("Unexpected character '{c}'"), start));
        };

        self.pos += symbol.len();
        if self.operand_position() && self.peek() == Some('(') {
            return Ok(TokenKind::Word(symbol));
        }
        Ok(TokenKind::Op(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::OperatorTable;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let symbols = OperatorTable::with_defaults().symbols();
        tokenize(source, &symbols)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn word(s: &str) -> TokenKind {
        TokenKind::Word(s.to_string())
    }

    fn op(s: &str) -> TokenKind {
        TokenKind::Op(s.to_string())
    }

    #[test]
    fn calls_and_arguments() {
        assert_eq!(
            kinds("$/add(1, 'a, b', -2.5)"),
            vec![
                word("$/add"),
                TokenKind::LParen,
                TokenKind::Number(1.0),
                TokenKind::Comma,
                TokenKind::Str("a, b".into()),
                TokenKind::Comma,
                TokenKind::Number(-2.5),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn operators_need_whitespace_next_to_paths() {
        assert_eq!(kinds("$/a/b"), vec![word("$/a/b")]);
        assert_eq!(kinds("$/a / 2"), vec![word("$/a"), op("/"), TokenKind::Number(2.0)]);
        assert_eq!(kinds("$/count-1"), vec![word("$/count"), op("-"), TokenKind::Number(1.0)]);
        assert_eq!(kinds("$/my-list"), vec![word("$/my-list")]);
    }

    #[test]
    fn longest_symbol_wins() {
        assert_eq!(kinds("++$/n"), vec![op("++"), word("$/n")]);
        assert_eq!(kinds("a >= 1"), vec![word("a"), op(">="), TokenKind::Number(1.0)]);
    }

    #[test]
    fn symbol_callee() {
        assert_eq!(
            kinds("/(6, 2)"),
            vec![
                word("/"),
                TokenKind::LParen,
                TokenKind::Number(6.0),
                TokenKind::Comma,
                TokenKind::Number(2.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn inline_literals_and_bracket_keys() {
        let tokens = kinds("f({ a: [1, ')'] }, $/files/[report.pdf])");
        assert_eq!(tokens[2], TokenKind::Json(serde_json::json!({ "a": [1, ")"] })));
        assert_eq!(tokens[4], word("$/files/[report.pdf]"));
    }

    #[test]
    fn placeholders_and_explosions_are_words() {
        assert_eq!(kinds("_.age"), vec![word("_.age")]);
        assert_eq!(kinds("items...v"), vec![word("items...v")]);
        assert_eq!(kinds("$event/target"), vec![word("$event/target")]);
    }

    #[test]
    fn errors_point_at_the_offending_text() {
        let symbols = OperatorTable::with_defaults().symbols();
        let err = tokenize("f('open", &symbols).unwrap_err();
        assert!(matches!(err, Error::Parse { position: 2, .. }));
        let err = tokenize("a ; b", &symbols).unwrap_err();
        assert!(matches!(err, Error::Parse { position: 2, .. }));
        // Literal errors are shifted by the literal's byte offset.
        let err = tokenize("f({ é: 1 x })", &symbols).unwrap_err();
        assert!(matches!(err, Error::Parse { position: 10, .. }));
    }
}
