//! Pratt parser over the token stream.
//!
//! Binding powers come from the [`OperatorTable`]: an operator with
//! precedence `p` binds with `2p` on its left and `2p + 1` on its right,
//! which makes infix operators left-associative.

use crate::error::{Error, Result};

use super::ast::Expr;
use super::operators::{Fixity, OperatorTable};
use super::token::{tokenize, Token, TokenKind};
use crate::value::Value;

/// Parse a complete expression.
pub(crate) fn parse(source: &str, operators: &OperatorTable) -> Result<Expr> {
    let tokens = tokenize(source, &operators.symbols())?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        operators,
    };
    let expr = parser.expr(0)?;
    if let Some(token) = parser.peek() {
        return Err(Error::parse("Unexpected token", token.start));
    }
    Ok(expr)
}

fn binding_power(precedence: u8) -> u16 {
    u16::from(precedence) * 2
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    operators: &'a OperatorTable,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// End offset of the last consumed token.
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end)
    }

    fn text(&self, start: usize) -> String {
        self.source[start..self.last_end()].to_string()
    }

    fn expr(&mut self, min_bp: u16) -> Result<Expr> {
        let start = self.peek().map_or(self.source.len(), |t| t.start);
        let mut lhs = self.prefix()?;

        loop {
            let Some(Token {
                kind: TokenKind::Op(symbol),
                start: op_start,
                ..
            }) = self.peek().cloned()
            else {
                break;
            };

            if let Some(def) = self.operators.get(&symbol, Fixity::Postfix) {
                if binding_power(def.precedence) < min_bp {
                    break;
                }
                self.pos += 1;
                lhs = Expr::Call {
                    callee: def.helper,
                    args: vec![lhs],
                    source: self.text(start),
                };
                continue;
            }

            let Some(def) = self.operators.get(&symbol, Fixity::Infix) else {
                return Err(Error::parse(format!("'{symbol}' is not an infix operator"), op_start));
            };
            let lbp = binding_power(def.precedence);
            if lbp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(lbp + 1)?;
            lhs = Expr::Call {
                callee: def.helper,
                args: vec![lhs, rhs],
                source: self.text(start),
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let Some(token) = self.next() else {
            return Err(Error::parse("Unexpected end of expression", self.source.len()));
        };

        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::from(s))),
            TokenKind::Json(json) => Ok(Expr::Literal(Value::from_json(&json))),
            TokenKind::LParen => {
                let inner = self.expr(0)?;
                self.expect_rparen()?;
                Ok(inner)
            }
            TokenKind::Op(symbol) => {
                let Some(def) = self.operators.get(&symbol, Fixity::Prefix) else {
                    return Err(Error::parse(format!("'{symbol}' is not a prefix operator"), token.start));
                };
                let operand = self.expr(binding_power(def.precedence))?;
                Ok(Expr::Call {
                    callee: def.helper,
                    args: vec![operand],
                    source: self.text(token.start),
                })
            }
            TokenKind::Word(word) => {
                if matches!(self.peek(), Some(Token { kind: TokenKind::LParen, .. })) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return Ok(Expr::Call {
                        callee: word,
                        args,
                        source: self.text(token.start),
                    });
                }
                Ok(Expr::from_word(&word))
            }
            TokenKind::RParen | TokenKind::Comma => {
                Err(Error::parse("Expected an operand", token.start))
            }
        }
    }

    /// Arguments after the opening paren, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token { kind: TokenKind::RParen, .. })) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr(0)?);
            match self.next() {
                Some(Token { kind: TokenKind::Comma, .. }) => {}
                Some(Token { kind: TokenKind::RParen, .. }) => return Ok(args),
                Some(token) => return Err(Error::parse("Expected ',' or ')'", token.start)),
                None => return Err(Error::parse("Expected ')'", self.source.len())),
            }
        }
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.next() {
            Some(Token { kind: TokenKind::RParen, .. }) => Ok(()),
            Some(token) => Err(Error::parse("Expected ')'", token.start)),
            None => Err(Error::parse("Expected ')'", self.source.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(source: &str) -> Expr {
        parse(source, &OperatorTable::with_defaults()).unwrap()
    }

    /// Render the tree as nested calls for compact assertions.
    fn render(expr: &Expr) -> String {
        match expr {
            Expr::Literal(value) => value.to_string(),
            Expr::Path(path) => path.clone(),
            Expr::Placeholder { path, .. } => format!("_{path}"),
            Expr::Explosion { base, prop } => format!("{base}...{}", prop.as_deref().unwrap_or("")),
            Expr::Call { callee, args, .. } => {
                let args: Vec<String> = args.iter().map(render).collect();
                format!("{callee}({})", args.join(", "))
            }
        }
    }

    #[test]
    fn nested_calls() {
        let expr = parse_default("$/add(1, mul(2, $/x), 'a, b')");
        assert_eq!(render(&expr), "$/add(1, mul(2, $/x), a, b)");
        let Expr::Call { args, .. } = expr else { panic!("expected a call") };
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(render(&parse_default("1 + 2 * 3")), "add(1, mul(2, 3))");
        assert_eq!(render(&parse_default("10 - 3 - 2")), "sub(sub(10, 3), 2)");
        assert_eq!(render(&parse_default("(1 + 2) * 3")), "mul(add(1, 2), 3)");
        assert_eq!(
            render(&parse_default("$/a > 1 && !$/b")),
            "and(gt($/a, 1), not($/b))"
        );
    }

    #[test]
    fn prefix_and_postfix_increment() {
        assert_eq!(render(&parse_default("++$/count")), "increment($/count)");
        assert_eq!(render(&parse_default("$/count++")), "increment($/count)");
    }

    #[test]
    fn call_source_is_kept() {
        let Expr::Call { source, .. } = parse_default("  missing(1,  2) ") else {
            panic!("expected a call");
        };
        assert_eq!(source, "missing(1,  2)");

        let Expr::Call { source, .. } = parse_default("$/a + 1") else {
            panic!("expected a call");
        };
        assert_eq!(source, "$/a + 1");
    }

    #[test]
    fn empty_argument_lists() {
        assert_eq!(render(&parse_default("now()")), "now()");
    }

    #[test]
    fn malformed_input() {
        let ops = OperatorTable::with_defaults();
        assert!(matches!(parse("add(1, 2", &ops), Err(Error::Parse { .. })));
        assert!(matches!(parse("hello world", &ops), Err(Error::Parse { position: 6, .. })));
        assert!(matches!(parse("1 +", &ops), Err(Error::Parse { .. })));
        assert!(matches!(parse("", &ops), Err(Error::Parse { position: 0, .. })));
    }
}
