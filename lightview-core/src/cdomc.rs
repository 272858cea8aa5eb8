//! cDOMC: relaxed JSON for hand-written markup.
//!
//! Accepted on top of JSON:
//!
//! - `//` line comments and `/* */` block comments;
//! - unquoted keys and single-quoted strings;
//! - trailing commas;
//! - bare words as values. A bare word starting with `$` is kept verbatim
//!   as a string, parentheses, brackets and quotes included, so that
//!   `{ total: $/sum($/a, $/b) }` yields the string `"$/sum($/a, $/b)"`
//!   for the expression layer to pick up later. Other bare words end at
//!   whitespace and are numbers, `true`/`false`/`null`, or strings.
//!
//! Error positions are byte offsets into the input.
//!
//! ```rust
//! use lightview_core::parse_cdomc;
//! use serde_json::json;
//!
//! let value = parse_cdomc("{ x: 1, y: [1, 2, 3], /* note */ a: $/foo/bar }").unwrap();
//! assert_eq!(value, json!({ "x": 1, "y": [1, 2, 3], "a": "$/foo/bar" }));
//! ```

use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};

/// Parse cDOMC text into JSON.
pub fn parse_cdomc(text: &str) -> Result<Json> {
    let mut parser = Parser::new(text);
    parser.skip_trivia();
    let value = parser.value()?;
    parser.skip_trivia();
    if parser.pos < parser.chars.len() {
        return Err(Error::parse("Unexpected trailing characters", parser.offset()));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    /// Byte offset of each char, plus the input length.
    offsets: Vec<usize>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        let (mut offsets, chars): (Vec<usize>, Vec<char>) = text.char_indices().unzip();
        offsets.push(text.len());
        Self {
            chars,
            offsets,
            pos: 0,
        }
    }

    /// Byte offset of the current char.
    fn offset(&self) -> usize {
        self.byte_offset(self.pos)
    }

    fn byte_offset(&self, pos: usize) -> usize {
        self.offsets
            .get(pos)
            .or(self.offsets.last())
            .copied()
            .unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_comment(&self) -> bool {
        self.peek() == Some('/') && matches!(self.peek_at(1), Some('/' | '*'))
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            if !self.starts_comment() {
                return;
            }
            if self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                self.pos += 2;
                while self.pos < self.chars.len()
                    && !(self.peek() == Some('*') && self.peek_at(1) == Some('/'))
                {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.chars.len());
            }
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_trivia();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::parse(format!("Expected '{c}'"), self.offset()))
        }
    }

    fn value(&mut self) -> Result<Json> {
        self.skip_trivia();
        match self.peek() {
            None => Err(Error::parse("Unexpected end of input", self.offset())),
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some(quote @ ('"' | '\'')) => self.string(quote).map(Json::String),
            Some(_) => self.word(),
        }
    }

    fn object(&mut self) -> Result<Json> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Json::Object(map));
                }
                None => return Err(Error::parse("Expected '}'", self.offset())),
                _ => {}
            }

            let key = self.key()?;
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_trivia();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                None => return Err(Error::parse("Expected '}'", self.offset())),
                _ => return Err(Error::parse("Expected ',' or '}'", self.offset())),
            }
        }
    }

    fn key(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.string(quote),
            _ => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && !matches!(c, ':' | ',' | '{' | '}' | '[' | ']'))
                {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(Error::parse("Expected a key", self.offset()));
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
        }
    }

    fn array(&mut self) -> Result<Json> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(Json::Array(items));
                }
                None => return Err(Error::parse("Expected ']'", self.offset())),
                _ => {}
            }

            items.push(self.value()?);

            self.skip_trivia();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                None => return Err(Error::parse("Expected ']'", self.offset())),
                _ => return Err(Error::parse("Expected ',' or ']'", self.offset())),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(Error::parse("Unterminated string", self.byte_offset(start)));
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(Error::parse("Unterminated string", self.byte_offset(start)));
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => out.push(self.unicode_escape()?),
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let end = self.pos + 4;
        if end > self.chars.len() {
            return Err(Error::parse("Invalid unicode escape", self.offset()));
        }
        let hex: String = self.chars[self.pos..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16)
            .map_err(|_| Error::parse("Invalid unicode escape", self.offset()))?;
        self.pos = end;
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// A bare word. Brackets and quotes inside the word are balanced, so
    /// calls with several arguments stay in one piece.
    ///
    /// A `$` word runs to the next top-level `,`, `}`, `]` or `:`, so that
    /// `$/count + 1` stays one expression. Any other word also ends at
    /// top-level whitespace.
    fn word(&mut self) -> Result<Json> {
        let start = self.pos;
        let expression = self.peek() == Some('$');
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                if c == '\\' {
                    self.pos += 1;
                } else if c == q {
                    quote = None;
                }
                self.pos += 1;
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth > 0 => depth -= 1,
                ',' | ']' | '}' | '\n' if depth == 0 => break,
                ':' if depth == 0 && expression => break,
                c if depth == 0 && !expression && c.is_whitespace() => break,
                '/' if depth == 0
                    && self.starts_comment()
                    && self.pos > start
                    && self.chars[self.pos - 1].is_whitespace() =>
                {
                    break
                }
                _ => {}
            }
            self.pos += 1;
        }

        if quote.is_some() {
            return Err(Error::parse("Unterminated string", self.byte_offset(start)));
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let word = word.trim_end();
        if word.is_empty() {
            return Err(Error::parse("Expected a value", self.byte_offset(start)));
        }
        Ok(classify(word))
    }
}

fn classify(word: &str) -> Json {
    if word.starts_with('$') {
        return Json::String(word.to_string());
    }
    match word {
        "true" => return Json::Bool(true),
        "false" => return Json::Bool(false),
        "null" => return Json::Null,
        _ => {}
    }
    number(word).unwrap_or_else(|| Json::String(word.to_string()))
}

fn number(word: &str) -> Option<Json> {
    if !word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return None;
    }
    if let Ok(int) = word.parse::<i64>() {
        return Some(Json::from(int));
    }
    let float: f64 = word.parse().ok()?;
    Number::from_f64(float).map(Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relaxed_objects() {
        let value = parse_cdomc("{ x: 1, y: [1,2,3] }").unwrap();
        assert_eq!(value, json!({ "x": 1, "y": [1, 2, 3] }));
    }

    #[test]
    fn dollar_words_are_kept_verbatim() {
        assert_eq!(parse_cdomc("{ a: $/foo/bar }").unwrap(), json!({ "a": "$/foo/bar" }));
        assert_eq!(
            parse_cdomc("{ t: $/sum($/a, 'x, y'), n: 2 }").unwrap(),
            json!({ "t": "$/sum($/a, 'x, y')", "n": 2 })
        );
    }

    #[test]
    fn comments_quotes_and_trailing_commas() {
        let text = r#"
            // heading
            {
                'single': 'it\'s',
                "double": "a\nb", /* inline */
                list: [true, false, null,],
            }
        "#;
        assert_eq!(
            parse_cdomc(text).unwrap(),
            json!({ "single": "it's", "double": "a\nb", "list": [true, false, null] })
        );
    }

    #[test]
    fn bare_words_and_numbers() {
        assert_eq!(
            parse_cdomc("[hello, -2.5, 1e3, 10]").unwrap(),
            json!(["hello", -2.5, 1000.0, 10])
        );
    }

    #[test]
    fn keys_keep_their_order() {
        let value = parse_cdomc("{ b: 1, a: 2 }").unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse_cdomc("{ a 1 }").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, position: 4 } if message == "Expected ':'"));

        let err = parse_cdomc("{ a: 'open }").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, .. } if message == "Unterminated string"));

        let err = parse_cdomc("[1, 2").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, .. } if message == "Expected ']'"));

        let err = parse_cdomc("{ a: 1").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, .. } if message == "Expected '}'"));

        assert!(parse_cdomc("{ a: 1 } x").is_err());
    }

    #[test]
    fn missing_commas_are_errors() {
        let err = parse_cdomc("{ a: 1 b: 2 }").unwrap_err();
        assert!(
            matches!(err, Error::Parse { ref message, position: 7 } if message == "Expected ',' or '}'")
        );

        let err = parse_cdomc("[1 2]").unwrap_err();
        assert!(
            matches!(err, Error::Parse { ref message, position: 3 } if message == "Expected ',' or ']'")
        );

        let err = parse_cdomc("[hello world]").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, .. } if message == "Expected ',' or ']'"));

        // An expression word stops at a top-level colon.
        let err = parse_cdomc("{ a: $/x b: 2 }").unwrap_err();
        assert!(matches!(err, Error::Parse { ref message, .. } if message == "Expected ',' or '}'"));
    }

    #[test]
    fn expression_words_keep_their_spaces() {
        assert_eq!(
            parse_cdomc("{ n: $/count + 1, t: $/sum($/a, $/b) }").unwrap(),
            json!({ "n": "$/count + 1", "t": "$/sum($/a, $/b)" })
        );
    }

    #[test]
    fn positions_are_byte_offsets() {
        let err = parse_cdomc("{ é: 1 x }").unwrap_err();
        assert!(matches!(err, Error::Parse { position: 8, .. }));
    }
}
