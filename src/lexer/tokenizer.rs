//! Byte-level tokenizer for FHIRPath source text.
//!
//! Scans the input once, left to right, producing [`Spanned<Token>`] values.
//! String literals are unescaped eagerly (support for `\uXXXX` makes a
//! zero-copy slice impossible in the general case); everything else borrows
//! directly from the input.

use crate::error::{FhirPathError, Position, Result};

use super::token::{Spanned, Token};

/// Tokenize a complete FHIRPath source string.
pub fn tokenize(input: &str) -> Result<Vec<Spanned<Token<'_>>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::with_capacity(input.len() / 4 + 4);
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}

struct Lexer<'input> {
    source: &'input str,
    bytes: &'input [u8],
    pos: usize,
    end: usize,
}

impl<'input> Lexer<'input> {
    fn new(source: &'input str) -> Self {
        let bytes = source.as_bytes();
        Self {
            source,
            bytes,
            pos: 0,
            end: bytes.len(),
        }
    }

    fn err(&self, message: impl Into<String>) -> FhirPathError {
        FhirPathError::LexError {
            message: message.into(),
            position: Position::from_offset(self.source, self.pos),
        }
    }

    fn slice(&self, start: usize, end: usize) -> &'input str {
        &self.source[start..end]
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.bytes.get(self.pos) {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while self.pos < self.end && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.pos += 2;
                    while self.pos + 1 < self.end
                        && !(self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/')
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.end);
                }
                _ => break,
            }
        }
    }

    fn is_id_start(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'_') || ch >= 0x80
    }

    fn is_id_continue(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_') || ch >= 0x80
    }

    fn parse_identifier_raw(&mut self) -> &'input str {
        let start = self.pos;
        while self.pos < self.end && Self::is_id_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.slice(start, self.pos)
    }

    /// Backtick-delimited identifier: `` `resource type` ``. Escapes pass
    /// through unresolved to the identifier text per spec §4.1 ("escape
    /// sequences pass through"), except the closing backtick.
    fn parse_delimited_identifier(&mut self) -> Result<&'input str> {
        self.pos += 1; // opening backtick
        let start = self.pos;
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'`' => {
                    let content = self.slice(start, self.pos);
                    self.pos += 1;
                    return Ok(content);
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        Err(self.err("unterminated delimited identifier"))
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            if self.pos >= self.end {
                return Err(self.err("unterminated string literal"));
            }
            match self.bytes[self.pos] {
                b'\'' => {
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.pos += 1;
                    if self.pos >= self.end {
                        return Err(self.err("unterminated escape sequence"));
                    }
                    match self.bytes[self.pos] {
                        b'\'' => {
                            out.push('\'');
                            self.pos += 1;
                        }
                        b'"' => {
                            out.push('"');
                            self.pos += 1;
                        }
                        b'`' => {
                            out.push('`');
                            self.pos += 1;
                        }
                        b'\\' => {
                            out.push('\\');
                            self.pos += 1;
                        }
                        b'/' => {
                            out.push('/');
                            self.pos += 1;
                        }
                        b'n' => {
                            out.push('\n');
                            self.pos += 1;
                        }
                        b'r' => {
                            out.push('\r');
                            self.pos += 1;
                        }
                        b't' => {
                            out.push('\t');
                            self.pos += 1;
                        }
                        b'f' => {
                            out.push('\u{000C}');
                            self.pos += 1;
                        }
                        b'u' => {
                            self.pos += 1;
                            if self.pos + 4 > self.end {
                                return Err(self.err("incomplete \\u escape"));
                            }
                            let hex = self.slice(self.pos, self.pos + 4);
                            let code = u32::from_str_radix(hex, 16)
                                .map_err(|_| self.err("invalid \\u escape"))?;
                            let ch = char::from_u32(code)
                                .ok_or_else(|| self.err("invalid unicode code point"))?;
                            out.push(ch);
                            self.pos += 4;
                        }
                        other => {
                            return Err(self.err(format!(
                                "unrecognized escape sequence '\\{}'",
                                other as char
                            )));
                        }
                    }
                }
                _ => {
                    let start = self.pos;
                    let ch_len = utf8_len(self.bytes[self.pos]);
                    self.pos += ch_len;
                    out.push_str(self.slice(start, self.pos));
                }
            }
        }
    }

    fn parse_number(&mut self) -> Token<'input> {
        let start = self.pos;
        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let is_decimal = self.bytes.get(self.pos) == Some(&b'.')
            && self
                .bytes
                .get(self.pos + 1)
                .is_some_and(u8::is_ascii_digit);
        if is_decimal {
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            Token::Decimal(self.slice(start, self.pos))
        } else {
            let text = self.slice(start, self.pos);
            match text.parse::<i64>() {
                Ok(n) => Token::Integer(n),
                Err(_) => Token::Decimal(text),
            }
        }
    }

    /// Calendar-duration keyword following a numeric literal, e.g. `5 days`.
    const DURATION_KEYWORDS: &'static [&'static str] = &[
        "years", "year", "months", "month", "weeks", "week", "days", "day", "hours", "hour",
        "minutes", "minute", "seconds", "second", "milliseconds", "millisecond",
    ];

    fn try_parse_quantity_unit(&mut self) -> Option<&'input str> {
        let save = self.pos;
        self.skip_trivia();
        if self.bytes.get(self.pos) == Some(&b'\'') {
            let start = self.pos;
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos] != b'\'' {
                self.pos += 1;
            }
            if self.pos >= self.end {
                self.pos = save;
                return None;
            }
            self.pos += 1; // closing quote
            return Some(self.slice(start + 1, self.pos - 1));
        }
        if Self::is_id_start(self.bytes.get(self.pos).copied().unwrap_or(b' ')) {
            let ident_start = self.pos;
            let ident = self.parse_identifier_raw();
            if Self::DURATION_KEYWORDS.contains(&ident) {
                return Some(self.slice(ident_start, self.pos));
            }
            self.pos = save;
            return None;
        }
        self.pos = save;
        None
    }

    fn parse_at_literal(&mut self) -> Result<Token<'input>> {
        let start = self.pos;
        self.pos += 1; // '@'
        if self.bytes.get(self.pos) == Some(&b'T') {
            self.pos += 1;
            self.scan_time_part();
            return Ok(Token::Time(self.slice(start + 1, self.pos)));
        }
        if !self.scan_date_part() {
            return Err(self.err("invalid date/time literal"));
        }
        if self.bytes.get(self.pos) == Some(&b'T') {
            self.pos += 1;
            self.scan_time_part();
            Ok(Token::DateTime(self.slice(start + 1, self.pos)))
        } else {
            Ok(Token::Date(self.slice(start + 1, self.pos)))
        }
    }

    fn scan_date_part(&mut self) -> bool {
        let digits_start = self.pos;
        while self.pos < self.end
            && self.bytes[self.pos].is_ascii_digit()
            && self.pos - digits_start < 4
        {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return false;
        }
        if self.bytes.get(self.pos) == Some(&b'-')
            && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
            && self.bytes.get(self.pos + 2).is_some_and(u8::is_ascii_digit)
        {
            self.pos += 3;
            if self.bytes.get(self.pos) == Some(&b'-')
                && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
                && self.bytes.get(self.pos + 2).is_some_and(u8::is_ascii_digit)
            {
                self.pos += 3;
            }
        }
        true
    }

    fn scan_time_part(&mut self) {
        let start = self.pos;
        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() && self.pos - start < 2
        {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b':')
            && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
            && self.bytes.get(self.pos + 2).is_some_and(u8::is_ascii_digit)
        {
            self.pos += 3;
            if self.bytes.get(self.pos) == Some(&b':')
                && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
                && self.bytes.get(self.pos + 2).is_some_and(u8::is_ascii_digit)
            {
                self.pos += 3;
                if self.bytes.get(self.pos) == Some(&b'.') {
                    self.pos += 1;
                    while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                        self.pos += 1;
                    }
                }
            }
        }
        match self.bytes.get(self.pos) {
            Some(b'Z') => self.pos += 1,
            Some(b'+' | b'-') => {
                self.pos += 1;
                if self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit)
                    && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
                    && self.bytes.get(self.pos + 2) == Some(&b':')
                    && self.bytes.get(self.pos + 3).is_some_and(u8::is_ascii_digit)
                    && self.bytes.get(self.pos + 4).is_some_and(u8::is_ascii_digit)
                {
                    self.pos += 5;
                }
            }
            _ => {}
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned<Token<'input>>>> {
        self.skip_trivia();
        if self.pos >= self.end {
            return Ok(None);
        }
        let start = self.pos;
        let token = match self.bytes[self.pos] {
            b'.' => {
                self.pos += 1;
                Token::Dot
            }
            b'(' => {
                self.pos += 1;
                Token::LParen
            }
            b')' => {
                self.pos += 1;
                Token::RParen
            }
            b'[' => {
                self.pos += 1;
                Token::LBracket
            }
            b']' => {
                self.pos += 1;
                Token::RBracket
            }
            b'{' => {
                self.pos += 1;
                Token::LBrace
            }
            b'}' => {
                self.pos += 1;
                Token::RBrace
            }
            b',' => {
                self.pos += 1;
                Token::Comma
            }
            b'|' => {
                self.pos += 1;
                Token::Pipe
            }
            b'&' => {
                self.pos += 1;
                Token::Amp
            }
            b'+' => {
                self.pos += 1;
                Token::Plus
            }
            b'-' => {
                self.pos += 1;
                Token::Minus
            }
            b'*' => {
                self.pos += 1;
                Token::Star
            }
            b'/' => {
                self.pos += 1;
                Token::Slash
            }
            b'=' => {
                self.pos += 1;
                Token::Eq
            }
            b'~' => {
                self.pos += 1;
                Token::Equiv
            }
            b'!' => match self.bytes.get(self.pos + 1) {
                Some(b'=') => {
                    self.pos += 2;
                    Token::Ne
                }
                Some(b'~') => {
                    self.pos += 2;
                    Token::NotEquiv
                }
                _ => return Err(self.err("unexpected character '!'")),
            },
            b'<' => {
                if self.bytes.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    Token::Le
                } else {
                    self.pos += 1;
                    Token::Lt
                }
            }
            b'>' => {
                if self.bytes.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    Token::Ge
                } else {
                    self.pos += 1;
                    Token::Gt
                }
            }
            b'`' => Token::Identifier(self.parse_delimited_identifier()?),
            b'\'' => Token::String(self.parse_string_literal()?),
            b'@' => self.parse_at_literal()?,
            b'%' => {
                self.pos += 1;
                if self.bytes.get(self.pos) == Some(&b'`') {
                    Token::ExternalVariable(self.parse_delimited_identifier()?)
                } else if self.bytes.get(self.pos) == Some(&b'\'') {
                    // %'some string' form for environment variables with
                    // characters outside identifier syntax.
                    let text = self.parse_string_literal()?;
                    return Ok(Some(Spanned::new(
                        Token::ExternalVariable(Box::leak(text.into_boxed_str())),
                        start,
                        self.pos,
                    )));
                } else {
                    Token::ExternalVariable(self.parse_identifier_raw())
                }
            }
            b'$' => {
                let rest = &self.source[self.pos..];
                if rest.starts_with("$this") && !rest_continues(rest, 5) {
                    self.pos += 5;
                    Token::DollarThis
                } else if rest.starts_with("$index") && !rest_continues(rest, 6) {
                    self.pos += 6;
                    Token::DollarIndex
                } else if rest.starts_with("$total") && !rest_continues(rest, 6) {
                    self.pos += 6;
                    Token::DollarTotal
                } else {
                    self.pos += 1;
                    Token::Dollar
                }
            }
            b'0'..=b'9' => {
                let tok = self.parse_number();
                if let Some(unit) = self.try_parse_quantity_unit() {
                    let value = match &tok {
                        Token::Integer(_) => self.slice(start, start_len_of_int(self.source, start)),
                        Token::Decimal(s) => s,
                        _ => unreachable!(),
                    };
                    Token::Quantity { value, unit }
                } else {
                    tok
                }
            }
            ch if Self::is_id_start(ch) => {
                let ident = self.parse_identifier_raw();
                Token::keyword(ident).unwrap_or(Token::Identifier(ident))
            }
            ch => {
                return Err(self.err(format!("unexpected character '{}'", ch as char)));
            }
        };
        Ok(Some(Spanned::new(token, start, self.pos)))
    }
}

fn rest_continues(rest: &str, prefix_len: usize) -> bool {
    rest.as_bytes()
        .get(prefix_len)
        .is_some_and(|&b| Lexer::is_id_continue(b))
}

fn utf8_len(byte: u8) -> usize {
    if byte & 0x80 == 0 {
        1
    } else if byte & 0xE0 == 0xC0 {
        2
    } else if byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

fn start_len_of_int(source: &str, start: usize) -> usize {
    // Recompute the integer's end by scanning digits again; used only to
    // recover the original slice once we know it was followed by a unit.
    let bytes = source.as_bytes();
    let mut pos = start;
    if bytes.get(pos) == Some(&b'-') {
        pos += 1;
    }
    while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token<'_>> {
        tokenize(src).unwrap().into_iter().map(|s| s.value).collect()
    }

    #[test]
    fn simple_path() {
        assert_eq!(
            toks("Patient.name"),
            vec![
                Token::Identifier("Patient"),
                Token::Dot,
                Token::Identifier("name"),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let result = toks(r"'a\nb\tcA'");
        assert_eq!(result, vec![Token::String("a\nb\tc\u{0041}".to_string())]);
    }

    #[test]
    fn quantity_literal_with_ucum_unit() {
        assert_eq!(
            toks("5 'mg'"),
            vec![Token::Quantity {
                value: "5",
                unit: "mg"
            }]
        );
    }

    #[test]
    fn quantity_literal_with_calendar_duration() {
        assert_eq!(
            toks("4 days"),
            vec![Token::Quantity {
                value: "4",
                unit: "days"
            }]
        );
    }

    #[test]
    fn date_time_and_time_literals() {
        assert_eq!(toks("@2023-01-01"), vec![Token::Date("2023-01-01")]);
        assert_eq!(
            toks("@2023-01-01T12:30:00Z"),
            vec![Token::DateTime("2023-01-01T12:30:00Z")]
        );
        assert_eq!(toks("@T12:30:00"), vec![Token::Time("T12:30:00")]);
    }

    #[test]
    fn dollar_variables() {
        assert_eq!(
            toks("$this $index $total $"),
            vec![
                Token::DollarThis,
                Token::DollarIndex,
                Token::DollarTotal,
                Token::Dollar,
            ]
        );
    }

    #[test]
    fn delimited_identifier() {
        assert_eq!(toks("`resource type`"), vec![Token::Identifier("resource type")]);
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.kind(), "LexError");
    }

    #[test]
    fn keywords_vs_identifiers() {
        assert_eq!(toks("and or xor implies"), vec![
            Token::And, Token::Or, Token::Xor, Token::Implies
        ]);
        // Function-style names stay identifiers so they can be used as
        // either member names or function calls depending on context.
        assert_eq!(toks("where"), vec![Token::Identifier("where")]);
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(
            toks("a // comment\n.b /* block */ .c"),
            vec![
                Token::Identifier("a"),
                Token::Dot,
                Token::Identifier("b"),
                Token::Dot,
                Token::Identifier("c"),
            ]
        );
    }
}
