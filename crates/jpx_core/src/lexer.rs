//! Lexer for extended JSONPath expressions

use std::iter::Peekable;
use std::str::Chars;

/// Token types for the expression grammar
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Root identifier `$`
    Root,
    /// Current node `@`
    At,
    /// Single dot `.`
    Dot,
    /// Double dot `..`
    DotDot,
    BracketOpen,
    BracketClose,
    ParenOpen,
    ParenClose,
    /// `*`, either a wildcard or multiplication depending on position
    Wildcard,
    Colon,
    Comma,
    /// Question mark `?` (filter indicator)
    Question,
    LessThan,
    GreaterThan,
    LessEq,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
    /// Pipe `|`
    Pipe,
    /// Parent operator `^`
    Caret,
    Plus,
    /// Minus `-` (when not the sign of a number literal)
    Minus,
    Slash,
    Percent,
    /// Regex match operator with its literal: `=~ /pattern/flags`
    Regex { pattern: String, flags: String },
    True,
    False,
    Null,
    /// Identifier (unquoted member name or function name)
    Ident(String),
    /// String literal (single or double quoted)
    String(String),
    /// Number (integer or floating-point)
    Number(f64),
}

/// Token with position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Lexer error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("at position {position}: {message}")]
pub struct LexerError {
    pub message: String,
    pub position: usize,
}

impl LexerError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl TokenKind {
    /// Whether this token can end an operand, so a following `-` is binary
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Root
                | TokenKind::At
                | TokenKind::BracketClose
                | TokenKind::ParenClose
                | TokenKind::Wildcard
                | TokenKind::Caret
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Ident(_)
                | TokenKind::String(_)
                | TokenKind::Number(_)
        )
    }
}

/// Lexer for tokenizing path expressions
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
    after_operand: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            after_operand: false,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            self.after_operand = token.kind.ends_operand();
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(None);
        };
        let start = self.position;

        let kind = match ch {
            '$' => self.single(TokenKind::Root),
            '@' => self.single(TokenKind::At),
            '[' => self.single(TokenKind::BracketOpen),
            ']' => self.single(TokenKind::BracketClose),
            '(' => self.single(TokenKind::ParenOpen),
            ')' => self.single(TokenKind::ParenClose),
            '*' => self.single(TokenKind::Wildcard),
            ':' => self.single(TokenKind::Colon),
            ',' => self.single(TokenKind::Comma),
            '?' => self.single(TokenKind::Question),
            '^' => self.single(TokenKind::Caret),
            '+' => self.single(TokenKind::Plus),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '.' => self.pair('.', TokenKind::DotDot, TokenKind::Dot),
            '<' => self.pair('=', TokenKind::LessEq, TokenKind::LessThan),
            '>' => self.pair('=', TokenKind::GreaterEq, TokenKind::GreaterThan),
            '!' => self.pair('=', TokenKind::NotEqual, TokenKind::Not),
            '|' => self.pair('|', TokenKind::Or, TokenKind::Pipe),
            '&' => {
                self.advance();
                if !self.eat('&') {
                    return Err(LexerError::new("expected '&&' but found single '&'", start));
                }
                TokenKind::And
            }
            '=' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::Equal
                } else if self.eat('~') {
                    self.read_regex()?
                } else {
                    return Err(LexerError::new(
                        "expected '==' or '=~' but found single '='",
                        start,
                    ));
                }
            }
            '-' if self.after_operand || !self.next_is_digit() => self.single(TokenKind::Minus),
            '-' | '0'..='9' => self.read_number()?,
            '\'' | '"' => self.read_string()?,
            _ if is_ident_start(ch) => self.read_ident_or_keyword(),
            _ => {
                return Err(LexerError::new(
                    format!("unexpected character: '{ch}'"),
                    start,
                ));
            }
        };

        Ok(Some(Token {
            kind,
            position: start,
        }))
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    /// Consume `expected` if it is next
    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// One character, optionally followed by `second` for the longer token
    fn pair(&mut self, second: char, long: TokenKind, short: TokenKind) -> TokenKind {
        self.advance();
        if self.eat(second) { long } else { short }
    }

    fn next_is_digit(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.peek().is_some_and(|c| c.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    /// Append consecutive ASCII digits to `buf`, returning how many were read
    fn take_digits(&mut self, buf: &mut String) -> usize {
        let mut count = 0;
        while let Some(&ch) = self.chars.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
            buf.push(ch);
            count += 1;
        }
        count
    }

    /// Read 4 hex digits for \uXXXX escape and return the code point
    fn read_unicode_escape(&mut self) -> Result<u32, LexerError> {
        let mut code = 0;
        for _ in 0..4 {
            let digit = self
                .advance()
                .and_then(|ch| ch.to_digit(16))
                .ok_or_else(|| {
                    LexerError::new("invalid unicode escape: expected 4 hex digits", self.position)
                })?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// Decode the character after a backslash inside a string literal
    fn read_escape(&mut self) -> Result<char, LexerError> {
        let escaped = self.advance().ok_or_else(|| {
            LexerError::new("unexpected end of input in escape sequence", self.position)
        })?;

        let ch = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\x08',
            'f' => '\x0C',
            '\\' | '\'' | '"' | '/' => escaped,
            'u' => {
                let mut code = self.read_unicode_escape()?;
                if (0xD800..=0xDBFF).contains(&code) {
                    // High surrogate; the low half must follow as another \uXXXX
                    if self.advance() != Some('\\') || self.advance() != Some('u') {
                        return Err(LexerError::new("invalid surrogate pair", self.position));
                    }
                    let low = self.read_unicode_escape()?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(LexerError::new("invalid low surrogate", self.position));
                    }
                    code = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                }
                char::from_u32(code).ok_or_else(|| {
                    LexerError::new("invalid unicode code point", self.position)
                })?
            }
            _ => {
                return Err(LexerError::new(
                    format!("invalid escape sequence: \\{escaped}"),
                    self.position - 1,
                ));
            }
        };
        Ok(ch)
    }

    fn read_string(&mut self) -> Result<TokenKind, LexerError> {
        let start = self.position;
        let quote = self
            .advance()
            .ok_or_else(|| LexerError::new("unexpected end of input", start))?;

        let mut value = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(TokenKind::String(value)),
                Some('\\') => value.push(self.read_escape()?),
                // Control characters (U+0000 to U+001F) must be escaped
                Some(ch) if (ch as u32) <= 0x1F => {
                    return Err(LexerError::new(
                        format!("unescaped control character U+{:04X}", ch as u32),
                        self.position - 1,
                    ));
                }
                Some(ch) => value.push(ch),
                None => return Err(LexerError::new("unterminated string", start + 1)),
            }
        }
    }

    /// Read the `/pattern/flags` literal that follows `=~`
    fn read_regex(&mut self) -> Result<TokenKind, LexerError> {
        self.skip_whitespace();
        let start = self.position;
        if self.advance() != Some('/') {
            return Err(LexerError::new(
                "expected '/' to open regex literal after '=~'",
                start,
            ));
        }

        let unterminated = || LexerError::new("unterminated regex literal", start);
        let mut pattern = String::new();
        loop {
            match self.advance().ok_or_else(unterminated)? {
                '/' => break,
                '\\' => match self.advance().ok_or_else(unterminated)? {
                    // `\/` is a literal slash, other escapes pass through
                    '/' => pattern.push('/'),
                    ch => {
                        pattern.push('\\');
                        pattern.push(ch);
                    }
                },
                ch => pattern.push(ch),
            }
        }

        let mut flags = String::new();
        while let Some(&ch) = self.chars.peek() {
            if !ch.is_ascii_alphabetic() {
                break;
            }
            self.advance();
            flags.push(ch);
        }

        Ok(TokenKind::Regex { pattern, flags })
    }

    /// JSON-style number: no leading zeros, no `-0` integer
    fn read_number(&mut self) -> Result<TokenKind, LexerError> {
        let start = self.position;
        let mut text = String::new();

        let negative = self.eat('-');
        if negative {
            text.push('-');
        }

        let int_start = text.len();
        let int_digits = self.take_digits(&mut text);
        if int_digits == 0 {
            return Err(LexerError::new("invalid number", start));
        }
        if int_digits > 1 && text[int_start..].starts_with('0') {
            return Err(LexerError::new("leading zeros not allowed", start));
        }
        let int_is_zero = &text[int_start..] == "0";

        let mut integral = true;

        // A fraction needs a digit after the dot, otherwise the dot is a step
        if self.chars.peek() == Some(&'.') && self.next_is_digit() {
            integral = false;
            self.advance();
            text.push('.');
            self.take_digits(&mut text);
        }

        if let Some(&e) = self.chars.peek().filter(|&&c| c == 'e' || c == 'E') {
            integral = false;
            self.advance();
            text.push(e);
            if let Some(&sign) = self.chars.peek().filter(|&&c| c == '+' || c == '-') {
                self.advance();
                text.push(sign);
            }
            if self.take_digits(&mut text) == 0 {
                return Err(LexerError::new("invalid exponent in number", start));
            }
        }

        if negative && int_is_zero && integral {
            return Err(LexerError::new("-0 is not allowed", start));
        }

        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| LexerError::new("number out of range", start))
    }

    fn read_ident_or_keyword(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(&ch) = self.chars.peek() {
            if !is_ident_char(ch) {
                break;
            }
            self.advance();
            ident.push(ch);
        }

        match ident.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(ident),
        }
    }
}

/// name-first = ALPHA / "_" / %x80-D7FF / %xE000-10FFFF
fn is_ident_start(ch: char) -> bool {
    let code = ch as u32;
    ch.is_ascii_alphabetic()
        || ch == '_'
        || (0x80..=0xD7FF).contains(&code)
        || (0xE000..=0x10FFFF).contains(&code)
}

/// name-char = name-first / DIGIT
fn is_ident_char(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(s: &str) -> TokenKind {
        Ident(s.to_string())
    }

    fn error(input: &str) -> LexerError {
        Lexer::new(input).tokenize().unwrap_err()
    }

    #[test]
    fn test_path_tokens() {
        let cases = [
            ("$.foo", vec![Root, Dot, ident("foo")]),
            ("$..foo", vec![Root, DotDot, ident("foo")]),
            (
                "$['foo']",
                vec![Root, BracketOpen, String("foo".to_string()), BracketClose],
            ),
            ("$[0]", vec![Root, BracketOpen, Number(0.0), BracketClose]),
            ("$[-1]", vec![Root, BracketOpen, Number(-1.0), BracketClose]),
            ("$[*]", vec![Root, BracketOpen, Wildcard, BracketClose]),
            ("@.price", vec![At, Dot, ident("price")]),
            ("$.a^^", vec![Root, Dot, ident("a"), Caret, Caret]),
            ("$.a | @.b", vec![Root, Dot, ident("a"), Pipe, At, Dot, ident("b")]),
        ];
        for (input, expected) in cases {
            assert_eq!(kinds(input), expected, "{input}");
        }
    }

    #[test]
    fn test_token_positions() {
        let tokens = Lexer::new("$.foo == 'x'").tokenize().unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 6, 9]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("< > <= >= == != && || !"),
            vec![LessThan, GreaterThan, LessEq, GreaterEq, Equal, NotEqual, And, Or, Not]
        );
        assert_eq!(
            kinds("+ * / % -@"),
            vec![Plus, Wildcard, Slash, Percent, Minus, At]
        );
        assert_eq!(kinds("true false null"), vec![True, False, Null]);
    }

    #[test]
    fn test_filter_expression() {
        assert_eq!(
            kinds("$[?(@.price >= 10 && @.available == true)]"),
            vec![
                Root,
                BracketOpen,
                Question,
                ParenOpen,
                At,
                Dot,
                ident("price"),
                GreaterEq,
                Number(10.0),
                And,
                At,
                Dot,
                ident("available"),
                Equal,
                True,
                ParenClose,
                BracketClose
            ]
        );
    }

    #[test]
    fn test_single_ampersand_and_equals_rejected() {
        assert!(error("&").message.contains("expected '&&'"));
        assert!(error("=").message.contains("expected '=='"));
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(
            kinds("@.name =~ /^Jo.*n$/i]"),
            vec![
                At,
                Dot,
                ident("name"),
                Regex {
                    pattern: "^Jo.*n$".to_string(),
                    flags: "i".to_string()
                },
                BracketClose
            ]
        );
    }

    #[test]
    fn test_regex_escaped_slash() {
        assert_eq!(
            kinds(r"=~/a\/b\d/"),
            vec![Regex {
                pattern: r"a/b\d".to_string(),
                flags: std::string::String::new()
            }]
        );
    }

    #[test]
    fn test_unterminated_regex() {
        assert!(error("@.a =~ /abc").message.contains("unterminated regex"));
        assert!(error(r"@.a =~ /abc\").message.contains("unterminated regex"));
        assert!(error("@.a =~ abc/").message.contains("expected '/'"));
    }

    #[test]
    fn test_minus_disambiguation() {
        assert_eq!(kinds("@.a-1"), vec![At, Dot, ident("a"), Minus, Number(1.0)]);
        assert_eq!(
            kinds("[1:-2]"),
            vec![BracketOpen, Number(1.0), Colon, Number(-2.0), BracketClose]
        );
        assert_eq!(kinds("(-1)"), vec![ParenOpen, Number(-1.0), ParenClose]);
        assert_eq!(kinds(") -1"), vec![ParenClose, Minus, Number(1.0)]);
    }

    #[test]
    fn test_numbers() {
        let cases = [
            ("1.5", 1.5),
            ("3.12345", 3.12345),
            ("1e10", 1e10),
            ("1E10", 1e10),
            ("1e-3", 1e-3),
            ("1e+3", 1e3),
            ("1.5e-3", 1.5e-3),
            ("-1.5", -1.5),
            ("-0.5", -0.5),
            ("0", 0.0),
        ];
        for (input, expected) in cases {
            assert_eq!(kinds(input), vec![Number(expected)], "{input}");
        }
    }

    #[test]
    fn test_number_followed_by_dot_step() {
        assert_eq!(kinds("1.a"), vec![Number(1.0), Dot, ident("a")]);
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(error("01").message.contains("leading zeros"));
        assert!(error("-0").message.contains("-0"));
        assert!(error("1e").message.contains("exponent"));
        assert!(error("1e+").message.contains("exponent"));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b" 'é' '😀' '\\n'"#),
            vec![
                String("it's".to_string()),
                String("a\"b".to_string()),
                String("é".to_string()),
                String("😀".to_string()),
                String("\\n".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_strings() {
        assert!(error("'abc").message.contains("unterminated string"));
        assert!(error(r"'\x'").message.contains("invalid escape"));
        assert!(error(r"'\uD83D'").message.contains("surrogate"));
        assert!(error("'a\u{1}'").message.contains("control character"));
    }

    #[test]
    fn test_unicode_identifiers() {
        for name in ["☺", "日本語", "émoji", "hello世界123", "_under"] {
            assert_eq!(kinds(&format!("$.{name}")), vec![Root, Dot, ident(name)]);
        }
    }

    #[test]
    fn test_unexpected_character() {
        let err = error("$.a#");
        assert_eq!(err.position, 3);
        assert!(err.message.contains("unexpected character"));
    }
}
