use std::fmt;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Identifier(String),
    Keyword(Keyword),

    NumericLiteral(f64),
    BigIntLiteral(String),
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,

    // Template pieces carry (cooked, raw); cooked is None for an invalid escape.
    NoSubstitutionTemplate(Option<String>, String),
    TemplateHead(Option<String>, String),
    TemplateMiddle(Option<String>, String),
    TemplateTail(Option<String>, String),

    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Ellipsis,
    Semicolon,
    Comma,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Exponent,
    Increment,
    Decrement,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    Ampersand,
    Pipe,
    Caret,
    Bang,
    Tilde,
    LogicalAnd,
    LogicalOr,
    NullishCoalescing,
    Question,
    OptionalChain,
    Colon,
    Arrow,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    ExponentAssign,
    LeftShiftAssign,
    RightShiftAssign,
    UnsignedRightShiftAssign,
    AmpersandAssign,
    PipeAssign,
    CaretAssign,
    LogicalAndAssign,
    LogicalOrAssign,
    NullishAssign,

    LineTerminator,
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Async,
    Await,
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Export,
    Extends,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    Let,
    New,
    Of,
    Return,
    Static,
    Super,
    Switch,
    This,
    Throw,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("async", Keyword::Async),
    ("await", Keyword::Await),
    ("break", Keyword::Break),
    ("case", Keyword::Case),
    ("catch", Keyword::Catch),
    ("class", Keyword::Class),
    ("const", Keyword::Const),
    ("continue", Keyword::Continue),
    ("debugger", Keyword::Debugger),
    ("default", Keyword::Default),
    ("delete", Keyword::Delete),
    ("do", Keyword::Do),
    ("else", Keyword::Else),
    ("export", Keyword::Export),
    ("extends", Keyword::Extends),
    ("finally", Keyword::Finally),
    ("for", Keyword::For),
    ("function", Keyword::Function),
    ("if", Keyword::If),
    ("import", Keyword::Import),
    ("in", Keyword::In),
    ("instanceof", Keyword::Instanceof),
    ("let", Keyword::Let),
    ("new", Keyword::New),
    ("of", Keyword::Of),
    ("return", Keyword::Return),
    ("static", Keyword::Static),
    ("super", Keyword::Super),
    ("switch", Keyword::Switch),
    ("this", Keyword::This),
    ("throw", Keyword::Throw),
    ("try", Keyword::Try),
    ("typeof", Keyword::Typeof),
    ("var", Keyword::Var),
    ("void", Keyword::Void),
    ("while", Keyword::While),
    ("with", Keyword::With),
    ("yield", Keyword::Yield),
];

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(text, _)| *text == s)
            .map(|(_, kw)| *kw)
    }

    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == self)
            .map(|(text, _)| *text)
            .unwrap_or("")
    }

    /// Keywords that may still appear as plain identifiers outside their
    /// special contexts (`let x`, `of`, `async`, a property named `static`).
    pub fn is_contextual(self) -> bool {
        matches!(
            self,
            Keyword::Async | Keyword::Await | Keyword::Let | Keyword::Of | Keyword::Static | Keyword::Yield
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn punctuator(text: &str) -> Option<Token> {
    let tok = match text {
        "{" => Token::LeftBrace,
        "}" => Token::RightBrace,
        "(" => Token::LeftParen,
        ")" => Token::RightParen,
        "[" => Token::LeftBracket,
        "]" => Token::RightBracket,
        "." => Token::Dot,
        "..." => Token::Ellipsis,
        ";" => Token::Semicolon,
        "," => Token::Comma,
        "<" => Token::LessThan,
        ">" => Token::GreaterThan,
        "<=" => Token::LessThanEqual,
        ">=" => Token::GreaterThanEqual,
        "==" => Token::Equal,
        "!=" => Token::NotEqual,
        "===" => Token::StrictEqual,
        "!==" => Token::StrictNotEqual,
        "+" => Token::Plus,
        "-" => Token::Minus,
        "*" => Token::Star,
        "/" => Token::Slash,
        "%" => Token::Percent,
        "**" => Token::Exponent,
        "++" => Token::Increment,
        "--" => Token::Decrement,
        "<<" => Token::LeftShift,
        ">>" => Token::RightShift,
        ">>>" => Token::UnsignedRightShift,
        "&" => Token::Ampersand,
        "|" => Token::Pipe,
        "^" => Token::Caret,
        "!" => Token::Bang,
        "~" => Token::Tilde,
        "&&" => Token::LogicalAnd,
        "||" => Token::LogicalOr,
        "??" => Token::NullishCoalescing,
        "?" => Token::Question,
        "?." => Token::OptionalChain,
        ":" => Token::Colon,
        "=>" => Token::Arrow,
        "=" => Token::Assign,
        "+=" => Token::PlusAssign,
        "-=" => Token::MinusAssign,
        "*=" => Token::StarAssign,
        "/=" => Token::SlashAssign,
        "%=" => Token::PercentAssign,
        "**=" => Token::ExponentAssign,
        "<<=" => Token::LeftShiftAssign,
        ">>=" => Token::RightShiftAssign,
        ">>>=" => Token::UnsignedRightShiftAssign,
        "&=" => Token::AmpersandAssign,
        "|=" => Token::PipeAssign,
        "^=" => Token::CaretAssign,
        "&&=" => Token::LogicalAndAssign,
        "||=" => Token::LogicalOrAssign,
        "??=" => Token::NullishAssign,
        _ => return None,
    };
    Some(tok)
}

#[derive(Clone, Debug)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    current: Option<char>,
    offset: usize,
    token_start: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            current,
            offset: 0,
            token_start: 0,
            line: 1,
            column: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current;
        if let Some(c) = ch {
            self.offset += c.len_utf8();
            self.column += 1;
            self.current = self.chars.next();
        }
        ch
    }

    fn eat_if(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        match self.peek() {
            Some(c) if pred(c) => self.advance(),
            _ => None,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            location: self.location(),
        }
    }

    fn is_line_terminator(ch: char) -> bool {
        matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
    }

    fn is_whitespace(ch: char) -> bool {
        matches!(ch, '\t' | '\u{000B}' | '\u{000C}' | ' ' | '\u{00A0}' | '\u{FEFF}')
            || (ch.is_whitespace() && !Self::is_line_terminator(ch))
    }

    fn is_identifier_start(ch: char) -> bool {
        ch == '_'
            || ch == '$'
            || ch.is_ascii_alphabetic()
            || (!ch.is_ascii() && unicode_ident::is_xid_start(ch))
    }

    fn is_identifier_continue(ch: char) -> bool {
        ch == '_'
            || ch == '$'
            || ch.is_ascii_alphanumeric()
            || ch == '\u{200C}'
            || ch == '\u{200D}'
            || (!ch.is_ascii() && unicode_ident::is_xid_continue(ch))
    }

    fn handle_newline(&mut self, ch: char) {
        if ch == '\r' && self.peek() == Some('\n') {
            self.advance();
        }
        self.line += 1;
        self.column = 0;
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if Self::is_line_terminator(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Returns whether the comment spanned a line break.
    fn skip_block_comment(&mut self) -> Result<bool, LexError> {
        let mut crossed_line = false;
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(crossed_line);
                }
                Some(ch) if Self::is_line_terminator(ch) => {
                    crossed_line = true;
                    self.handle_newline(ch);
                }
                Some(_) => {}
                None => return Err(self.error("Unterminated block comment")),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            while self.peek().is_some_and(Self::is_whitespace) {
                self.advance();
            }
            self.token_start = self.offset;

            let Some(ch) = self.peek() else {
                return Ok(Token::Eof);
            };

            if Self::is_line_terminator(ch) {
                self.advance();
                self.handle_newline(ch);
                return Ok(Token::LineTerminator);
            }

            if ch == '/' && self.peek_next() == Some('/') {
                self.skip_line_comment();
                continue;
            }
            if ch == '/' && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                if self.skip_block_comment()? {
                    return Ok(Token::LineTerminator);
                }
                continue;
            }
            if ch == '#' && self.offset == 0 && self.peek_next() == Some('!') {
                self.skip_line_comment();
                continue;
            }

            if ch == '\'' || ch == '"' {
                self.advance();
                return self.read_string(ch).map(Token::StringLiteral);
            }
            if ch == '`' {
                self.advance();
                let (cooked, raw, is_tail) = self.read_template_chars()?;
                return Ok(if is_tail {
                    Token::NoSubstitutionTemplate(cooked, raw)
                } else {
                    Token::TemplateHead(cooked, raw)
                });
            }
            if ch.is_ascii_digit() || (ch == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit())) {
                return self.read_numeric_literal();
            }
            if Self::is_identifier_start(ch) || ch == '\\' {
                return self.read_identifier();
            }
            return self.read_punctuator();
        }
    }

    /// Continues a template after the `}` closing a substitution.
    pub fn read_template_continuation(&mut self) -> Result<Token, LexError> {
        let (cooked, raw, is_tail) = self.read_template_chars()?;
        Ok(if is_tail {
            Token::TemplateTail(cooked, raw)
        } else {
            Token::TemplateMiddle(cooked, raw)
        })
    }

    pub fn tokenize_all(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(s),
                None => return Err(self.error("Unterminated string literal")),
                Some(ch) if Self::is_line_terminator(ch) => {
                    return Err(self.error("Unterminated string literal"));
                }
                Some('\\') => {
                    if let Some(c) = self.read_escape_sequence()? {
                        s.push(c);
                    }
                }
                Some(ch) => s.push(ch),
            }
        }
    }

    /// Reads the escape after a backslash; `None` is a line continuation.
    fn read_escape_sequence(&mut self) -> Result<Option<char>, LexError> {
        let ch = self
            .advance()
            .ok_or_else(|| self.error("Unterminated escape sequence"))?;
        let c = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => '\0',
            '1'..='9' => return Err(self.error("Octal escape sequences are not supported")),
            'x' => {
                let value = self.read_hex_digits(2)?;
                char::from_u32(value).ok_or_else(|| self.error("Invalid hex escape"))?
            }
            'u' => self.read_unicode_escape()?,
            c if Self::is_line_terminator(c) => {
                self.handle_newline(c);
                return Ok(None);
            }
            other => other,
        };
        Ok(Some(c))
    }

    fn read_hex_digits(&mut self, count: usize) -> Result<u32, LexError> {
        let mut value = 0;
        for _ in 0..count {
            let digit = self
                .advance()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("Invalid hexadecimal escape sequence"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn read_unicode_escape(&mut self) -> Result<char, LexError> {
        let value = if self.peek() == Some('{') {
            self.advance();
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(d) = self.eat_if(|c| c.is_ascii_hexdigit()) {
                value = value * 16 + d.to_digit(16).unwrap_or(0);
                if value > 0x10FFFF {
                    return Err(self.error("Unicode code point out of range"));
                }
                digits += 1;
            }
            if digits == 0 || self.advance() != Some('}') {
                return Err(self.error("Invalid Unicode escape sequence"));
            }
            value
        } else {
            self.read_hex_digits(4)?
        };
        // Lone surrogates cannot live in a Rust string.
        Ok(char::from_u32(value).unwrap_or('\u{FFFD}'))
    }

    fn read_numeric_literal(&mut self) -> Result<Token, LexError> {
        if self.peek() == Some('0') {
            let radix = match self.peek_next() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                return self.read_radix_literal(radix);
            }
        }

        let mut text = String::new();
        self.read_decimal_digits(&mut text);
        if self.peek() == Some('.') {
            text.push('.');
            self.advance();
            self.read_decimal_digits(&mut text);
        }
        if let Some(e) = self.eat_if(|c| c == 'e' || c == 'E') {
            text.push(e);
            if let Some(sign) = self.eat_if(|c| c == '+' || c == '-') {
                text.push(sign);
            }
            self.read_decimal_digits(&mut text);
        }
        if self.peek() == Some('n') {
            self.advance();
            return Ok(Token::BigIntLiteral(text));
        }
        if self.peek().is_some_and(Self::is_identifier_start) {
            return Err(self.error("Identifier starts immediately after numeric literal"));
        }
        text.parse()
            .map(Token::NumericLiteral)
            .map_err(|_| self.error("Invalid numeric literal"))
    }

    fn read_decimal_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.eat_if(|c| c.is_ascii_digit() || c == '_') {
            if ch != '_' {
                text.push(ch);
            }
        }
    }

    fn read_radix_literal(&mut self, radix: u32) -> Result<Token, LexError> {
        let mut digits = String::new();
        while let Some(ch) = self.eat_if(|c| c.is_digit(radix) || c == '_') {
            if ch != '_' {
                digits.push(ch);
            }
        }
        if digits.is_empty() {
            return Err(self.error("Missing digits after radix prefix"));
        }
        if self.peek() == Some('n') {
            self.advance();
            let prefix = match radix {
                16 => "0x",
                8 => "0o",
                _ => "0b",
            };
            return Ok(Token::BigIntLiteral(format!("{prefix}{digits}")));
        }
        let value = digits
            .chars()
            .fold(0.0, |acc, c| acc * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64);
        Ok(Token::NumericLiteral(value))
    }

    fn read_identifier(&mut self) -> Result<Token, LexError> {
        let mut name = String::new();
        let mut escaped = false;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.advance();
                    if self.advance() != Some('u') {
                        return Err(self.error("Invalid escape in identifier"));
                    }
                    name.push(self.read_unicode_escape()?);
                    escaped = true;
                }
                Some(ch) if Self::is_identifier_continue(ch) => {
                    name.push(ch);
                    self.advance();
                }
                _ => break,
            }
        }

        if escaped {
            return Ok(Token::Identifier(name));
        }
        Ok(match name.as_str() {
            "true" => Token::BooleanLiteral(true),
            "false" => Token::BooleanLiteral(false),
            "null" => Token::NullLiteral,
            _ => match Keyword::from_str(&name) {
                Some(kw) => Token::Keyword(kw),
                None => Token::Identifier(name),
            },
        })
    }

    // Returns (cooked, raw, is_tail); is_tail is false when the chunk ended at `${`.
    fn read_template_chars(&mut self) -> Result<(Option<String>, String, bool), LexError> {
        let mut cooked = Some(String::new());
        let mut raw = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated template literal")),
                Some('`') => return Ok((cooked, raw, true)),
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    return Ok((cooked, raw, false));
                }
                Some('\\') => {
                    let start = self.offset;
                    let escape = self.read_escape_sequence();
                    raw.push('\\');
                    raw.push_str(&self.source[start..self.offset]);
                    match (escape, cooked.as_mut()) {
                        (Ok(Some(c)), Some(text)) => text.push(c),
                        (Ok(None), _) | (Ok(Some(_)), None) => {}
                        (Err(_), _) => cooked = None,
                    }
                }
                Some(ch) if Self::is_line_terminator(ch) => {
                    if ch == '\r' && self.peek() == Some('\n') {
                        raw.push('\r');
                    }
                    raw.push(ch);
                    self.handle_newline(ch);
                    if let Some(text) = cooked.as_mut() {
                        text.push('\n');
                    }
                }
                Some(ch) => {
                    raw.push(ch);
                    if let Some(text) = cooked.as_mut() {
                        text.push(ch);
                    }
                }
            }
        }
    }

    fn read_punctuator(&mut self) -> Result<Token, LexError> {
        let rest = &self.source[self.offset..];
        for len in (1..=4).rev() {
            let Some(candidate) = rest.get(..len) else {
                continue;
            };
            let Some(tok) = punctuator(candidate) else {
                continue;
            };
            // `a?.5:b` is a conditional, not optional chaining.
            if tok == Token::OptionalChain && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            for _ in 0..len {
                self.advance();
            }
            return Ok(tok);
        }
        let ch = self.peek().unwrap_or('\0');
        Err(self.error(format!("Unexpected character: {ch}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize_all().unwrap()
    }

    fn lex_no_lt(src: &str) -> Vec<Token> {
        lex(src)
            .into_iter()
            .filter(|t| !matches!(t, Token::LineTerminator))
            .collect()
    }

    #[test]
    fn empty_source() {
        assert_eq!(lex(""), vec![Token::Eof]);
    }

    #[test]
    fn declaration_tokens() {
        assert_eq!(
            lex_no_lt("let x = 42;"),
            vec![
                Token::Keyword(Keyword::Let),
                Token::Identifier("x".into()),
                Token::Assign,
                Token::NumericLiteral(42.0),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn keyword_table_round_trips() {
        for (text, kw) in KEYWORDS {
            assert_eq!(Keyword::from_str(text), Some(*kw));
            assert_eq!(kw.to_string(), *text);
        }
        assert_eq!(Keyword::from_str("foo"), None);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_no_lt(r"'a\nb\x41B\u{43}'"),
            vec![Token::StringLiteral("a\nbABC".into()), Token::Eof]
        );
        assert!(Lexer::new("'open").tokenize_all().is_err());
    }

    #[test]
    fn numeric_forms() {
        assert_eq!(lex_no_lt("0xff")[0], Token::NumericLiteral(255.0));
        assert_eq!(lex_no_lt("0b1010")[0], Token::NumericLiteral(10.0));
        assert_eq!(lex_no_lt("0o17")[0], Token::NumericLiteral(15.0));
        assert_eq!(lex_no_lt("1_000")[0], Token::NumericLiteral(1000.0));
        assert_eq!(lex_no_lt("2.5e2")[0], Token::NumericLiteral(250.0));
        assert_eq!(lex_no_lt(".5")[0], Token::NumericLiteral(0.5));
        assert_eq!(lex_no_lt("42n")[0], Token::BigIntLiteral("42".into()));
        assert_eq!(lex_no_lt("0xFFn")[0], Token::BigIntLiteral("0xFF".into()));
    }

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(
            lex_no_lt(">>>= === ?. ?? ??= ... =>"),
            vec![
                Token::UnsignedRightShiftAssign,
                Token::StrictEqual,
                Token::OptionalChain,
                Token::NullishCoalescing,
                Token::NullishAssign,
                Token::Ellipsis,
                Token::Arrow,
                Token::Eof,
            ]
        );
        assert_eq!(
            lex_no_lt("a?.5:1")[1],
            Token::Question,
        );
    }

    #[test]
    fn comments_and_line_terminators() {
        assert_eq!(
            lex("1 // c\n2"),
            vec![
                Token::NumericLiteral(1.0),
                Token::LineTerminator,
                Token::NumericLiteral(2.0),
                Token::Eof,
            ]
        );
        assert_eq!(
            lex("1 /* a\n b */ 2"),
            vec![
                Token::NumericLiteral(1.0),
                Token::LineTerminator,
                Token::NumericLiteral(2.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn template_pieces() {
        let mut lexer = Lexer::new("`a${x}b\\n${y}c`");
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::TemplateHead(Some("a".into()), "a".into())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x".into()));
        assert_eq!(lexer.next_token().unwrap(), Token::RightBrace);
        assert_eq!(
            lexer.read_template_continuation().unwrap(),
            Token::TemplateMiddle(Some("b\n".into()), "b\\n".into())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("y".into()));
        assert_eq!(lexer.next_token().unwrap(), Token::RightBrace);
        assert_eq!(
            lexer.read_template_continuation().unwrap(),
            Token::TemplateTail(Some("c".into()), "c".into())
        );
    }

    #[test]
    fn invalid_template_escape_has_no_cooked_value() {
        assert_eq!(
            lex_no_lt(r"`\u{zz}`")[0],
            Token::NoSubstitutionTemplate(None, r"\u{zz}".into())
        );
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(lex_no_lt("café")[0], Token::Identifier("café".into()));
        assert_eq!(lex_no_lt(r"\u0061b")[0], Token::Identifier("ab".into()));
    }
}
