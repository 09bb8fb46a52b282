//! SQL tokenization
//!
//! Splits SQLite-dialect SQL into tokens. Keywords the SELECT grammar
//! needs get their own kind; other reserved words collapse into
//! [`TokenKind::Reserved`], and non-reserved words are plain identifiers.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{Error, Result};

// ============================================================================
// Token Types
// ============================================================================

/// Token kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Integer,
    Float,
    String,
    Blob,
    /// Bound parameter: `?`, `?NNN`, `:name`, `@name`, `$name`
    Variable,

    Identifier,
    /// A reserved word the SELECT grammar never accepts
    Reserved,

    // Keywords (alphabetical)
    Abort,
    All,
    And,
    As,
    Asc,
    Begin,
    Between,
    By,
    Case,
    Cast,
    Collate,
    Create,
    Cross,
    Current,
    CurrentDate,
    CurrentTime,
    CurrentTimestamp,
    Desc,
    Distinct,
    Else,
    End,
    Escape,
    Except,
    Exclude,
    Exists,
    Explain,
    Fail,
    Filter,
    First,
    Following,
    From,
    Full,
    Glob,
    Group,
    Groups,
    Having,
    Ignore,
    In,
    Indexed,
    Inner,
    Intersect,
    Is,
    Isnull,
    Join,
    Last,
    Left,
    Like,
    Limit,
    Match,
    Materialized,
    Natural,
    No,
    Not,
    Notnull,
    Null,
    Nulls,
    Offset,
    On,
    Or,
    Order,
    Others,
    Outer,
    Over,
    Partition,
    Plan,
    Preceding,
    Query,
    Raise,
    Range,
    Recursive,
    Regexp,
    Right,
    Rollback,
    Row,
    Rows,
    Select,
    Then,
    Ties,
    Trigger,
    Unbounded,
    Union,
    Using,
    Values,
    When,
    Where,
    Window,
    With,

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    Eq,         // =
    EqEq,       // ==
    Ne,         // <>
    BangEq,     // !=
    Lt,         // <
    Le,         // <=
    Gt,         // >
    Ge,         // >=
    Ampersand,  // &
    Pipe,       // |
    DoublePipe, // ||
    LtLt,       // <<
    GtGt,       // >>
    Tilde,      // ~
    Arrow,      // ->
    LongArrow,  // ->>

    // Punctuation
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .

    /// Stands in for text that failed to tokenize
    Illegal,
    Eof,
}

impl TokenKind {
    /// Keywords that may stand in for an identifier when the grammar
    /// cannot use them as keywords.
    pub fn is_fallback_id(&self) -> bool {
        matches!(
            self,
            TokenKind::Abort
                | TokenKind::Asc
                | TokenKind::Begin
                | TokenKind::By
                | TokenKind::Cast
                | TokenKind::Current
                | TokenKind::CurrentDate
                | TokenKind::CurrentTime
                | TokenKind::CurrentTimestamp
                | TokenKind::Desc
                | TokenKind::End
                | TokenKind::Exclude
                | TokenKind::Explain
                | TokenKind::Fail
                | TokenKind::First
                | TokenKind::Following
                | TokenKind::Glob
                | TokenKind::Groups
                | TokenKind::Ignore
                | TokenKind::Last
                | TokenKind::Like
                | TokenKind::Match
                | TokenKind::Materialized
                | TokenKind::No
                | TokenKind::Nulls
                | TokenKind::Offset
                | TokenKind::Others
                | TokenKind::Partition
                | TokenKind::Plan
                | TokenKind::Preceding
                | TokenKind::Query
                | TokenKind::Raise
                | TokenKind::Range
                | TokenKind::Recursive
                | TokenKind::Regexp
                | TokenKind::Rollback
                | TokenKind::Row
                | TokenKind::Rows
                | TokenKind::Ties
                | TokenKind::Trigger
                | TokenKind::Unbounded
                | TokenKind::With
        )
    }

    /// Identifiers and keywords, as opposed to literals and punctuation
    pub fn is_word(&self) -> bool {
        !matches!(
            self,
            TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::Blob
                | TokenKind::Variable
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Eq
                | TokenKind::EqEq
                | TokenKind::Ne
                | TokenKind::BangEq
                | TokenKind::Lt
                | TokenKind::Le
                | TokenKind::Gt
                | TokenKind::Ge
                | TokenKind::Ampersand
                | TokenKind::Pipe
                | TokenKind::DoublePipe
                | TokenKind::LtLt
                | TokenKind::GtGt
                | TokenKind::Tilde
                | TokenKind::Arrow
                | TokenKind::LongArrow
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::Dot
                | TokenKind::Illegal
                | TokenKind::Eof
        )
    }

    /// Join keywords (`LEFT`, `NATURAL`, ...), which double as names
    pub fn is_join_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Cross
                | TokenKind::Full
                | TokenKind::Inner
                | TokenKind::Left
                | TokenKind::Natural
                | TokenKind::Outer
                | TokenKind::Right
        )
    }
}

// ============================================================================
// Token
// ============================================================================

/// A token from the SQL source
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize, line: u32, column: u32) -> Self {
        Token {
            kind,
            start,
            end,
            line,
            column,
        }
    }

    /// Get the text of this token from the source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// SQL tokenizer
pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Tokenize up to the first error.
    ///
    /// On failure the token list ends with an `Illegal` token at the error
    /// position followed by `Eof`, so statements before the bad text can
    /// still be parsed.
    pub fn tokenize_prefix(&mut self) -> (Vec<Token>, Option<Error>) {
        let mut tokens = Vec::new();

        loop {
            let start = self.pos;
            match self.next_token() {
                Ok(token) => {
                    let is_eof = token.kind == TokenKind::Eof;
                    tokens.push(token);
                    if is_eof {
                        return (tokens, None);
                    }
                }
                Err(err) => {
                    let (line, column) = match err {
                        Error::UnrecognizedToken { line, column, .. } => (line, column),
                        _ => (self.line, self.column),
                    };
                    let at = start.max(tokens.last().map_or(0, |t: &Token| t.end));
                    let end = self.pos.max(at);
                    tokens.push(Token::new(TokenKind::Illegal, at, end, line, column));
                    tokens.push(Token::new(TokenKind::Eof, end, end, line, column));
                    return (tokens, Some(err));
                }
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        if self.is_eof() {
            return Ok(Token::new(
                TokenKind::Eof,
                self.pos,
                self.pos,
                self.line,
                self.column,
            ));
        }

        let start = self.pos;
        let start_line = self.line;
        let start_column = self.column;

        match self.scan_token() {
            Some(kind) => Ok(Token::new(kind, start, self.pos, start_line, start_column)),
            None => {
                let end = self.pos.max(start + 1).min(self.bytes.len());
                let token = String::from_utf8_lossy(&self.bytes[start..end]).into_owned();
                Err(Error::UnrecognizedToken {
                    token,
                    line: start_line,
                    column: start_column,
                })
            }
        }
    }

    /// Scan a single token; `None` marks an illegal token ending at `pos`
    fn scan_token(&mut self) -> Option<TokenKind> {
        let c = self.current();

        if c.is_ascii_digit() || (c == b'.' && self.peek().is_some_and(|n| n.is_ascii_digit())) {
            return self.scan_number();
        }

        // Blob literals must be checked before identifiers
        if (c == b'x' || c == b'X') && self.peek() == Some(b'\'') {
            return self.scan_blob();
        }

        if is_id_start(c) {
            return Some(self.scan_identifier());
        }

        match c {
            b'"' | b'`' | b'[' => self.scan_quoted_identifier(),
            b'\'' => self.scan_string(),
            b'?' | b':' | b'@' | b'$' => self.scan_variable(),
            _ => self.scan_operator(),
        }
    }

    /// Scan a number (integer or float)
    fn scan_number(&mut self) -> Option<TokenKind> {
        let mut kind = TokenKind::Integer;

        if self.current() == b'0'
            && matches!(self.peek(), Some(b'x') | Some(b'X'))
            && self.peek_at(2).is_some_and(|c| c.is_ascii_hexdigit())
        {
            self.advance();
            self.advance();
            while !self.is_eof() && (self.current().is_ascii_hexdigit() || self.current() == b'_')
            {
                self.advance();
            }
        } else {
            self.skip_digits();

            if !self.is_eof() && self.current() == b'.' {
                kind = TokenKind::Float;
                self.advance();
                self.skip_digits();
            }

            if !self.is_eof() && matches!(self.current(), b'e' | b'E') {
                let digit_at = if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    2
                } else {
                    1
                };
                if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    kind = TokenKind::Float;
                    for _ in 0..digit_at {
                        self.advance();
                    }
                    self.skip_digits();
                }
            }
        }

        // A number running straight into a name is not a number
        if !self.is_eof() && is_id_char(self.current()) {
            while !self.is_eof() && is_id_char(self.current()) {
                self.advance();
            }
            return None;
        }

        Some(kind)
    }

    fn skip_digits(&mut self) {
        while !self.is_eof() && (self.current().is_ascii_digit() || self.current() == b'_') {
            self.advance();
        }
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while !self.is_eof() && is_id_char(self.current()) {
            self.advance();
        }

        keyword_or_identifier(&self.source[start..self.pos])
    }

    /// Scan a quoted identifier ("foo", `foo`, or [foo])
    fn scan_quoted_identifier(&mut self) -> Option<TokenKind> {
        let quote = self.current();
        let close = if quote == b'[' { b']' } else { quote };
        self.advance();

        while !self.is_eof() {
            if self.current() == close {
                if quote != b'[' && self.peek() == Some(close) {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Some(TokenKind::Identifier);
                }
            } else {
                self.advance_char();
            }
        }

        None
    }

    /// Scan a string literal
    fn scan_string(&mut self) -> Option<TokenKind> {
        self.advance();

        while !self.is_eof() {
            if self.current() == b'\'' {
                if self.peek() == Some(b'\'') {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Some(TokenKind::String);
                }
            } else {
                self.advance_char();
            }
        }

        None
    }

    /// Scan a blob literal (X'...'); the digit count must be even
    fn scan_blob(&mut self) -> Option<TokenKind> {
        self.advance();
        self.advance();

        let digits_start = self.pos;
        while !self.is_eof() && self.current().is_ascii_hexdigit() {
            self.advance();
        }
        let digits = self.pos - digits_start;

        if self.is_eof() || self.current() != b'\'' {
            while !self.is_eof() && self.current() != b'\'' {
                self.advance_char();
            }
            if !self.is_eof() {
                self.advance();
            }
            return None;
        }
        self.advance();

        if digits % 2 == 1 {
            return None;
        }
        Some(TokenKind::Blob)
    }

    /// Scan a bound parameter
    fn scan_variable(&mut self) -> Option<TokenKind> {
        let sigil = self.current();
        self.advance();

        if sigil == b'?' {
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
            return Some(TokenKind::Variable);
        }

        let name_start = self.pos;
        while !self.is_eof() && is_id_char(self.current()) {
            self.advance();
        }
        if self.pos == name_start {
            return None;
        }
        Some(TokenKind::Variable)
    }

    /// Scan an operator or punctuation
    fn scan_operator(&mut self) -> Option<TokenKind> {
        let c = self.current();
        self.advance();

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => {
                if self.match_byte(b'>') {
                    if self.match_byte(b'>') {
                        TokenKind::LongArrow
                    } else {
                        TokenKind::Arrow
                    }
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'=' => {
                if self.match_byte(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'<' => {
                if self.match_byte(b'=') {
                    TokenKind::Le
                } else if self.match_byte(b'>') {
                    TokenKind::Ne
                } else if self.match_byte(b'<') {
                    TokenKind::LtLt
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.match_byte(b'=') {
                    TokenKind::Ge
                } else if self.match_byte(b'>') {
                    TokenKind::GtGt
                } else {
                    TokenKind::Gt
                }
            }
            b'!' => {
                if self.match_byte(b'=') {
                    TokenKind::BangEq
                } else {
                    return None;
                }
            }
            b'&' => TokenKind::Ampersand,
            b'|' => {
                if self.match_byte(b'|') {
                    TokenKind::DoublePipe
                } else {
                    TokenKind::Pipe
                }
            }
            b'~' => TokenKind::Tilde,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'.' => TokenKind::Dot,
            _ => return None,
        };

        Some(kind)
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_eof() && self.current().is_ascii_whitespace() {
                self.advance_char();
            }

            if self.is_eof() {
                break;
            }

            if self.current() == b'-' && self.peek() == Some(b'-') {
                while !self.is_eof() && self.current() != b'\n' {
                    self.advance();
                }
                continue;
            }

            // An unterminated block comment runs to end of input
            if self.current() == b'/' && self.peek() == Some(b'*') {
                self.advance();
                self.advance();
                while !self.is_eof() {
                    if self.current() == b'*' && self.peek() == Some(b'/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance_char();
                }
                continue;
            }

            break;
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_eof() && self.current() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.column += 1;
    }

    /// Advance one byte, keeping line numbers in step
    fn advance_char(&mut self) {
        if self.current() == b'\n' {
            self.pos += 1;
            self.line += 1;
            self.column = 1;
        } else {
            self.advance();
        }
    }
}

fn is_id_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_id_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

// ============================================================================
// Keyword Recognition
// ============================================================================

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("ABORT", TokenKind::Abort);
        m.insert("ALL", TokenKind::All);
        m.insert("AND", TokenKind::And);
        m.insert("AS", TokenKind::As);
        m.insert("ASC", TokenKind::Asc);
        m.insert("BEGIN", TokenKind::Begin);
        m.insert("BETWEEN", TokenKind::Between);
        m.insert("BY", TokenKind::By);
        m.insert("CASE", TokenKind::Case);
        m.insert("CAST", TokenKind::Cast);
        m.insert("COLLATE", TokenKind::Collate);
        m.insert("CREATE", TokenKind::Create);
        m.insert("CROSS", TokenKind::Cross);
        m.insert("CURRENT", TokenKind::Current);
        m.insert("CURRENT_DATE", TokenKind::CurrentDate);
        m.insert("CURRENT_TIME", TokenKind::CurrentTime);
        m.insert("CURRENT_TIMESTAMP", TokenKind::CurrentTimestamp);
        m.insert("DESC", TokenKind::Desc);
        m.insert("DISTINCT", TokenKind::Distinct);
        m.insert("ELSE", TokenKind::Else);
        m.insert("END", TokenKind::End);
        m.insert("ESCAPE", TokenKind::Escape);
        m.insert("EXCEPT", TokenKind::Except);
        m.insert("EXCLUDE", TokenKind::Exclude);
        m.insert("EXISTS", TokenKind::Exists);
        m.insert("EXPLAIN", TokenKind::Explain);
        m.insert("FAIL", TokenKind::Fail);
        m.insert("FILTER", TokenKind::Filter);
        m.insert("FIRST", TokenKind::First);
        m.insert("FOLLOWING", TokenKind::Following);
        m.insert("FROM", TokenKind::From);
        m.insert("FULL", TokenKind::Full);
        m.insert("GLOB", TokenKind::Glob);
        m.insert("GROUP", TokenKind::Group);
        m.insert("GROUPS", TokenKind::Groups);
        m.insert("HAVING", TokenKind::Having);
        m.insert("IGNORE", TokenKind::Ignore);
        m.insert("IN", TokenKind::In);
        m.insert("INDEXED", TokenKind::Indexed);
        m.insert("INNER", TokenKind::Inner);
        m.insert("INTERSECT", TokenKind::Intersect);
        m.insert("IS", TokenKind::Is);
        m.insert("ISNULL", TokenKind::Isnull);
        m.insert("JOIN", TokenKind::Join);
        m.insert("LAST", TokenKind::Last);
        m.insert("LEFT", TokenKind::Left);
        m.insert("LIKE", TokenKind::Like);
        m.insert("LIMIT", TokenKind::Limit);
        m.insert("MATCH", TokenKind::Match);
        m.insert("MATERIALIZED", TokenKind::Materialized);
        m.insert("NATURAL", TokenKind::Natural);
        m.insert("NO", TokenKind::No);
        m.insert("NOT", TokenKind::Not);
        m.insert("NOTNULL", TokenKind::Notnull);
        m.insert("NULL", TokenKind::Null);
        m.insert("NULLS", TokenKind::Nulls);
        m.insert("OFFSET", TokenKind::Offset);
        m.insert("ON", TokenKind::On);
        m.insert("OR", TokenKind::Or);
        m.insert("ORDER", TokenKind::Order);
        m.insert("OTHERS", TokenKind::Others);
        m.insert("OUTER", TokenKind::Outer);
        m.insert("OVER", TokenKind::Over);
        m.insert("PARTITION", TokenKind::Partition);
        m.insert("PLAN", TokenKind::Plan);
        m.insert("PRECEDING", TokenKind::Preceding);
        m.insert("QUERY", TokenKind::Query);
        m.insert("RAISE", TokenKind::Raise);
        m.insert("RANGE", TokenKind::Range);
        m.insert("RECURSIVE", TokenKind::Recursive);
        m.insert("REGEXP", TokenKind::Regexp);
        m.insert("RIGHT", TokenKind::Right);
        m.insert("ROLLBACK", TokenKind::Rollback);
        m.insert("ROW", TokenKind::Row);
        m.insert("ROWS", TokenKind::Rows);
        m.insert("SELECT", TokenKind::Select);
        m.insert("THEN", TokenKind::Then);
        m.insert("TIES", TokenKind::Ties);
        m.insert("TRIGGER", TokenKind::Trigger);
        m.insert("UNBOUNDED", TokenKind::Unbounded);
        m.insert("UNION", TokenKind::Union);
        m.insert("USING", TokenKind::Using);
        m.insert("VALUES", TokenKind::Values);
        m.insert("WHEN", TokenKind::When);
        m.insert("WHERE", TokenKind::Where);
        m.insert("WINDOW", TokenKind::Window);
        m.insert("WITH", TokenKind::With);

        for word in [
            "ADD", "ALTER", "AUTOINCREMENT", "CHECK", "COMMIT", "CONSTRAINT", "DEFAULT",
            "DEFERRABLE", "DELETE", "DROP", "FOREIGN", "INDEX", "INSERT", "INTO", "NOTHING",
            "PRIMARY", "REFERENCES", "RETURNING", "SET", "TABLE", "TO", "TRANSACTION", "UNIQUE",
            "UPDATE",
        ] {
            m.insert(word, TokenKind::Reserved);
        }
        m
    };
}

/// Map a text to a keyword or identifier token
fn keyword_or_identifier(text: &str) -> TokenKind {
    // Longest keyword is CURRENT_TIMESTAMP
    if text.len() > 17 {
        return TokenKind::Identifier;
    }
    KEYWORDS
        .get(text.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier)
}

/// Strip SQL quoting from a string literal or quoted identifier
pub fn dequote(text: &str) -> String {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.first() {
        Some(b'[') => (b'[', b']'),
        Some(&q @ (b'\'' | b'"' | b'`')) => (q, q),
        _ => return text.to_string(),
    };
    if bytes.len() < 2 || bytes[bytes.len() - 1] != close {
        return text.to_string();
    }

    let inner = &text[1..text.len() - 1];
    if open == b'[' {
        return inner.to_string();
    }
    let quote = close as char;
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

// ============================================================================
// Public API
// ============================================================================

/// Tokenize a SQL string
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(source);
    tokenizer.tokenize()
}

// ============================================================================
// Tests
// ============================================================================
