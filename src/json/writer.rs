//! Streaming JSON text writer
//!
//! Output is pretty-printed with two spaces per nesting level. A value that
//! follows a key is written inline after `"key": `; every other element
//! starts on a new line, preceded by a comma when it is not the first in
//! its container.

use std::fmt::Write as _;

use tracing::warn;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

impl Container {
    fn opener(self) -> char {
        match self {
            Container::Object => '{',
            Container::Array => '[',
        }
    }

    fn closer(self) -> char {
        match self {
            Container::Object => '}',
            Container::Array => ']',
        }
    }
}

/// Writer state captured when the capacity bound was hit
#[derive(Debug, Clone)]
struct Overflow {
    open: Vec<Container>,
    dangling_key: bool,
}

/// JSON writer for one document.
///
/// Callers must balance every `begin_*` with the matching `end_*`. With a
/// capacity bound, each token is appended whole or not at all; the first
/// token that does not fit freezes the writer, and [`JsonWriter::finish`]
/// closes whatever was open at that point.
#[derive(Debug)]
pub struct JsonWriter {
    buf: String,
    need_comma: bool,
    after_key: bool,
    /// Open containers, innermost last; its length is the nesting depth
    open: Vec<Container>,
    capacity: Option<usize>,
    overflow: Option<Overflow>,
}

impl JsonWriter {
    /// Create an unbounded writer
    pub fn new() -> Self {
        JsonWriter::with_limit(None)
    }

    /// Create a writer that stops appending after `limit` bytes
    pub fn with_limit(limit: Option<usize>) -> Self {
        JsonWriter {
            buf: String::new(),
            need_comma: false,
            after_key: false,
            open: Vec::new(),
            capacity: limit,
            overflow: None,
        }
    }

    /// Reset to an empty document
    pub fn begin(&mut self) {
        self.buf.clear();
        self.need_comma = false;
        self.after_key = false;
        self.open.clear();
        self.overflow = None;
    }

    pub fn begin_object(&mut self) {
        self.open_container(Container::Object);
    }

    pub fn end_object(&mut self) {
        self.close_container(Container::Object);
    }

    pub fn begin_array(&mut self) {
        self.open_container(Container::Array);
    }

    pub fn end_array(&mut self) {
        self.close_container(Container::Array);
    }

    /// Write an object key; the next value goes on the same line
    pub fn key(&mut self, key: &str) {
        let mut piece = String::with_capacity(key.len() + 8);
        if self.need_comma {
            piece.push(',');
        }
        push_newline(&mut piece, self.open.len());
        push_quoted(&mut piece, key);
        piece.push_str(": ");

        if self.commit(&piece) {
            self.need_comma = false;
            self.after_key = true;
        }
    }

    pub fn string(&mut self, value: &str) {
        let mut token = String::with_capacity(value.len() + 2);
        push_quoted(&mut token, value);
        self.value(&token);
    }

    pub fn number(&mut self, value: i64) {
        self.value(&value.to_string());
    }

    pub fn boolean(&mut self, value: bool) {
        self.value(if value { "true" } else { "false" });
    }

    pub fn null(&mut self) {
        self.value("null");
    }

    /// `"key": "value"`, or `"key": null` for `None`
    pub fn key_string(&mut self, key: &str, value: Option<&str>) {
        self.key(key);
        match value {
            Some(value) => self.string(value),
            None => self.null(),
        }
    }

    pub fn key_bool(&mut self, key: &str, value: bool) {
        self.key(key);
        self.boolean(value);
    }

    pub fn key_null(&mut self, key: &str) {
        self.key(key);
        self.null();
    }

    /// Whether the capacity bound cut the document short
    pub fn is_truncated(&self) -> bool {
        self.overflow.is_some()
    }

    /// Text written so far
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Finish the document and return its text.
    ///
    /// A truncated document gets `null` for a key left without a value and
    /// a closer for every container that was still open.
    pub fn finish(mut self) -> String {
        if let Some(overflow) = self.overflow.take() {
            if self.buf.is_empty() {
                self.buf.push_str("null");
                return self.buf;
            }
            if overflow.dangling_key {
                self.buf.push_str("null");
            }
            for (depth, container) in overflow.open.iter().enumerate().rev() {
                push_newline(&mut self.buf, depth);
                self.buf.push(container.closer());
            }
        }
        self.buf
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn value(&mut self, token: &str) {
        let mut piece = String::with_capacity(token.len() + 2 * self.open.len() + 2);
        self.push_element_prefix(&mut piece);
        piece.push_str(token);

        if self.commit(&piece) {
            self.after_key = false;
            self.need_comma = true;
        }
    }

    fn open_container(&mut self, container: Container) {
        let mut piece = String::with_capacity(2 * self.open.len() + 2);
        self.push_element_prefix(&mut piece);
        piece.push(container.opener());

        if self.commit(&piece) {
            self.after_key = false;
            self.need_comma = false;
            self.open.push(container);
        }
    }

    fn close_container(&mut self, container: Container) {
        if self.is_truncated() {
            return;
        }
        debug_assert_eq!(self.open.last().copied(), Some(container));

        let mut piece = String::new();
        push_newline(&mut piece, self.open.len().saturating_sub(1));
        piece.push(container.closer());

        if self.commit(&piece) {
            self.open.pop();
            self.after_key = false;
            self.need_comma = true;
        }
    }

    /// Comma, newline and indentation owed before the next element
    fn push_element_prefix(&self, piece: &mut String) {
        if !self.after_key {
            if self.need_comma {
                piece.push(',');
            }
            push_newline(piece, self.open.len());
        }
    }

    /// Append `piece` whole, or freeze the writer if it would not fit
    fn commit(&mut self, piece: &str) -> bool {
        if self.overflow.is_some() {
            return false;
        }

        if let Some(limit) = self.capacity {
            if self.buf.len() + piece.len() > limit {
                warn!(
                    limit,
                    written = self.buf.len(),
                    depth = self.open.len(),
                    "JSON output truncated at capacity limit"
                );
                self.overflow = Some(Overflow {
                    open: self.open.clone(),
                    dangling_key: self.after_key,
                });
                return false;
            }
        }

        self.buf.push_str(piece);
        true
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        JsonWriter::new()
    }
}

fn push_newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

/// Append `text` as a quoted JSON string
fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
