//! Compile error type
//!
//! One structured error per failed compilation unit. Every error carries a
//! category, and where available the source position of the offending token
//! and the word under definition. Compilation never continues past the
//! first error; the compiler instance should be discarded afterwards.

/// Error categories, matching the compiler's failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tokenizer failures: unterminated string, invalid escape, bad number.
    Lex,
    /// Grammar failures: unexpected token, unmatched delimiter.
    Parse,
    /// Signature violations, unification conflicts, unknown words.
    Type,
    /// Compile-time stack under/overflow, quotation stack misuse.
    Stack,
    /// Capacity limits: quotation depth, array depth, cache sizes.
    Resource,
    /// Blob store read/write failures.
    Io,
    /// Loader failures: missing blobs, unknown primitive IDs, bad streams.
    Link,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Lex => "lex",
            ErrorKind::Parse => "parse",
            ErrorKind::Type => "type",
            ErrorKind::Stack => "stack",
            ErrorKind::Resource => "resource",
            ErrorKind::Io => "io",
            ErrorKind::Link => "link",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    /// 0-indexed (line, column); rendered 1-indexed for display.
    pub position: Option<(usize, usize)>,
    /// Word under definition when the error fired.
    pub word: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            message: message.into(),
            position: None,
            word: None,
        }
    }

    pub fn lex(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn stack(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Stack, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn link(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Link, message)
    }

    /// Attach a source position (0-indexed) unless one is already set.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        if self.position.is_none() {
            self.position = Some((line, column));
        }
        self
    }

    /// Attach the word under definition unless one is already set.
    pub fn in_word(mut self, name: &str) -> Self {
        if self.word.is_none() {
            self.word = Some(name.to_string());
        }
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error", self.kind)?;
        if let Some((line, column)) = self.position {
            write!(f, " at line {}, column {}", line + 1, column + 1)?;
        }
        if let Some(word) = &self.word {
            write!(f, " in word '{word}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        CompileError::io(err.to_string())
    }
}
