//! Errors raised while loading a document.
//!
//! Every error aborts the parse; no partial document is ever returned.

use thiserror::Error;

/// Errors that can occur while turning markup into a [`Document`](crate::Document).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed markup at byte {offset}: {message}")]
    Markup { offset: u64, message: String },

    #[error("Not a recognized document: expected <{expected}> root, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Document has more than one root element (<{0}>)")]
    MultipleRoots(String),

    #[error("Document has no root element")]
    EmptyDocument,

    #[error("Unable to pop frame: no element is open")]
    StackUnderflow,

    #[error("Input ended with {0} element(s) still open")]
    UnclosedElements(usize),

    #[error("An earlier error aborted this load; no document is available")]
    Aborted,

    #[error("<{tag}> declares sid \"{sid}\" but no enclosing element opens a scope")]
    NoEnclosingScope { tag: String, sid: String },

    #[error("<{tag}> requires attribute \"{attribute}\"")]
    MissingAttribute { tag: String, attribute: String },

    #[error("Unknown schema \"{0}\"")]
    UnknownSchema(String),

    #[error("Unexpected element <{tag}> inside <{parent}>")]
    UnknownElement { parent: String, tag: String },

    #[error("Schema alias \"{0}\" never reaches a schema node")]
    AliasCycle(String),

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Invalid boolean: {0}")]
    InvalidBoolean(String),

    #[error("Unsupported {tag} version {found} (supported: {supported})")]
    UnsupportedVersion {
        tag: String,
        found: String,
        supported: String,
    },
}

/// Broad error classes callers can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document shape is wrong: root mismatch, unbalanced stack, missing scope.
    Structural,
    /// An element violates what its schema requires.
    Schema,
    /// The root declares a version outside the supported set.
    UnsupportedVersion,
    /// The tokenizer rejected the markup itself.
    Markup,
    Io,
}

impl ParseError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Io(_) => ErrorKind::Io,
            ParseError::Xml(_) | ParseError::Markup { .. } => ErrorKind::Markup,
            ParseError::UnexpectedRoot { .. }
            | ParseError::MultipleRoots(_)
            | ParseError::EmptyDocument
            | ParseError::StackUnderflow
            | ParseError::UnclosedElements(_)
            | ParseError::Aborted
            | ParseError::NoEnclosingScope { .. } => ErrorKind::Structural,
            ParseError::MissingAttribute { .. }
            | ParseError::UnknownSchema(_)
            | ParseError::UnknownElement { .. }
            | ParseError::AliasCycle(_)
            | ParseError::InvalidNumber(_)
            | ParseError::InvalidBoolean(_) => ErrorKind::Schema,
            ParseError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;
