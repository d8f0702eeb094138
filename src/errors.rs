//! Errors for pdfcore.

use std::error::Error as IError;
use std::fmt;
use std::io::Error as IoError;

/// error_chain and failure are certainly nice, but completely overengineered
/// for this use-case. For example, neither of them allow error localization.
/// Additionally, debugging macros can get hairy really quick and matching with
/// `*e.kind()` or doing From conversions for other errors is really hard to do.
///
/// So in this case, the best form of error handling is to use the simple Rust-native
/// way: Just enums, `From` + pattern matching. No macros, except for this one.
///
/// What this macro does is (simplified): `impl From<$a> for $b { $b::$variant(error) }`
macro_rules! impl_from {
    ($from:ident, $to:ident::$variant:ident) => {
        impl From<$from> for $to {
            fn from(err: $from) -> Self {
                $to::$variant(err.into())
            }
        }
    };
}

/// The full error taxonomy surfaced by every component, from the lexer up to the
/// content-stream interpreter's page-level entry points.
#[derive(Debug)]
pub enum Error {
    /// Not a PDF, or the `%PDF-M.N` header could not be parsed.
    Header,
    /// Tokenizer failure at a given byte offset.
    Lex { offset: usize, reason: String },
    /// Structural mismatch while parsing an object.
    Parse {
        offset: usize,
        expected: String,
        found: String,
    },
    /// `startxref` missing, a table/stream malformed, or a `/Prev` chain loop.
    XRef(String),
    /// Object number not present in the xref table, or a generation/header mismatch.
    Reference(u32),
    /// The xref entry for this object number marks it Free.
    NotInUse(u32),
    /// Unknown filter, predictor failure, or malformed filter input.
    Filter(String),
    /// `/ObjStm` dictionary invalid, index out of range, or extraction failed.
    ObjectStream(String),
    /// Malformed `/Pages` tree: cycle, bad `/Count`, unreachable index.
    PageTree(String),
    /// `resolve_deep` exceeded its recursion depth bound.
    Depth,
    /// Underlying file/reader I/O failure.
    Io(IoError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Error::*;
        match self {
            Header => write!(f, "not a PDF file or unparseable header"),
            Lex { offset, reason } => write!(f, "lex error at byte {offset}: {reason}"),
            Parse {
                offset,
                expected,
                found,
            } => write!(
                f,
                "parse error at byte {offset}: expected {expected}, found {found}"
            ),
            XRef(reason) => write!(f, "xref error: {reason}"),
            Reference(n) => write!(f, "object {n} not found in xref table"),
            NotInUse(n) => write!(f, "object {n} is marked free in the xref table"),
            Filter(name) => write!(f, "filter error: {name}"),
            ObjectStream(reason) => write!(f, "object stream error: {reason}"),
            PageTree(reason) => write!(f, "page tree error: {reason}"),
            Depth => write!(f, "reference resolution exceeded the maximum depth bound"),
            Io(e) => write!(f, "{e}"),
        }
    }
}

impl IError for Error {}

impl_from!(IoError, Error::Io);

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset_for_lex_errors() {
        let e = Error::Lex {
            offset: 42,
            reason: "unterminated string".into(),
        };
        assert_eq!(e.to_string(), "lex error at byte 42: unterminated string");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = IoError::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
