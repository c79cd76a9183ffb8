// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Errors produced while ingesting a vcd file.
//!
//! Every variant is fatal for the two-pass session that raised it: a model
//! is either fully populated or not handed out at all.

use std::io;

use super::reader::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// An identifier code was empty, used a byte outside `!`..=`~`, or
    /// decoded to a value outside the file identifier space.
    #[error("invalid identifier `{ident}`{}", at_cursor(.cursor))]
    InvalidIdentifier {
        ident: String,
        cursor: Option<Cursor>,
    },

    /// `$upscope` without a matching `$scope`, or scopes still open at
    /// `$enddefinitions`.
    #[error("unbalanced scopes at {cursor}: {reason}")]
    StructuralMismatch { cursor: Cursor, reason: String },

    #[error("malformed declaration at {cursor}: {reason}")]
    MalformedDeclaration { cursor: Cursor, reason: String },

    #[error("malformed value change `{word}` at {cursor}")]
    MalformedValueChange { cursor: Cursor, word: String },

    #[error("failed to parse timestamp `{word}` at {cursor}")]
    InvalidTimestamp { cursor: Cursor, word: String },

    #[error("timestamp #{next} at {cursor} is earlier than the previous timestamp #{prev}")]
    TimeWentBackwards { cursor: Cursor, prev: u64, next: u64 },

    /// The value pass disagreed with the event count taken by the structure
    /// pass for this identifier.
    #[error(
        "identifier {id} expected exactly {capacity} value changes but the value pass saw {seen}"
    )]
    ChangeCountMismatch { id: u64, capacity: usize, seen: usize },

    #[error("reached end of file while parsing near line {line}")]
    UnexpectedEof { line: usize },

    #[error("parse interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn at_cursor(cursor: &Option<Cursor>) -> String {
    match cursor {
        Some(cursor) => format!(" at {cursor}"),
        None => String::new(),
    }
}

impl ParseError {
    pub(crate) fn malformed_decl(cursor: &Cursor, reason: impl Into<String>) -> Self {
        ParseError::MalformedDeclaration {
            cursor: cursor.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(cursor: &Cursor, reason: impl Into<String>) -> Self {
        ParseError::StructuralMismatch {
            cursor: cursor.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcd::reader::{Line, Word};

    #[test]
    fn positional_errors_name_their_location() {
        let cursor = Cursor(Line(12), Word(3));
        let e = ParseError::mismatch(&cursor, "`$upscope` with no open scope");
        assert_eq!(
            e.to_string(),
            "unbalanced scopes at line 12, word 3: `$upscope` with no open scope"
        );
    }

    #[test]
    fn invalid_identifier_without_cursor() {
        let e = ParseError::InvalidIdentifier {
            ident: String::new(),
            cursor: None,
        };
        assert_eq!(e.to_string(), "invalid identifier ``");
    }

    #[test]
    fn count_mismatch_display() {
        let e = ParseError::ChangeCountMismatch {
            id: 4,
            capacity: 2,
            seen: 3,
        };
        assert_eq!(
            e.to_string(),
            "identifier 4 expected exactly 2 value changes but the value pass saw 3"
        );
    }

    #[test]
    fn io_errors_convert() {
        let e: ParseError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(e.to_string().starts_with("I/O error"));
    }
}
