// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::io::Read;

use super::super::error::ParseError;
use super::super::reader::{next_word, WordReader};
use super::types::ParseResult;

pub(super) fn digit(chr: u8) -> bool {
    chr.is_ascii_digit()
}

pub(super) fn take_until(word: &str, pattern: u8) -> ParseResult<'_> {
    let new_start = word
        .bytes()
        .position(|chr| chr == pattern)
        .unwrap_or(word.len());

    ParseResult {
        matched: &word[0..new_start],
        residual: &word[new_start..],
    }
}

pub(super) fn take_while(word: &str, cond: fn(u8) -> bool) -> ParseResult<'_> {
    let new_start = word
        .bytes()
        .position(|chr| !cond(chr))
        .unwrap_or(word.len());

    ParseResult {
        matched: &word[0..new_start],
        residual: &word[new_start..],
    }
}

/// Consumes the next word, which must be `keyword`.
pub(super) fn ident<R: Read>(
    word_reader: &mut WordReader<R>,
    keyword: &str,
) -> Result<(), ParseError> {
    let (word, cursor) = next_word!(word_reader)?;

    if word == keyword {
        Ok(())
    } else {
        Err(ParseError::malformed_decl(
            &cursor,
            format!("found keyword `{word}` but expected `{keyword}`"),
        ))
    }
}
