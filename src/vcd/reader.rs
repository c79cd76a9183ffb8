// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::io::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line(pub usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word(pub usize);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub Line, pub Word);

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Cursor(Line(line), Word(word)) = self;
        write!(f, "line {line}, word {word}")
    }
}

/// Splits a vcd stream into whitespace separated words, one line at a time.
///
/// Words are handed out as slices of the current line buffer, so the buffer
/// is only refilled once every word of the previous line has been consumed.
pub struct WordReader<R: Read> {
    reader: io::BufReader<R>,
    eof: bool,
    buffer: String,
    curr_line: usize,
    bytes_read: u64,
    // (start, end, word index within the line)
    str_slices: VecDeque<(usize, usize, usize)>,
}

impl<R: Read> WordReader<R> {
    pub fn new(file: R) -> WordReader<R> {
        WordReader {
            reader: io::BufReader::new(file),
            eof: false,
            buffer: String::new(),
            curr_line: 0,
            bytes_read: 0,
            str_slices: VecDeque::new(),
        }
    }

    /// Total number of bytes pulled from the underlying stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn line(&self) -> usize {
        self.curr_line
    }

    pub fn next_word(&mut self) -> io::Result<Option<(&str, Cursor)>> {
        // if there are no more words in the buffer, keep reading lines until
        // we find one that isn't blank or hit the end of the file
        while self.str_slices.is_empty() {
            if self.eof {
                return Ok(None);
            }

            self.buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.buffer)?;
            if bytes_read == 0 {
                self.eof = true;
                return Ok(None);
            }
            self.bytes_read += bytes_read as u64;
            self.curr_line += 1;

            let base = self.buffer.as_ptr() as usize;
            for (word_idx, word) in self.buffer.split_ascii_whitespace().enumerate() {
                let start = word.as_ptr() as usize - base;
                self.str_slices
                    .push_back((start, start + word.len(), word_idx + 1));
            }
        }

        let Some((start, end, word_idx)) = self.str_slices.pop_front() else {
            return Ok(None);
        };
        let cursor = Cursor(Line(self.curr_line), Word(word_idx));
        Ok(Some((&self.buffer[start..end], cursor)))
    }
}

/// Fetches the next word, treating end of file as an error.
macro_rules! next_word {
    ($word_reader:ident) => {{
        let line = $word_reader.line();
        $word_reader
            .next_word()?
            .ok_or($crate::vcd::error::ParseError::UnexpectedEof { line })
    }};
}

/// Skips words up to and including the next `$end`.
macro_rules! skip_to_end {
    ($word_reader:ident) => {{
        loop {
            let (word, _) = $crate::vcd::reader::next_word!($word_reader)?;
            if word == "$end" {
                break;
            }
        }
    }};
}

pub(crate) use next_word;
pub(crate) use skip_to_end;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_carry_line_and_position() {
        let text = "$scope module top $end\n\n  #5\t1!\n";
        let mut reader = WordReader::new(text.as_bytes());

        let mut words = vec![];
        while let Some((word, cursor)) = reader.next_word().unwrap() {
            words.push((word.to_string(), cursor));
        }

        assert_eq!(words.len(), 6);
        assert_eq!(words[0].0, "$scope");
        assert_eq!(words[0].1, Cursor(Line(1), Word(1)));
        assert_eq!(words[4].0, "#5");
        assert_eq!(words[4].1, Cursor(Line(3), Word(1)));
        assert_eq!(words[5].0, "1!");
        assert_eq!(reader.bytes_read(), text.len() as u64);
    }

    #[test]
    fn eof_is_sticky() {
        let mut reader = WordReader::new("only".as_bytes());
        assert!(reader.next_word().unwrap().is_some());
        assert!(reader.next_word().unwrap().is_none());
        assert!(reader.next_word().unwrap().is_none());
    }

    #[test]
    fn next_word_macro_reports_eof() {
        fn grab(reader: &mut WordReader<&[u8]>) -> Result<String, crate::vcd::error::ParseError> {
            let word_reader = reader;
            let (word, _) = next_word!(word_reader)?;
            Ok(word.to_string())
        }
        let mut reader = WordReader::new("one".as_bytes());
        assert_eq!(grab(&mut reader).unwrap(), "one");
        assert!(matches!(
            grab(&mut reader),
            Err(crate::vcd::error::ParseError::UnexpectedEof { .. })
        ));
    }
}
