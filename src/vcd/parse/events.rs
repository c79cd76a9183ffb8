// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! The token loop both passes run over the file.
//!
//! Keeping a single recognizer for timestamps and value changes means the
//! structure pass counts exactly the changes the value pass later stores.

use std::io::Read;

use super::super::error::ParseError;
use super::super::reader::{next_word, skip_to_end, Cursor, WordReader};
use super::ScanObserver;

/// `$` keywords the passes care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Keyword {
    Date,
    Version,
    Timescale,
    Scope,
    Upscope,
    Var,
    EndDefinitions,
    Comment,
    // $dumpvars, $dumpall, $dumpon, $dumpoff
    Dump,
    End,
    Other(String),
}

impl Keyword {
    fn from_word(word: &str) -> Keyword {
        match word {
            "$date" => Keyword::Date,
            "$version" => Keyword::Version,
            "$timescale" => Keyword::Timescale,
            "$scope" => Keyword::Scope,
            "$upscope" => Keyword::Upscope,
            "$var" => Keyword::Var,
            "$enddefinitions" => Keyword::EndDefinitions,
            "$comment" => Keyword::Comment,
            "$dumpvars" | "$dumpall" | "$dumpon" | "$dumpoff" => Keyword::Dump,
            "$end" => Keyword::End,
            other => Keyword::Other(other.to_string()),
        }
    }
}

/// A value as it appears in the dump, before it is turned into a stored
/// [`Value`](super::super::signal::Value).
#[derive(Debug, Clone, PartialEq)]
pub(super) enum RawValue<'a> {
    Scalar(u8),
    Vector(&'a str),
    Real(f64),
    Str(&'a str),
}

pub(super) trait Pass {
    /// Whether `$comment` bodies should be handed to the observer.
    const FORWARDS_COMMENTS: bool;

    /// Handles a declaration keyword. Must consume the words belonging to
    /// it, up to and including its `$end`.
    fn keyword<R: Read>(
        &mut self,
        keyword: Keyword,
        cursor: &Cursor,
        word_reader: &mut WordReader<R>,
    ) -> Result<(), ParseError>;

    fn timestamp(&mut self, timestamp: u64, cursor: &Cursor) -> Result<(), ParseError>;

    fn change(&mut self, ident: &str, value: RawValue<'_>, cursor: &Cursor)
        -> Result<(), ParseError>;
}

fn is_scalar_value(chr: u8) -> bool {
    matches!(
        chr,
        b'0' | b'1'
            | b'x'
            | b'X'
            | b'z'
            | b'Z'
            | b'u'
            | b'U'
            | b'w'
            | b'W'
            | b'l'
            | b'L'
            | b'h'
            | b'H'
            | b'-'
    )
}

fn read_comment<R: Read>(word_reader: &mut WordReader<R>) -> Result<String, ParseError> {
    let mut words: Vec<String> = vec![];
    loop {
        let (word, _) = next_word!(word_reader)?;
        if word == "$end" {
            return Ok(words.join(" "));
        }
        words.push(word.to_string());
    }
}

/// Runs `pass` over every remaining word of the file.
///
/// The interrupt flag is polled before every token, and the observer hears
/// about progress whenever a new line has been pulled in.
pub(super) fn scan<R: Read, P: Pass>(
    word_reader: &mut WordReader<R>,
    pass: &mut P,
    observer: &mut dyn ScanObserver,
) -> Result<(), ParseError> {
    let mut reported = 0u64;
    // holds the value of a `b`/`r`/`s` change while its identifier is read
    let mut value = String::new();

    loop {
        if observer.interrupted() {
            return Err(ParseError::Interrupted);
        }
        if word_reader.bytes_read() != reported {
            reported = word_reader.bytes_read();
            observer.progress(reported);
        }

        let Some((word, cursor)) = word_reader.next_word()? else {
            break;
        };

        let first = word.as_bytes()[0];
        match first {
            b'$' => match Keyword::from_word(word) {
                Keyword::Dump | Keyword::End => {}
                Keyword::Comment if P::FORWARDS_COMMENTS => {
                    let text = read_comment(word_reader)?;
                    observer.comment(&text);
                }
                Keyword::Comment => skip_to_end!(word_reader),
                keyword => pass.keyword(keyword, &cursor, word_reader)?,
            },
            b'#' => {
                let timestamp = word[1..].parse::<u64>().map_err(|_| ParseError::InvalidTimestamp {
                    cursor: cursor.clone(),
                    word: word.to_string(),
                })?;
                pass.timestamp(timestamp, &cursor)?;
            }

            // handle the case of a one bit signal, e.g. `1!` or `x#a`
            chr if is_scalar_value(chr) => {
                let ident = &word[1..];
                if ident.is_empty() {
                    return Err(ParseError::MalformedValueChange {
                        cursor,
                        word: word.to_string(),
                    });
                }
                pass.change(ident, RawValue::Scalar(chr), &cursor)?;
            }

            // handle the case of a value followed by a separate identifier,
            // e.g. `b1010 !`, `r1.5 "` or `sIDLE #`
            b'b' | b'B' | b'r' | b'R' | b's' | b'S' => {
                value.clear();
                value.push_str(&word[1..]);

                let (ident, _) = next_word!(word_reader)?;
                let raw = match first {
                    b'b' | b'B' => RawValue::Vector(&value),
                    b'r' | b'R' => RawValue::Real(value.parse::<f64>().map_err(|_| {
                        ParseError::MalformedValueChange {
                            cursor: cursor.clone(),
                            word: format!("r{value}"),
                        }
                    })?),
                    _ => RawValue::Str(&value),
                };
                pass.change(ident, raw, &cursor)?;
            }
            _ => {
                return Err(ParseError::MalformedValueChange {
                    cursor,
                    word: word.to_string(),
                })
            }
        }
    }

    observer.progress(word_reader.bytes_read());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::Unobserved;
    use super::*;

    /// Records everything it is handed.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl Pass for Recorder {
        const FORWARDS_COMMENTS: bool = false;

        fn keyword<R: Read>(
            &mut self,
            keyword: Keyword,
            _cursor: &Cursor,
            word_reader: &mut WordReader<R>,
        ) -> Result<(), ParseError> {
            self.seen.push(format!("{keyword:?}"));
            skip_to_end!(word_reader);
            Ok(())
        }

        fn timestamp(&mut self, timestamp: u64, _cursor: &Cursor) -> Result<(), ParseError> {
            self.seen.push(format!("#{timestamp}"));
            Ok(())
        }

        fn change(
            &mut self,
            ident: &str,
            value: RawValue<'_>,
            _cursor: &Cursor,
        ) -> Result<(), ParseError> {
            self.seen.push(format!("{value:?} {ident}"));
            Ok(())
        }
    }

    fn run(text: &str) -> Result<Vec<String>, ParseError> {
        let mut recorder = Recorder::default();
        scan(
            &mut WordReader::new(text.as_bytes()),
            &mut recorder,
            &mut Unobserved,
        )?;
        Ok(recorder.seen)
    }

    #[test]
    fn recognizes_every_change_form() {
        let seen = run("#0 $dumpvars 1! x\" b1010 # B0 $a r1.5 % sIDLE & $end #15 -!").unwrap();
        assert_eq!(
            seen,
            [
                "#0",
                "Scalar(49) !",
                "Scalar(120) \"",
                "Vector(\"1010\") #",
                "Vector(\"0\") $a",
                "Real(1.5) %",
                "Str(\"IDLE\") &",
                "#15",
                "Scalar(45) !",
            ]
        );
    }

    #[test]
    fn declarations_go_to_the_pass_and_comments_are_skipped() {
        let seen = run("$comment 1! #3 $end $var wire 1 ! a $end $upscope $end 0!").unwrap();
        assert_eq!(seen, ["Var", "Upscope", "Scalar(48) !"]);
    }

    #[test]
    fn unknown_keywords_reach_the_pass() {
        let seen = run("$attrbegin misc 07 x 1 $end").unwrap();
        assert_eq!(seen, ["Other(\"$attrbegin\")"]);
    }

    #[test]
    fn malformed_tokens() {
        assert!(matches!(
            run("#12a"),
            Err(ParseError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            run("#-3"),
            Err(ParseError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            run("1"),
            Err(ParseError::MalformedValueChange { .. })
        ));
        assert!(matches!(
            run("q!"),
            Err(ParseError::MalformedValueChange { .. })
        ));
        assert!(matches!(
            run("rfoo !"),
            Err(ParseError::MalformedValueChange { .. })
        ));
        assert!(matches!(
            run("b0101"),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    struct StopAfter(usize);

    impl ScanObserver for StopAfter {
        fn interrupted(&self) -> bool {
            self.0 == 0
        }
        fn progress(&mut self, _bytes_read: u64) {
            self.0 = self.0.saturating_sub(1);
        }
    }

    #[test]
    fn interrupt_is_seen_between_lines() {
        let text = "#0\n1!\n#1\n0!\n";
        let mut recorder = Recorder::default();
        let res = scan(
            &mut WordReader::new(text.as_bytes()),
            &mut recorder,
            &mut StopAfter(1),
        );
        assert!(matches!(res, Err(ParseError::Interrupted)));
        // the flag went up while the second line was being read; nothing
        // after it was handed to the pass
        assert_eq!(recorder.seen, ["#0", "Scalar(49) !"]);
    }
}
