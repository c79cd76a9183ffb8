// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::io::Read;

use chrono::prelude::*;
use itertools::Itertools;

use super::super::error::ParseError;
use super::super::reader::{next_word, Cursor, WordReader};
use super::super::types::{Timescale, Version};
use super::combinator_atoms::{digit, ident, take_until, take_while};
use super::types::ParseResult;

const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: [&str; 13] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Sept", "Oct", "Nov", "Dec",
];

/// Tries to read five words, in the given order, as
/// `weekday month day hh:mm:ss year`.
pub(super) fn parse_date(
    day: &str,
    month: &str,
    date: &str,
    time: &str,
    year: &str,
) -> Option<DateTime<Utc>> {
    if !DAYS.contains(&day) || !MONTHS.contains(&month) {
        return None;
    }
    // chrono only knows the three letter abbreviation
    let month = if month == "Sept" { "Sep" } else { month };

    let date: u8 = date.parse().ok()?;
    if date == 0 || date > 31 {
        return None;
    }

    let (hh, mm, ss) = {
        let res = take_until(time, b':');
        let hh: u8 = res.assert_match()?.parse().ok()?;

        let res = take_until(&res.assert_residual()?[1..], b':');
        let mm: u8 = res.assert_match()?.parse().ok()?;

        // chop off the colon at index 0
        let ss: u8 = res.assert_residual()?[1..].parse().ok()?;

        if hh > 23 || mm > 59 || ss > 60 {
            return None;
        }
        (hh, mm, ss)
    };

    let year: i32 = year.parse().ok()?;

    let full_date = format!("{day} {month} {date} {hh:02}:{mm:02}:{ss:02} {year}");
    let naive = NaiveDateTime::parse_from_str(&full_date, "%a %b %e %T %Y").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Reads a `$date ... $end` body.
///
/// A date is typically composed of the 5 following words which can occur
/// in any order: {Day, Month, Date(number in month), hh:mm:ss, year}. So we
/// try every permutation of the five words until one parses. Dates we
/// can't make sense of are dropped rather than failing the parse.
pub(super) fn parse_date_block<R: Read>(
    word_reader: &mut WordReader<R>,
) -> Result<Option<DateTime<Utc>>, ParseError> {
    let mut words: Vec<String> = vec![];
    loop {
        let (word, _) = next_word!(word_reader)?;
        if word == "$end" {
            break;
        }
        words.push(word.to_string());
    }

    let date = match words.len() {
        1 => DateTime::parse_from_rfc3339(&words[0])
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        5 => words
            .iter()
            .permutations(5)
            .find_map(|p| parse_date(p[0], p[1], p[2], p[3], p[4])),
        _ => None,
    };

    if date.is_none() {
        clilog::debug!("could not make sense of $date `{}`", words.join(" "));
    }
    Ok(date)
}

pub(super) fn parse_version<R: Read>(
    word_reader: &mut WordReader<R>,
) -> Result<Version, ParseError> {
    let mut version: Vec<String> = vec![];

    loop {
        let (word, _) = next_word!(word_reader)?;

        if word == "$end" {
            return Ok(Version(version.join(" ")));
        }
        version.push(word.to_string());
    }
}

pub(super) fn parse_timescale<R: Read>(
    word_reader: &mut WordReader<R>,
) -> Result<(Option<u32>, Timescale), ParseError> {
    // we might see `1ps $end` or `1 ps $end`
    // first get timescale
    let (word, cursor) = next_word!(word_reader)?;
    let ParseResult { matched, residual } = take_while(word, digit);

    let scalar: u32 = matched
        .parse()
        .map_err(|_| ParseError::malformed_decl(&cursor, format!("bad timescale `{word}`")))?;

    let timescale = if residual.is_empty() {
        let (word, cursor) = next_word!(word_reader)?;
        (Some(scalar), timescale_unit(word, &cursor)?)
    } else {
        (Some(scalar), timescale_unit(residual, &cursor)?)
    };

    // then check for the `$end` keyword
    ident(word_reader, "$end")?;

    Ok(timescale)
}

fn timescale_unit(unit: &str, cursor: &Cursor) -> Result<Timescale, ParseError> {
    Timescale::from_unit(unit)
        .ok_or_else(|| ParseError::malformed_decl(cursor, format!("unknown time unit `{unit}`")))
}
