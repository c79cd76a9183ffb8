// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::ParseConfig;

use super::error::ParseError;
use super::ident::try_decode;
use super::reader::{skip_to_end, Cursor, Line, Word, WordReader};
use super::signal::Value;
use super::store::{BindStores, IdTable, StoreTable};
use super::timebase::TimeBase;
use super::types::VCD;

mod combinator_atoms;

mod types;

mod metadata;
use metadata::*;

mod scopes;
use scopes::*;

mod events;
use events::*;

/// Hooks a pass calls while it streams through the file.
pub trait ScanObserver {
    /// Polled before every token. Returning `true` aborts the pass with
    /// [`ParseError::Interrupted`].
    fn interrupted(&self) -> bool {
        false
    }

    /// Bytes consumed so far by the current pass.
    fn progress(&mut self, _bytes_read: u64) {}

    /// Body of a `$comment` block, seen during the structure pass.
    fn comment(&mut self, text: &str) {
        clilog::debug!("vcd comment: {text}");
    }
}

/// Observer for callers that don't watch the parse.
pub struct Unobserved;

impl ScanObserver for Unobserved {}

/// Everything the structure pass learned: the frozen signal tree, plus the
/// per-identifier counts used to size the change stores.
#[derive(Debug)]
pub struct Analysis {
    pub(crate) vcd: VCD,
    pub(crate) counts: IdTable<u64>,
    pub(crate) widths: IdTable<u32>,
    pub(crate) max_var_id: u64,
    pub(crate) min_interval: Option<u64>,
    pub(crate) last_timestamp: Option<u64>,
}

impl Analysis {
    pub fn vcd(&self) -> &VCD {
        &self.vcd
    }

    pub fn max_var_id(&self) -> u64 {
        self.max_var_id
    }

    /// Number of value changes counted for `id`.
    pub fn count(&self, id: u64) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn total_changes(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn min_interval(&self) -> Option<u64> {
        self.min_interval
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }
}

struct StructurePass {
    vcd: VCD,
    decls: Declarations,
    frozen: bool,
    counts: IdTable<u64>,
    min_interval: Option<u64>,
    last_timestamp: Option<u64>,
}

impl Pass for StructurePass {
    const FORWARDS_COMMENTS: bool = true;

    fn keyword<R: Read>(
        &mut self,
        keyword: Keyword,
        cursor: &Cursor,
        word_reader: &mut WordReader<R>,
    ) -> Result<(), ParseError> {
        if self.frozen {
            match keyword {
                Keyword::Other(other) => {
                    clilog::debug!("skipping unknown keyword `{other}` at {cursor}")
                }
                other => clilog::warn!(
                    "ignoring {other:?} after $enddefinitions at {cursor}"
                ),
            }
            skip_to_end!(word_reader);
            return Ok(());
        }

        match keyword {
            Keyword::Date => self.vcd.metadata.date = parse_date_block(word_reader)?,
            Keyword::Version => self.vcd.metadata.version = Some(parse_version(word_reader)?),
            Keyword::Timescale => self.vcd.metadata.timescale = parse_timescale(word_reader)?,
            Keyword::Scope => self.decls.parse_scope(word_reader, &mut self.vcd, cursor)?,
            Keyword::Upscope => self.decls.parse_upscope(word_reader, cursor)?,
            Keyword::Var => {
                let info = parse_var(word_reader, cursor)?;
                self.decls.add_var(info, &mut self.vcd, cursor)?;
            }
            Keyword::EndDefinitions => {
                skip_to_end!(word_reader);
                self.decls.finish(cursor)?;
                self.frozen = true;
            }
            // we ignore keywords we don't know about, things like
            // `$attrbegin` from newer producers
            Keyword::Other(other) => {
                clilog::debug!("skipping unknown keyword `{other}` at {cursor}");
                skip_to_end!(word_reader);
            }
            Keyword::Comment | Keyword::Dump | Keyword::End => {}
        }
        Ok(())
    }

    fn timestamp(&mut self, timestamp: u64, cursor: &Cursor) -> Result<(), ParseError> {
        if let Some(prev) = self.last_timestamp {
            if timestamp < prev {
                return Err(ParseError::TimeWentBackwards {
                    cursor: cursor.clone(),
                    prev,
                    next: timestamp,
                });
            }
            let interval = timestamp - prev;
            if interval > 0 {
                self.min_interval = Some(self.min_interval.map_or(interval, |min| min.min(interval)));
            }
        }
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    fn change(&mut self, ident: &str, _value: RawValue<'_>, cursor: &Cursor) -> Result<(), ParseError> {
        let id = try_decode(ident.as_bytes())
            .filter(|id| *id <= MAX_VAR_ID)
            .ok_or_else(|| ParseError::InvalidIdentifier {
                ident: ident.to_string(),
                cursor: Some(cursor.clone()),
            })?;

        *self.counts.get_or_insert_with(id, || 0) += 1;
        Ok(())
    }
}

/// First pass: reads the declarations into a signal tree, counts the value
/// changes of every identifier and measures the timestamps.
pub fn analyze<R: Read>(
    word_reader: &mut WordReader<R>,
    observer: &mut dyn ScanObserver,
) -> Result<Analysis, ParseError> {
    let vcd = VCD::new();
    let mut pass = StructurePass {
        decls: Declarations::new(vcd.root_scope),
        vcd,
        frozen: false,
        counts: IdTable::default(),
        min_interval: None,
        last_timestamp: None,
    };

    scan(word_reader, &mut pass, observer)?;

    if !pass.frozen {
        // a file cut short before `$enddefinitions` still gets its tree
        // checked for balance
        let line = word_reader.line();
        clilog::warn!("no $enddefinitions found before end of file (line {line})");
        pass.decls.finish(&Cursor(Line(line), Word(0)))?;
    }

    let StructurePass {
        vcd,
        decls,
        counts,
        min_interval,
        last_timestamp,
        ..
    } = pass;

    clilog::debug!(
        "structure pass: {} scopes, {} signals, {} value changes, ids up to {}",
        vcd.all_scopes.len(),
        vcd.all_signals.len(),
        counts.iter().map(|(_, count)| count).sum::<u64>(),
        decls.max_var_id
    );

    Ok(Analysis {
        vcd,
        counts,
        widths: decls.widths,
        max_var_id: decls.max_var_id,
        min_interval,
        last_timestamp,
    })
}

/// Fixes the time base, sizes one change store per declared identifier and
/// binds every vector signal to its store.
pub fn allocate(analysis: Analysis, time_ratio: u64) -> VCD {
    let Analysis {
        mut vcd,
        counts,
        widths,
        max_var_id,
        min_interval,
        last_timestamp,
    } = analysis;

    vcd.time_base = TimeBase::compute(
        vcd.metadata.timescale,
        min_interval,
        last_timestamp.unwrap_or(0),
        time_ratio,
    );
    let (magnitude, unit) = vcd.time_base.display_scale();
    clilog::debug!(
        "time divide {} (delta {}), display unit {magnitude} {}",
        vcd.time_base.time_divide,
        vcd.time_base.time_scale_delta,
        unit.as_str()
    );

    let stores = StoreTable::allocate(&counts, &widths, max_var_id);
    vcd.walk_mut(&mut BindStores { stores: &stores });
    vcd.stores = stores;
    vcd
}

struct ValuePass<'a> {
    stores: &'a mut StoreTable,
    time_base: TimeBase,
    curr_time: u64,
    undeclared: HashSet<u64>,
}

impl Pass for ValuePass<'_> {
    const FORWARDS_COMMENTS: bool = false;

    fn keyword<R: Read>(
        &mut self,
        _keyword: Keyword,
        _cursor: &Cursor,
        word_reader: &mut WordReader<R>,
    ) -> Result<(), ParseError> {
        // declarations were handled by the structure pass
        skip_to_end!(word_reader);
        Ok(())
    }

    fn timestamp(&mut self, timestamp: u64, _cursor: &Cursor) -> Result<(), ParseError> {
        self.curr_time = self.time_base.normalize(timestamp);
        Ok(())
    }

    fn change(&mut self, ident: &str, value: RawValue<'_>, cursor: &Cursor) -> Result<(), ParseError> {
        let id = try_decode(ident.as_bytes()).ok_or_else(|| ParseError::InvalidIdentifier {
            ident: ident.to_string(),
            cursor: Some(cursor.clone()),
        })?;

        let Some(store) = self.stores.get_mut(id) else {
            if self.undeclared.insert(id) {
                clilog::debug!("value change for undeclared identifier `{ident}` at {cursor}");
            }
            return Ok(());
        };

        let value = match value {
            RawValue::Scalar(chr) => Value::Scalar(chr),
            RawValue::Vector(bits) => Value::Vector(bits.into()),
            RawValue::Real(real) => Value::Real(real),
            RawValue::Str(string) => Value::Str(string.into()),
        };
        store.push(self.curr_time, value)
    }
}

/// Second pass: re-reads the file from the start and fills the stores
/// sized by [`allocate`].
pub fn parse_values<R: Read>(
    word_reader: &mut WordReader<R>,
    vcd: &mut VCD,
    observer: &mut dyn ScanObserver,
) -> Result<(), ParseError> {
    let mut pass = ValuePass {
        stores: &mut vcd.stores,
        time_base: vcd.time_base,
        curr_time: 0,
        undeclared: HashSet::new(),
    };
    scan(word_reader, &mut pass, observer)?;

    vcd.stores.verify_filled()?;
    clilog::debug!("value pass: stored {} changes", vcd.stores.total_changes());
    Ok(())
}

/// Runs both passes over `path`, each on its own handle.
pub fn parse_vcd(path: impl AsRef<Path>, config: &ParseConfig) -> Result<VCD, ParseError> {
    let path = path.as_ref();
    let analysis = analyze(&mut WordReader::new(File::open(path)?), &mut Unobserved)?;
    let mut vcd = allocate(analysis, config.time_ratio());
    parse_values(&mut WordReader::new(File::open(path)?), &mut vcd, &mut Unobserved)?;
    Ok(vcd)
}

/// Runs both passes over in-memory vcd text.
pub fn parse_vcd_str(text: &str, config: &ParseConfig) -> Result<VCD, ParseError> {
    let analysis = analyze(&mut WordReader::new(text.as_bytes()), &mut Unobserved)?;
    let mut vcd = allocate(analysis, config.time_ratio());
    parse_values(&mut WordReader::new(text.as_bytes()), &mut vcd, &mut Unobserved)?;
    Ok(vcd)
}
