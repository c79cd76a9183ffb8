// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! part of the vcd parser that handles parsing the signal tree and
//! building the resulting signal tree
use std::io::Read;

use super::super::error::ParseError;
use super::super::ident::{try_decode, SYNTHETIC_ID_BASE};
use super::super::reader::{next_word, skip_to_end, Cursor, WordReader};
use super::super::signal::{CompoundSignal, Signal, SignalType, VectorSignal};
use super::super::store::IdTable;
use super::super::types::{Scope, ScopeIdx, SignalIdx, VCD};

/// Value of `~~~~`, the last code of four characters. Longer codes are
/// refused.
pub(crate) const MAX_VAR_ID: u64 = 94 + 94 * 94 + 94 * 94 * 94 + 94 * 94 * 94 * 94;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum VarIndex {
    // `[3]`
    Bit(i64),
    // `[7:0]`
    Range(i64, i64),
}

/// What a single `$var ... $end` declares, before it is merged into the tree.
#[derive(Debug)]
pub(super) struct VarInfo {
    pub(super) signal_type: SignalType,
    pub(super) num_bits: u32,
    pub(super) id: u64,
    pub(super) reference: String,
    pub(super) index: Option<VarIndex>,
}

fn parse_index(index: &str) -> Option<VarIndex> {
    let inner = index.strip_prefix('[')?.strip_suffix(']')?;
    match inner.split_once(':') {
        Some((msb, lsb)) => Some(VarIndex::Range(
            msb.trim().parse().ok()?,
            lsb.trim().parse().ok()?,
        )),
        None => Some(VarIndex::Bit(inner.trim().parse().ok()?)),
    }
}

/// Splits `data[7:0]`, `data [7:0]` or plain `data` into name and index.
/// Brackets that don't hold an index stay part of the name.
fn split_reference(words: &[String]) -> (String, Option<VarIndex>) {
    if let [name @ .., last] = words {
        if !name.is_empty() && last.starts_with('[') {
            if let Some(index) = parse_index(last) {
                return (name.join(" "), Some(index));
            }
        }
    }

    let reference = words.join(" ");
    if reference.ends_with(']') {
        if let Some(open) = reference.rfind('[') {
            if open > 0 {
                if let Some(index) = parse_index(&reference[open..]) {
                    return (reference[..open].trim_end().to_string(), Some(index));
                }
            }
        }
    }
    (reference, None)
}

pub(super) fn parse_var<R: Read>(
    word_reader: &mut WordReader<R>,
    cursor: &Cursor,
) -> Result<VarInfo, ParseError> {
    let mut words: Vec<String> = vec![];
    loop {
        let (word, _) = next_word!(word_reader)?;
        if word == "$end" {
            break;
        }
        words.push(word.to_string());
    }

    if words.len() < 4 {
        return Err(ParseError::malformed_decl(
            cursor,
            format!(
                "expected `$var <type> <width> <identifier> <reference> $end`, found `$var {} $end`",
                words.join(" ")
            ),
        ));
    }

    // $var parameter 3 a IDLE $end
    //      ^^^^^^^^^ - var_type
    let signal_type = SignalType::from_keyword(&words[0]).ok_or_else(|| {
        ParseError::malformed_decl(
            cursor,
            format!(
                "found keyword `{}` but expected one of {:?}",
                words[0],
                SignalType::KEYWORDS
            ),
        )
    })?;

    // $var parameter 3 a IDLE $end
    //                ^ - num_bits
    let num_bits = match words[1].parse::<u32>() {
        Ok(0) | Err(_) => {
            return Err(ParseError::malformed_decl(
                cursor,
                format!("`{}` is not a valid bit width", words[1]),
            ))
        }
        Ok(num_bits) => num_bits,
    };

    // $var parameter 3 a IDLE $end
    //                  ^ - identifier code
    let id = try_decode(words[2].as_bytes())
        .filter(|id| *id <= MAX_VAR_ID)
        .ok_or_else(|| ParseError::InvalidIdentifier {
            ident: words[2].clone(),
            cursor: Some(cursor.clone()),
        })?;

    // $var parameter 3 a IDLE $end
    //                    ^^^^ - reference (can extend until $end)
    let (reference, index) = split_reference(&words[3..]);

    Ok(VarInfo {
        signal_type,
        num_bits,
        id,
        reference,
        index,
    })
}

struct ScopeFrame {
    scope: ScopeIdx,
    // `$scope module $end` without a name: contents go to the enclosing scope
    anonymous: bool,
}

/// Builds the scope tree from declarations, one keyword at a time.
pub(super) struct Declarations {
    stack: Vec<ScopeFrame>,
    root: ScopeIdx,
    next_compound_id: u64,
    pub(super) widths: IdTable<u32>,
    pub(super) max_var_id: u64,
}

impl Declarations {
    pub(super) fn new(root: ScopeIdx) -> Declarations {
        Declarations {
            stack: vec![],
            root,
            next_compound_id: SYNTHETIC_ID_BASE,
            widths: IdTable::default(),
            max_var_id: 0,
        }
    }

    fn current(&self) -> ScopeIdx {
        self.stack.last().map_or(self.root, |frame| frame.scope)
    }

    pub(super) fn parse_scope<R: Read>(
        &mut self,
        word_reader: &mut WordReader<R>,
        vcd: &mut VCD,
        cursor: &Cursor,
    ) -> Result<(), ParseError> {
        // $scope module reg_mag_i $end
        //        ^^^^^^ - module keyword
        let (kind, _) = next_word!(word_reader)?;
        if kind == "$end" {
            return Err(ParseError::malformed_decl(cursor, "`$scope` without a scope type"));
        }
        let kind = kind.to_string();

        // $scope module reg_mag_i $end
        //               ^^^^^^^^^ - scope name
        let mut name: Vec<String> = vec![];
        loop {
            let (word, _) = next_word!(word_reader)?;
            if word == "$end" {
                break;
            }
            name.push(word.to_string());
        }

        // In some cases there are VCD files which have scopes without names.
        // We make them transparent, so
        // $scope module a $end
        //   $scope module $end
        //     $scope module b $end
        // creates `a.b`
        let parent = self.current();
        if name.is_empty() {
            self.stack.push(ScopeFrame {
                scope: parent,
                anonymous: true,
            });
            return Ok(());
        }

        let scope_idx = ScopeIdx(vcd.all_scopes.len());
        vcd.all_scopes
            .push(Scope::new(name.join(" "), kind, Some(parent), scope_idx));
        let ScopeIdx(parent_idx) = parent;
        vcd.all_scopes[parent_idx].child_scopes.push(scope_idx);

        self.stack.push(ScopeFrame {
            scope: scope_idx,
            anonymous: false,
        });
        Ok(())
    }

    pub(super) fn parse_upscope<R: Read>(
        &mut self,
        word_reader: &mut WordReader<R>,
        cursor: &Cursor,
    ) -> Result<(), ParseError> {
        skip_to_end!(word_reader);
        match self.stack.pop() {
            Some(frame) => {
                if frame.anonymous {
                    clilog::debug!("closed anonymous scope at {cursor}");
                }
                Ok(())
            }
            None => Err(ParseError::mismatch(cursor, "`$upscope` with no open scope")),
        }
    }

    /// Merges one variable declaration into the current scope.
    pub(super) fn add_var(
        &mut self,
        info: VarInfo,
        vcd: &mut VCD,
        cursor: &Cursor,
    ) -> Result<SignalIdx, ParseError> {
        let VarInfo {
            signal_type,
            num_bits,
            id,
            reference,
            index,
        } = info;

        // Is the current variable an alias to an identifier already
        // declared? Aliases are fine as long as the widths agree.
        let width = *self.widths.get_or_insert_with(id, || num_bits);
        if width != num_bits {
            return Err(ParseError::malformed_decl(
                cursor,
                format!(
                    "identifier of `{reference}` was declared with {width} bits before, not {num_bits}"
                ),
            ));
        }
        self.max_var_id = self.max_var_id.max(id);

        let scope_idx = self.current();
        let ScopeIdx(scope_slot) = scope_idx;

        let (name, bit_index, range) = match index {
            // one bit of a bus declared bit by bit
            Some(VarIndex::Bit(bit)) if num_bits == 1 => {
                let compound_idx = self.compound_for(&reference, signal_type, scope_idx, vcd, cursor)?;
                let bit_idx = SignalIdx(vcd.all_signals.len());
                vcd.all_signals.push(Signal::Vector(VectorSignal {
                    id,
                    name: format!("{reference}[{bit}]"),
                    signal_type,
                    num_bits,
                    bit_index: Some(bit),
                    range: None,
                    scope_parent: scope_idx,
                    store: None,
                }));
                let SignalIdx(compound_slot) = compound_idx;
                if let Signal::Compound(compound) = &mut vcd.all_signals[compound_slot] {
                    compound.bits.push(bit_idx);
                }
                return Ok(bit_idx);
            }
            // an element of an array, e.g. `mem[3]` 8 bits wide
            Some(VarIndex::Bit(bit)) => (format!("{reference}[{bit}]"), None, None),
            Some(VarIndex::Range(msb, lsb)) => {
                if msb.abs_diff(lsb) + 1 != num_bits as u64 {
                    clilog::debug!(
                        "`{reference}` spans [{msb}:{lsb}] but is {num_bits} bits wide at {cursor}"
                    );
                }
                (reference, None, Some((msb, lsb)))
            }
            None => (reference, None, None),
        };

        let scope = &mut vcd.all_scopes[scope_slot];
        if scope.compounds.contains_key(&name) {
            return Err(ParseError::malformed_decl(
                cursor,
                format!("`{name}` was already declared bit by bit in scope `{}`", scope.name),
            ));
        }
        scope.vector_names.insert(name.clone());

        let signal_idx = SignalIdx(vcd.all_signals.len());
        scope.child_signals.push(signal_idx);
        vcd.all_signals.push(Signal::Vector(VectorSignal {
            id,
            name,
            signal_type,
            num_bits,
            bit_index,
            range,
            scope_parent: scope_idx,
            store: None,
        }));
        Ok(signal_idx)
    }

    /// Finds the compound signal collecting the bits of `name` in the given
    /// scope, creating it on the first bit.
    fn compound_for(
        &mut self,
        name: &str,
        signal_type: SignalType,
        scope_idx: ScopeIdx,
        vcd: &mut VCD,
        cursor: &Cursor,
    ) -> Result<SignalIdx, ParseError> {
        let ScopeIdx(scope_slot) = scope_idx;
        let scope = &mut vcd.all_scopes[scope_slot];

        if let Some(compound_idx) = scope.compounds.get(name) {
            return Ok(*compound_idx);
        }
        if scope.vector_names.contains(name) {
            return Err(ParseError::malformed_decl(
                cursor,
                format!(
                    "bit of `{name}` declared in scope `{}` which already has a signal `{name}`",
                    scope.name
                ),
            ));
        }

        let compound_idx = SignalIdx(vcd.all_signals.len());
        scope.compounds.insert(name.to_string(), compound_idx);
        scope.child_signals.push(compound_idx);

        let id = self.next_compound_id;
        self.next_compound_id += 1;
        vcd.all_signals.push(Signal::Compound(CompoundSignal {
            id,
            name: name.to_string(),
            signal_type,
            bits: vec![],
            scope_parent: scope_idx,
        }));
        Ok(compound_idx)
    }

    /// Called on `$enddefinitions`; every scope must be closed by then.
    pub(super) fn finish(&self, cursor: &Cursor) -> Result<(), ParseError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(ParseError::mismatch(
                cursor,
                format!("{} scope(s) still open at end of definitions", self.stack.len()),
            ))
        }
    }
}
