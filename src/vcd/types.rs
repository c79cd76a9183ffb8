// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::prelude::*;

use super::signal::{CompoundSignal, Signal, VectorSignal};
use super::store::{ChangeStore, StoreTable};
use super::timebase::TimeBase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timescale {
    Fs,
    Ps,
    Ns,
    Us,
    Ms,
    S,
    Unit,
}

impl Timescale {
    pub(super) fn from_unit(unit: &str) -> Option<Timescale> {
        match unit {
            "fs" => Some(Timescale::Fs),
            "ps" => Some(Timescale::Ps),
            "ns" => Some(Timescale::Ns),
            "us" => Some(Timescale::Us),
            "ms" => Some(Timescale::Ms),
            "s" => Some(Timescale::S),
            _ => None,
        }
    }

    /// Power of ten of one unit, in seconds. `Unit` has none.
    pub fn exponent(&self) -> Option<i32> {
        match self {
            Timescale::Fs => Some(-15),
            Timescale::Ps => Some(-12),
            Timescale::Ns => Some(-9),
            Timescale::Us => Some(-6),
            Timescale::Ms => Some(-3),
            Timescale::S => Some(0),
            Timescale::Unit => None,
        }
    }

    pub(super) fn from_exponent(exponent: i32) -> Option<Timescale> {
        match exponent {
            -15 => Some(Timescale::Fs),
            -12 => Some(Timescale::Ps),
            -9 => Some(Timescale::Ns),
            -6 => Some(Timescale::Us),
            -3 => Some(Timescale::Ms),
            0 => Some(Timescale::S),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timescale::Fs => "fs",
            Timescale::Ps => "ps",
            Timescale::Ns => "ns",
            Timescale::Us => "us",
            Timescale::Ms => "ms",
            Timescale::S => "s",
            Timescale::Unit => "unit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub date: Option<DateTime<Utc>>,
    pub version: Option<Version>,
    pub timescale: (Option<u32>, Timescale),
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            date: None,
            version: None,
            timescale: (None, Timescale::Unit),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScopeIdx(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SignalIdx(pub usize);

#[derive(Debug)]
pub struct Scope {
    pub(crate) name: String,
    // `module`, `task`, `begin`, ... as written after `$scope`
    pub(crate) kind: String,
    pub(crate) parent_idx: Option<ScopeIdx>,
    pub(crate) self_idx: ScopeIdx,

    pub(crate) child_signals: Vec<SignalIdx>,
    pub(crate) child_scopes: Vec<ScopeIdx>,

    // reference names already taken in this scope, split by kind so that
    // bit-exploded declarations find their compound in O(1)
    pub(crate) compounds: HashMap<String, SignalIdx>,
    pub(crate) vector_names: HashSet<String>,
}

impl Scope {
    pub(crate) fn new(
        name: String,
        kind: String,
        parent_idx: Option<ScopeIdx>,
        self_idx: ScopeIdx,
    ) -> Scope {
        Scope {
            name,
            kind,
            parent_idx,
            self_idx,
            child_signals: vec![],
            child_scopes: vec![],
            compounds: HashMap::new(),
            vector_names: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn idx(&self) -> ScopeIdx {
        self.self_idx
    }

    pub fn parent(&self) -> Option<ScopeIdx> {
        self.parent_idx
    }

    pub fn child_signals(&self) -> &[SignalIdx] {
        &self.child_signals
    }

    pub fn child_scopes(&self) -> &[ScopeIdx] {
        &self.child_scopes
    }
}

/// The parsed signal hierarchy together with every signal's change history.
///
/// Scopes and signals live in flat arenas and refer to each other through
/// [`ScopeIdx`] and [`SignalIdx`]. Index 0 of the scope arena is the session
/// root, which holds the top level scopes and any variable declared outside
/// of a `$scope`.
#[derive(Debug)]
pub struct VCD {
    pub(crate) metadata: Metadata,
    pub(crate) all_signals: Vec<Signal>,
    pub(crate) all_scopes: Vec<Scope>,
    pub(crate) root_scope: ScopeIdx,
    pub(crate) stores: StoreTable,
    pub(crate) time_base: TimeBase,
}

pub(crate) const ROOT_SCOPE_NAME: &str = "root";

impl VCD {
    pub(crate) fn new() -> VCD {
        let root_scope = ScopeIdx(0);
        VCD {
            metadata: Metadata::default(),
            all_signals: vec![],
            all_scopes: vec![Scope::new(
                ROOT_SCOPE_NAME.to_string(),
                String::new(),
                None,
                root_scope,
            )],
            root_scope,
            stores: StoreTable::default(),
            time_base: TimeBase::default(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn time_base(&self) -> &TimeBase {
        &self.time_base
    }

    pub fn root_scope(&self) -> ScopeIdx {
        self.root_scope
    }

    pub fn scope(&self, idx: ScopeIdx) -> &Scope {
        let ScopeIdx(idx) = idx;
        &self.all_scopes[idx]
    }

    pub fn signal(&self, idx: SignalIdx) -> &Signal {
        let SignalIdx(idx) = idx;
        &self.all_signals[idx]
    }

    pub fn scope_name_by_idx(&self, idx: ScopeIdx) -> &str {
        &self.scope(idx).name
    }

    pub fn child_scopes_by_idx(&self, idx: ScopeIdx) -> &[ScopeIdx] {
        &self.scope(idx).child_scopes
    }

    pub fn child_signals_by_idx(&self, idx: ScopeIdx) -> &[SignalIdx] {
        &self.scope(idx).child_signals
    }

    pub fn num_scopes(&self) -> usize {
        self.all_scopes.len()
    }

    pub fn num_signals(&self) -> usize {
        self.all_signals.len()
    }

    pub fn stores(&self) -> &StoreTable {
        &self.stores
    }

    pub fn store_for_id(&self, id: u64) -> Option<&ChangeStore> {
        self.stores.get(id)
    }

    /// Change store bound to a vector signal. Compound signals have none of
    /// their own; look their bits up instead.
    pub fn store_for_signal(&self, idx: SignalIdx) -> Option<&ChangeStore> {
        match self.signal(idx) {
            Signal::Vector(vector) => vector.store.and_then(|id| self.stores.get(id)),
            Signal::Compound(_) => None,
        }
    }

    /// Bits of `compound` from the highest bit index down, whatever order
    /// they were declared in.
    pub fn compound_bits_msb_first(&self, compound: &CompoundSignal) -> Vec<SignalIdx> {
        let mut bits = compound.bits.clone();
        bits.sort_by_key(|bit| {
            Reverse(self.signal(*bit).as_vector().and_then(VectorSignal::bit_index))
        });
        bits
    }

    /// Number of scope levels below the root.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self.root_scope, 0usize)];
        while let Some((idx, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            for child in self.child_scopes_by_idx(idx) {
                pending.push((*child, depth + 1));
            }
        }
        deepest
    }

    /// Looks up a signal by its dotted path below the root, e.g.
    /// `top.cpu.clk`. Bits of a compound signal are addressed by their own
    /// name, e.g. `top.bus[2]`.
    pub fn signal_by_path(&self, path: &str) -> Option<SignalIdx> {
        let mut parts: Vec<&str> = path.split('.').collect();
        let signal_name = parts.pop()?;

        let mut scope_idx = self.root_scope;
        for part in parts {
            scope_idx = *self
                .child_scopes_by_idx(scope_idx)
                .iter()
                .find(|child| self.scope_name_by_idx(**child) == part)?;
        }

        for signal_idx in self.child_signals_by_idx(scope_idx) {
            let signal = self.signal(*signal_idx);
            if signal.name() == signal_name {
                return Some(*signal_idx);
            }
            if let Signal::Compound(compound) = signal {
                let bit = compound
                    .bits
                    .iter()
                    .find(|bit| self.signal(**bit).name() == signal_name);
                if let Some(bit) = bit {
                    return Some(*bit);
                }
            }
        }
        None
    }

    /// Dotted path of a scope below the root.
    pub fn scope_path(&self, idx: ScopeIdx) -> String {
        let mut names = vec![];
        let mut curr = Some(idx);
        while let Some(idx) = curr {
            if idx == self.root_scope {
                break;
            }
            let scope = self.scope(idx);
            names.push(scope.name.as_str());
            curr = scope.parent_idx;
        }
        names.reverse();
        names.join(".")
    }
}
