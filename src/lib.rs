// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

mod vcd;
pub mod config;
pub mod controller;

pub use vcd::error::ParseError;
pub use vcd::ident::{decode, encode, SYNTHETIC_ID_BASE};
pub use vcd::parse::{
    allocate, analyze, parse_values, parse_vcd, parse_vcd_str, Analysis, ScanObserver, Unobserved,
};
pub use vcd::reader::{Cursor, Line, Word, WordReader};
pub use vcd::signal::{CompoundSignal, Signal, SignalType, Value, VectorSignal};
pub use vcd::store::{ChangeStore, StoreTable};
pub use vcd::timebase::TimeBase;
pub use vcd::types::{Metadata, Scope, ScopeIdx, SignalIdx, Timescale, Version, VCD};
pub use vcd::visit::{Visitor, VisitorMut};

pub use config::ParseConfig;
pub use controller::{ControllerError, ParseController, ParseEvent, ParseState, SubscriptionId};

pub use num::BigUint;
