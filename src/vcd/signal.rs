// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::fmt;

use num::BigUint;

use super::types::{ScopeIdx, SignalIdx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Event,
    Integer,
    Parameter,
    Real,
    RealTime,
    Reg,
    Str,
    Supply0,
    Supply1,
    Time,
    Tri,
    TriAnd,
    TriOr,
    TriReg,
    Tri0,
    Tri1,
    WAnd,
    Wire,
    WOr,
    SVInt,
    SVShortInt,
    SVLongInt,
    SVChar,
    SVLogic,
    SVBit,
    SVShortReal,
}

impl SignalType {
    pub(super) const KEYWORDS: [&'static str; 29] = [
        "event",
        "integer",
        "parameter",
        "real",
        "realtime",
        "reg",
        "string",
        "supply0",
        "supply1",
        "time",
        "tri",
        "triand",
        "trior",
        "trireg",
        "tri0",
        "tri1",
        "wand",
        "wire",
        "wor",
        "int",
        "int_s",
        "shortint",
        "int_l",
        "longint",
        "char",
        "byte",
        "logic",
        "bit",
        "shortreal",
    ];

    pub(super) fn from_keyword(word: &str) -> Option<SignalType> {
        // $var parameter 3 a IDLE $end
        //      ^^^^^^^^^ - var_type
        let signal_type = match word {
            "event" => SignalType::Event,
            "integer" => SignalType::Integer,
            "parameter" => SignalType::Parameter,
            "real" => SignalType::Real,
            "realtime" => SignalType::RealTime,
            "reg" => SignalType::Reg,
            "string" => SignalType::Str,
            "supply0" => SignalType::Supply0,
            "supply1" => SignalType::Supply1,
            "tri" => SignalType::Tri,
            "triand" => SignalType::TriAnd,
            "trior" => SignalType::TriOr,
            "trireg" => SignalType::TriReg,
            "tri0" => SignalType::Tri0,
            "tri1" => SignalType::Tri1,
            "time" => SignalType::Time,
            "wand" => SignalType::WAnd,
            "wire" => SignalType::Wire,
            "wor" => SignalType::WOr,
            "int" => SignalType::SVInt,
            "int_s" => SignalType::SVShortInt,
            "shortint" => SignalType::SVShortInt,
            "int_l" => SignalType::SVLongInt,
            "longint" => SignalType::SVLongInt,
            "logic" => SignalType::SVLogic,
            "bit" => SignalType::SVBit,
            "shortreal" => SignalType::SVShortReal,
            "byte" => SignalType::SVChar,
            "char" => SignalType::SVChar,
            _ => return None,
        };
        Some(signal_type)
    }
}

/// One declared variable with its own change history.
#[derive(Debug)]
pub struct VectorSignal {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) signal_type: SignalType,
    pub(crate) num_bits: u32,
    // set when this is one bit of a bus that was declared bit by bit
    pub(crate) bit_index: Option<i64>,
    // `[msb:lsb]` as declared
    pub(crate) range: Option<(i64, i64)>,
    pub(crate) scope_parent: ScopeIdx,
    // id of the bound change store, filled in after allocation
    pub(crate) store: Option<u64>,
}

impl VectorSignal {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn bit_index(&self) -> Option<i64> {
        self.bit_index
    }

    pub fn range(&self) -> Option<(i64, i64)> {
        self.range
    }

    pub fn scope(&self) -> ScopeIdx {
        self.scope_parent
    }
}

/// A bus that its producer declared one bit at a time under a shared
/// reference name. Holds the bits in declaration order; each bit is a
/// one-bit [`VectorSignal`] with its own store.
#[derive(Debug)]
pub struct CompoundSignal {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) signal_type: SignalType,
    pub(crate) bits: Vec<SignalIdx>,
    pub(crate) scope_parent: ScopeIdx,
}

impl CompoundSignal {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn bits(&self) -> &[SignalIdx] {
        &self.bits
    }

    pub fn scope(&self) -> ScopeIdx {
        self.scope_parent
    }
}

#[derive(Debug)]
pub enum Signal {
    Vector(VectorSignal),
    Compound(CompoundSignal),
}

impl Signal {
    pub fn id(&self) -> u64 {
        match self {
            Signal::Vector(vector) => vector.id,
            Signal::Compound(compound) => compound.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Signal::Vector(vector) => &vector.name,
            Signal::Compound(compound) => &compound.name,
        }
    }

    pub fn scope(&self) -> ScopeIdx {
        match self {
            Signal::Vector(vector) => vector.scope_parent,
            Signal::Compound(compound) => compound.scope_parent,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorSignal> {
        match self {
            Signal::Vector(vector) => Some(vector),
            Signal::Compound(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundSignal> {
        match self {
            Signal::Compound(compound) => Some(compound),
            Signal::Vector(_) => None,
        }
    }
}

/// A value a signal took on at some instant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// One of `0 1 x z u w l h -` (either case) for single bit signals.
    Scalar(u8),
    /// The bit string of a `b` value change, as written.
    Vector(Box<str>),
    Real(f64),
    Str(Box<str>),
}

impl Value {
    /// Numeric reading of the value. `None` for reals, strings, and any bit
    /// string holding something other than `0` and `1`.
    pub fn to_biguint(&self) -> Option<BigUint> {
        match self {
            Value::Scalar(b'0') => Some(BigUint::from(0u8)),
            Value::Scalar(b'1') => Some(BigUint::from(1u8)),
            Value::Scalar(_) => None,
            Value::Vector(bits) => {
                if bits.bytes().all(|chr| chr == b'0' || chr == b'1') {
                    BigUint::parse_bytes(bits.as_bytes(), 2)
                } else {
                    None
                }
            }
            Value::Real(_) | Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(chr) => write!(f, "{}", *chr as char),
            Value::Vector(bits) => write!(f, "{bits}"),
            Value::Real(real) => write!(f, "{real}"),
            Value::Str(string) => write!(f, "{string}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_has_a_type() {
        for keyword in SignalType::KEYWORDS {
            assert!(SignalType::from_keyword(keyword).is_some(), "{keyword}");
        }
        assert!(SignalType::from_keyword("wiree").is_none());
    }

    #[test]
    fn numeric_values() {
        assert_eq!(
            Value::Vector("1010".into()).to_biguint(),
            Some(BigUint::from(10u8))
        );
        assert_eq!(Value::Scalar(b'1').to_biguint(), Some(BigUint::from(1u8)));
        assert_eq!(Value::Scalar(b'x').to_biguint(), None);
        assert_eq!(Value::Vector("1x0".into()).to_biguint(), None);
        assert_eq!(Value::Real(1.5).to_biguint(), None);
    }

    #[test]
    fn display_is_the_dumped_text() {
        assert_eq!(Value::Scalar(b'z').to_string(), "z");
        assert_eq!(Value::Vector("0011".into()).to_string(), "0011");
        assert_eq!(Value::Str("idle".into()).to_string(), "idle");
    }
}
