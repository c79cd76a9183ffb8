// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Uniform traversal over scopes, vector signals, and compound signals.
//!
//! A walk visits a scope, then its signals in declaration order (a compound
//! signal is followed by each of its bits), then its child scopes.

use super::signal::{CompoundSignal, Signal, VectorSignal};
use super::types::{Scope, ScopeIdx, SignalIdx, VCD};

pub trait Visitor {
    fn visit_scope(&mut self, _idx: ScopeIdx, _scope: &Scope, _depth: usize) {}
    fn visit_vector(&mut self, _idx: SignalIdx, _signal: &VectorSignal, _depth: usize) {}
    fn visit_compound(&mut self, _idx: SignalIdx, _signal: &CompoundSignal, _depth: usize) {}
}

pub trait VisitorMut {
    fn visit_scope(&mut self, _scope: &mut Scope) {}
    fn visit_vector(&mut self, _signal: &mut VectorSignal) {}
    fn visit_compound(&mut self, _signal: &mut CompoundSignal) {}
}

impl VCD {
    /// Walks the tree below (and including) the root scope.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) {
        // explicit stack, nesting depth is only bounded by the file
        let mut pending = vec![(self.root_scope, 0usize)];
        while let Some((idx, depth)) = pending.pop() {
            let scope = self.scope(idx);
            visitor.visit_scope(idx, scope, depth);

            for signal_idx in &scope.child_signals {
                match self.signal(*signal_idx) {
                    Signal::Vector(vector) => visitor.visit_vector(*signal_idx, vector, depth + 1),
                    Signal::Compound(compound) => {
                        visitor.visit_compound(*signal_idx, compound, depth + 1);
                        for bit_idx in &compound.bits {
                            if let Signal::Vector(bit) = self.signal(*bit_idx) {
                                visitor.visit_vector(*bit_idx, bit, depth + 2);
                            }
                        }
                    }
                }
            }

            // reversed so the first child scope comes off the stack first
            pending.extend(scope.child_scopes.iter().rev().map(|child| (*child, depth + 1)));
        }
    }

    pub fn walk_mut<V: VisitorMut>(&mut self, visitor: &mut V) {
        let mut pending = vec![self.root_scope];
        while let Some(ScopeIdx(scope_idx)) = pending.pop() {
            visitor.visit_scope(&mut self.all_scopes[scope_idx]);

            let child_signals = self.all_scopes[scope_idx].child_signals.clone();
            for SignalIdx(signal_idx) in child_signals {
                let bits = match &mut self.all_signals[signal_idx] {
                    Signal::Vector(vector) => {
                        visitor.visit_vector(vector);
                        continue;
                    }
                    Signal::Compound(compound) => {
                        visitor.visit_compound(compound);
                        compound.bits.clone()
                    }
                };
                for SignalIdx(bit_idx) in bits {
                    if let Signal::Vector(bit) = &mut self.all_signals[bit_idx] {
                        visitor.visit_vector(bit);
                    }
                }
            }

            pending.extend(self.all_scopes[scope_idx].child_scopes.iter().rev());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParseConfig;
    use crate::vcd::parse::parse_vcd_str;

    use super::*;

    #[derive(Default)]
    struct Tally {
        events: Vec<String>,
    }

    impl Visitor for Tally {
        fn visit_scope(&mut self, _idx: ScopeIdx, scope: &Scope, depth: usize) {
            self.events.push(format!("{depth} scope {}", scope.name()));
        }
        fn visit_vector(&mut self, _idx: SignalIdx, signal: &VectorSignal, depth: usize) {
            self.events.push(format!("{depth} vector {}", signal.name()));
        }
        fn visit_compound(&mut self, _idx: SignalIdx, signal: &CompoundSignal, depth: usize) {
            self.events.push(format!("{depth} compound {}", signal.name()));
        }
    }

    struct Rename;

    impl VisitorMut for Rename {
        fn visit_vector(&mut self, signal: &mut VectorSignal) {
            signal.name = signal.name.to_uppercase();
        }
    }

    const TEXT: &str = "\
$scope module top $end
$var wire 1 ! clk $end
$var wire 1 \" bus [0] $end
$var wire 1 # bus [1] $end
$scope module sub $end
$var reg 4 $ count [3:0] $end
$upscope $end
$upscope $end
$enddefinitions $end
";

    #[test]
    fn walk_is_preorder_in_declaration_order() {
        let vcd = parse_vcd_str(TEXT, &ParseConfig::default()).unwrap();
        let mut tally = Tally::default();
        vcd.walk(&mut tally);
        assert_eq!(
            tally.events,
            [
                "0 scope root",
                "1 scope top",
                "2 vector clk",
                "2 compound bus",
                "3 vector bus[0]",
                "3 vector bus[1]",
                "2 scope sub",
                "3 vector count",
            ]
        );
    }

    #[test]
    fn walk_mut_reaches_compound_bits() {
        let mut vcd = parse_vcd_str(TEXT, &ParseConfig::default()).unwrap();
        vcd.walk_mut(&mut Rename);
        assert!(vcd.signal_by_path("top.CLK").is_some());
        assert!(vcd.signal_by_path("top.BUS[1]").is_some());
        assert!(vcd.signal_by_path("top.sub.COUNT").is_some());
    }

    #[test]
    fn deep_nesting_walks_without_recursion() {
        const LEVELS: usize = 50_000;
        let mut text = String::new();
        for level in 0..LEVELS {
            text.push_str(&format!("$scope module s{level} $end\n"));
        }
        text.push_str("$var wire 1 ! leaf $end\n");
        for _ in 0..LEVELS {
            text.push_str("$upscope $end\n");
        }
        text.push_str("$enddefinitions $end\n#0\n1!\n");

        // the parse worker runs on a thread with the default stack size
        let (scopes, deepest, leaf) = std::thread::spawn(move || {
            let vcd = parse_vcd_str(&text, &ParseConfig::default()).unwrap();
            let mut tally = Tally::default();
            vcd.walk(&mut tally);
            let leaf = tally.events.last().cloned().unwrap();
            (tally.events.len() - 1, vcd.depth(), leaf)
        })
        .join()
        .unwrap();

        assert_eq!(scopes, LEVELS + 1);
        assert_eq!(deepest, LEVELS);
        assert_eq!(leaf, format!("{} vector leaf", LEVELS + 1));
    }
}
