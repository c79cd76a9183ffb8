// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
pub mod error;
pub mod ident;
pub mod reader;
pub mod signal;
pub mod store;
pub mod timebase;
pub mod types;
pub mod visit;

pub mod parse;
