// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use wavetrace_backend::{
    CompoundSignal, ParseConfig, ParseController, ParseEvent, Scope, ScopeIdx, SignalIdx,
    VectorSignal, Visitor, VCD,
};

#[derive(Parser)]
#[command(about = "Parse a VCD file and inspect its signals")]
struct Cli {
    /// The path to the file to read
    path: PathBuf,

    /// TOML file with parse settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Multiplier applied to every timestamp, overrides the config file
    #[arg(long)]
    time_ratio: Option<u64>,

    /// Print the scope tree
    #[arg(long)]
    tree: bool,

    /// Dotted path of a signal to query, e.g. `top.cpu.clk`
    #[arg(long, requires = "at")]
    signal: Option<String>,

    /// Time at which to query `--signal`, in stored (normalized) units
    #[arg(long)]
    at: Option<u64>,
}

struct TreePrinter;

impl Visitor for TreePrinter {
    fn visit_scope(&mut self, _idx: ScopeIdx, scope: &Scope, depth: usize) {
        println!("{:indent$}{} ({})", "", scope.name(), scope.kind(), indent = depth * 2);
    }

    fn visit_vector(&mut self, _idx: SignalIdx, signal: &VectorSignal, depth: usize) {
        println!(
            "{:indent$}{} : {:?} [{}]",
            "",
            signal.name(),
            signal.signal_type(),
            signal.num_bits(),
            indent = depth * 2
        );
    }

    fn visit_compound(&mut self, _idx: SignalIdx, signal: &CompoundSignal, depth: usize) {
        println!(
            "{:indent$}{} : {} bits",
            "",
            signal.name(),
            signal.bits().len(),
            indent = depth * 2
        );
    }
}

fn query(vcd: &VCD, path: &str, time: u64) {
    let Some(idx) = vcd.signal_by_path(path) else {
        clilog::error!("no signal named {path}");
        return;
    };

    match vcd.store_for_signal(idx) {
        Some(store) => match store.value_at(time) {
            Some(value) => println!("{path} @ {time} = {value}"),
            None => println!("{path} @ {time} has no value yet"),
        },
        // compounds are read bit by bit, most significant first
        None => match vcd.signal(idx).as_compound() {
            Some(compound) => {
                let bits: String = vcd
                    .compound_bits_msb_first(compound)
                    .iter()
                    .map(|bit| {
                        vcd.store_for_signal(*bit)
                            .and_then(|store| store.value_at(time))
                            .map_or_else(|| "?".to_string(), |value| value.to_string())
                    })
                    .collect();
                println!("{path} @ {time} = {bits}");
            }
            None => println!("{path} has no recorded changes"),
        },
    }
}

fn main() -> ExitCode {
    clilog::init_stderr_color_debug();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => match ParseConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                clilog::error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => ParseConfig::default(),
    };
    if let Some(time_ratio) = args.time_ratio {
        config.time_ratio = time_ratio;
    }

    let controller = ParseController::new(config);
    controller.subscribe(|event| match event {
        ParseEvent::Operation(label) => clilog::info!("{label}"),
        ParseEvent::Comment(text) => clilog::info!("comment: {text}"),
        _ => {}
    });

    let timer = clilog::stimer!("parse");
    if let Err(err) = controller.start(&args.path) {
        clilog::error!("{err}");
        return ExitCode::FAILURE;
    }
    while !controller.wait(Duration::from_secs(1)) {
        clilog::info!("{:.0}%", controller.progress() * 100.0);
    }
    clilog::finish!(timer);

    let Some(vcd) = controller.model() else {
        if let Some(err) = controller.last_error() {
            clilog::error!("{err}");
        }
        return ExitCode::FAILURE;
    };

    let (magnitude, unit) = vcd.time_base().display_scale();
    println!(
        "{} scopes, {} signals, {} changes, time unit {magnitude} {}, length {}",
        vcd.num_scopes(),
        vcd.num_signals(),
        vcd.stores().total_changes(),
        unit.as_str(),
        vcd.time_base().signal_length()
    );

    if args.tree {
        vcd.walk(&mut TreePrinter);
    }
    if let (Some(path), Some(time)) = (&args.signal, args.at) {
        query(&vcd, path, time);
    }
    ExitCode::SUCCESS
}
