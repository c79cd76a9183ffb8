// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use wavetrace_backend::*;

const TIMEOUT: Duration = Duration::from_secs(30);

fn big_vcd(timestamps: u64) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let mut text = String::from(
        "$comment stress file $end\n\
         $timescale 1 ps $end\n\
         $scope module top $end\n\
         $var wire 1 ! clk $end\n\
         $var wire 8 \" count [7:0] $end\n\
         $upscope $end\n\
         $enddefinitions $end\n",
    );
    for t in 0..timestamps {
        text.push_str(&format!("#{}\n{}!\nb{:b} \"\n", t * 10, t % 2, t % 256));
    }
    file.write_all(text.as_bytes()).unwrap();
    file
}

/// Forwards every event to a channel the test thread reads.
fn record(controller: &ParseController) -> Receiver<ParseEvent> {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    controller.subscribe(move |event| {
        let _ = tx.lock().unwrap().send(event.clone());
    });
    rx
}

/// Parks the worker inside the first progress notification matching
/// `when`, until the test thread lets it go.
struct Gate {
    reached: Receiver<()>,
    release: Sender<()>,
}

fn gate(controller: &ParseController, when: fn(f64) -> bool) -> Gate {
    let (reached_tx, reached) = mpsc::channel();
    let (release, release_rx) = mpsc::channel::<()>();
    let reached_tx = Mutex::new(reached_tx);
    let release_rx = Mutex::new(release_rx);
    let armed = AtomicBool::new(true);

    controller.subscribe(move |event| {
        if let ParseEvent::Progress(fraction) = event {
            if when(*fraction) && armed.swap(false, Ordering::SeqCst) {
                let _ = reached_tx.lock().unwrap().send(());
                let _ = release_rx.lock().unwrap().recv_timeout(TIMEOUT);
            }
        }
    });
    Gate { reached, release }
}

#[test]
fn finished_parse_publishes_everything() {
    let file = big_vcd(2_000);
    let controller = ParseController::new(ParseConfig::default());
    let events = record(&controller);

    controller.start(file.path()).unwrap();
    assert!(controller.wait(TIMEOUT));
    assert!(controller.is_finished());

    let vcd = controller.model().unwrap();
    assert_eq!(vcd.store_for_id(1).unwrap().len(), 2_000);
    assert_eq!(vcd.store_for_id(2).unwrap().len(), 2_000);
    assert_eq!(vcd.time_base().min_interval, Some(10));

    // `Finished` follows the final state change, so wait for it
    let mut seen = vec![];
    loop {
        let event = events.recv_timeout(TIMEOUT).unwrap();
        let done = event == ParseEvent::Finished;
        seen.push(event);
        if done {
            break;
        }
    }

    let states: Vec<ParseState> = seen
        .iter()
        .filter_map(|event| match event {
            ParseEvent::State(state) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [
            ParseState::Analyzing,
            ParseState::Allocating,
            ParseState::ValueParsing,
            ParseState::Finished,
        ]
    );

    let progress: Vec<f64> = seen
        .iter()
        .filter_map(|event| match event {
            ParseEvent::Progress(fraction) => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(progress.iter().any(|fraction| *fraction > 0.0 && *fraction <= 0.5));
    assert_eq!(progress.last(), Some(&1.0));

    assert!(seen.contains(&ParseEvent::Comment("stress file".to_string())));
    assert!(seen.contains(&ParseEvent::Operation("Parsing values".to_string())));
}

#[test]
fn stop_during_value_parsing() {
    let file = big_vcd(20_000);
    let controller = ParseController::new(ParseConfig::default());
    let gate = gate(&controller, |fraction| fraction > 0.5 && fraction < 1.0);

    controller.start(file.path()).unwrap();
    gate.reached.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(controller.state(), ParseState::ValueParsing);

    let release = gate.release;
    thread::scope(|s| {
        s.spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
        });
        assert!(controller.stop());
    });

    assert_eq!(controller.state(), ParseState::Interrupted);
    assert!(!controller.is_finished());
    assert!(controller.model().is_none());
    assert!(controller.progress() < 1.0);
}

#[test]
fn stop_during_analysis_skips_the_value_pass() {
    let file = big_vcd(20_000);
    let controller = ParseController::new(ParseConfig::default());
    let events = record(&controller);
    let gate = gate(&controller, |fraction| fraction > 0.0 && fraction < 0.5);

    controller.start(file.path()).unwrap();
    gate.reached.recv_timeout(TIMEOUT).unwrap();

    let release = gate.release;
    thread::scope(|s| {
        s.spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
        });
        assert!(controller.stop());
    });

    // `stop` joined the worker, so every event is in
    assert_eq!(controller.state(), ParseState::Interrupted);
    let states: Vec<ParseEvent> = events
        .try_iter()
        .filter(|event| matches!(event, ParseEvent::State(_)))
        .collect();
    assert_eq!(
        states,
        [
            ParseEvent::State(ParseState::Analyzing),
            ParseEvent::State(ParseState::Interrupted),
        ]
    );
}

#[test]
fn second_start_is_rejected_while_running() {
    let file = big_vcd(5_000);
    let controller = ParseController::new(ParseConfig::default());
    let gate = gate(&controller, |fraction| fraction > 0.0);

    controller.start(file.path()).unwrap();
    gate.reached.recv_timeout(TIMEOUT).unwrap();

    assert!(matches!(
        controller.start(file.path()),
        Err(ControllerError::AlreadyRunning)
    ));

    gate.release.send(()).unwrap();
    assert!(controller.wait(TIMEOUT));
    assert!(controller.is_finished());

    // once done, the controller takes another file
    controller.start(file.path()).unwrap();
    assert!(controller.wait(TIMEOUT));
    assert!(controller.is_finished());
}

#[test]
fn failures_are_reported() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"$var wire 1 ! a $end\n$enddefinitions $end\n#5\n1!\n#2\n0!\n")
        .unwrap();

    let controller = ParseController::new(ParseConfig::default());
    let failed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&failed);
    controller.subscribe(move |event| {
        if let ParseEvent::Failed(message) = event {
            *sink.lock().unwrap() = Some(message.clone());
        }
    });

    controller.start(file.path()).unwrap();
    assert!(controller.wait(TIMEOUT));
    assert_eq!(controller.state(), ParseState::Failed);
    assert!(controller.model().is_none());

    let error = controller.last_error().unwrap();
    assert!(error.contains("earlier than the previous timestamp"), "{error}");
    // `Failed` is published right after the state change
    for _ in 0..100 {
        if failed.lock().unwrap().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(failed.lock().unwrap().as_deref(), Some(error.as_str()));
}
