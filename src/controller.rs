// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Runs the two-pass parse of a file on a background thread.
//!
//! ```text
//! Idle -> Analyzing -> Allocating -> ValueParsing -> Finished
//!             \____________\______________\-------> Interrupted | Failed
//! ```
//!
//! Callers poll the controller or subscribe to [`ParseEvent`]s. The parsed
//! [`VCD`] is published only once both passes have succeeded.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ParseConfig;
use crate::vcd::error::ParseError;
use crate::vcd::parse::{allocate, analyze, parse_values, ScanObserver};
use crate::vcd::reader::WordReader;
use crate::vcd::types::VCD;

mod notify;
pub use notify::{ParseEvent, SubscriptionId};
use notify::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    #[default]
    Idle,
    Analyzing,
    Allocating,
    ValueParsing,
    Finished,
    Interrupted,
    Failed,
}

impl ParseState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ParseState::Analyzing | ParseState::Allocating | ParseState::ValueParsing
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("a parse is already running")]
    AlreadyRunning,
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the controller and its worker thread.
#[derive(Default)]
struct Shared {
    state: Mutex<ParseState>,
    // signalled on every transition
    transitions: Condvar,
    interrupt: AtomicBool,
    progress: Mutex<f64>,
    operation: Mutex<String>,
    model: Mutex<Option<Arc<VCD>>>,
    last_error: Mutex<Option<String>>,
    bus: EventBus,
}

impl Shared {
    fn state(&self) -> ParseState {
        *lock(&self.state)
    }

    fn transition(&self, next: ParseState) {
        let prev = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, next)
        };
        self.transitions.notify_all();
        clilog::info!("parse state {prev:?} -> {next:?}");
        self.bus.publish(&ParseEvent::State(next));
    }

    fn set_operation(&self, label: &str) {
        *lock(&self.operation) = label.to_string();
        self.bus.publish(&ParseEvent::Operation(label.to_string()));
    }

    fn set_progress(&self, fraction: f64) {
        *lock(&self.progress) = fraction;
        self.bus.publish(&ParseEvent::Progress(fraction));
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Waits until no pass is running, for at most `timeout`.
    fn wait_idle(&self, timeout: Duration) -> bool {
        let state = lock(&self.state);
        let (state, _) = self
            .transitions
            .wait_timeout_while(state, timeout, |state| state.is_running())
            .unwrap_or_else(PoisonError::into_inner);
        !state.is_running()
    }
}

/// Relays one pass's progress and the interrupt flag between the scan and
/// the controller.
struct PassObserver<'a> {
    shared: &'a Shared,
    file_len: u64,
    // progress fraction this pass starts from; each pass is worth one half
    base: f64,
    step: f64,
    reported: f64,
}

impl<'a> PassObserver<'a> {
    fn new(shared: &'a Shared, file_len: u64, base: f64, step: f64) -> Self {
        PassObserver {
            shared,
            file_len,
            base,
            step,
            reported: base,
        }
    }
}

impl ScanObserver for PassObserver<'_> {
    fn interrupted(&self) -> bool {
        self.shared.interrupted()
    }

    fn progress(&mut self, bytes_read: u64) {
        let done = match self.file_len {
            0 => 1.0,
            len => (bytes_read as f64 / len as f64).min(1.0),
        };
        let fraction = self.base + done * 0.5;
        let pass_done = done >= 1.0 && fraction > self.reported;
        if fraction - self.reported >= self.step || pass_done {
            self.reported = fraction;
            self.shared.set_progress(fraction);
        }
    }

    fn comment(&mut self, text: &str) {
        clilog::debug!("vcd comment: {text}");
        self.shared.bus.publish(&ParseEvent::Comment(text.to_string()));
    }
}

/// Drives one parse at a time on a background thread.
pub struct ParseController {
    config: ParseConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ParseController {
    pub fn new(config: ParseConfig) -> ParseController {
        ParseController {
            config,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Starts parsing `path` in the background.
    ///
    /// Fails without side effects if a parse is already running or the file
    /// can't be opened. Starting again after the previous parse has ended is
    /// fine; the previous model is dropped.
    pub fn start(&self, path: impl AsRef<Path>) -> Result<(), ControllerError> {
        let mut worker = lock(&self.worker);
        if self.shared.state().is_running() {
            return Err(ControllerError::AlreadyRunning);
        }

        let path = path.as_ref().to_path_buf();
        let io_error = |source| ControllerError::Io {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(io_error)?;
        let file_len = file.metadata().map_err(io_error)?.len();

        if let Some(previous) = worker.take() {
            join_worker(previous);
        }

        self.shared.interrupt.store(false, Ordering::Release);
        *lock(&self.shared.progress) = 0.0;
        *lock(&self.shared.model) = None;
        *lock(&self.shared.last_error) = None;
        // marked running before the thread exists so that a second start is
        // rejected right away
        *lock(&self.shared.state) = ParseState::Analyzing;

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name("vcd-parse".to_string())
            .spawn(move || run(&shared, &config, &worker_path, file, file_len));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(source) => {
                *lock(&self.shared.state) = ParseState::Failed;
                Err(ControllerError::Io { path, source })
            }
        }
    }

    /// Asks the running parse to stop and waits for it, up to the configured
    /// timeout. Returns whether no parse is running anymore.
    pub fn stop(&self) -> bool {
        self.shared.interrupt.store(true, Ordering::Release);
        let stopped = self.shared.wait_idle(self.config.stop_timeout());
        if stopped {
            if let Some(handle) = lock(&self.worker).take() {
                join_worker(handle);
            }
        } else {
            clilog::warn!(
                "parse did not stop within {} ms",
                self.config.stop_timeout_ms
            );
        }
        stopped
    }

    /// Blocks until the current parse ends or `timeout` passes. Returns
    /// whether it ended.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.shared.wait_idle(timeout)
    }

    pub fn state(&self) -> ParseState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ParseState::Finished
    }

    pub fn progress(&self) -> f64 {
        *lock(&self.shared.progress)
    }

    pub fn current_operation(&self) -> String {
        lock(&self.shared.operation).clone()
    }

    /// The parsed model, once the last parse has finished.
    pub fn model(&self) -> Option<Arc<VCD>> {
        lock(&self.shared.model).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ParseEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(id)
    }
}

impl Drop for ParseController {
    fn drop(&mut self) {
        self.shared.interrupt.store(true, Ordering::Release);
        if let Some(handle) = lock(&self.worker).take() {
            join_worker(handle);
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    // a subscriber stopping the parse from its callback runs on the worker
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        clilog::error!("parse worker panicked");
    }
}

fn run(shared: &Shared, config: &ParseConfig, path: &Path, file: File, file_len: u64) {
    match parse_session(shared, config, path, file, file_len) {
        Ok(vcd) => {
            *lock(&shared.model) = Some(Arc::new(vcd));
            shared.set_operation("Finished");
            shared.transition(ParseState::Finished);
            shared.bus.publish(&ParseEvent::Finished);
        }
        Err(ParseError::Interrupted) => {
            clilog::info!("parse of {} interrupted", path.display());
            shared.set_operation("Interrupted");
            shared.transition(ParseState::Interrupted);
        }
        Err(err) => {
            let message = format!("{}: {err}", path.display());
            clilog::error!("parse failed: {message}");
            *lock(&shared.last_error) = Some(message.clone());
            shared.set_operation("Failed");
            shared.transition(ParseState::Failed);
            shared.bus.publish(&ParseEvent::Failed(message));
        }
    }
}

fn parse_session(
    shared: &Shared,
    config: &ParseConfig,
    path: &Path,
    file: File,
    file_len: u64,
) -> Result<VCD, ParseError> {
    // `start` already moved the state to `Analyzing`
    clilog::info!("analyzing {}", path.display());
    shared.bus.publish(&ParseEvent::State(ParseState::Analyzing));
    shared.set_operation("Analyzing structure");
    shared.set_progress(0.0);
    let mut observer = PassObserver::new(shared, file_len, 0.0, config.progress_step);
    let analysis = analyze(&mut WordReader::new(file), &mut observer)?;

    if shared.interrupted() {
        return Err(ParseError::Interrupted);
    }
    shared.transition(ParseState::Allocating);
    shared.set_operation("Allocating change stores");
    let mut vcd = allocate(analysis, config.time_ratio());

    if shared.interrupted() {
        return Err(ParseError::Interrupted);
    }
    shared.transition(ParseState::ValueParsing);
    shared.set_operation("Parsing values");
    // the value pass gets its own handle, starting from the top of the file
    let file = File::open(path)?;
    let mut observer = PassObserver::new(shared, file_len, 0.5, config.progress_step);
    parse_values(&mut WordReader::new(file), &mut vcd, &mut observer)?;

    shared.set_progress(1.0);
    Ok(vcd)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn vcd_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn states_report_running() {
        assert!(!ParseState::Idle.is_running());
        assert!(ParseState::Analyzing.is_running());
        assert!(ParseState::ValueParsing.is_running());
        assert!(!ParseState::Interrupted.is_running());
    }

    #[test]
    fn missing_file_is_rejected_up_front() {
        let controller = ParseController::new(ParseConfig::default());
        let res = controller.start("/no/such/file.vcd");
        assert!(matches!(res, Err(ControllerError::Io { .. })));
        assert_eq!(controller.state(), ParseState::Idle);
    }

    #[test]
    fn small_file_finishes() {
        let file = vcd_file("$var wire 1 ! a $end\n$enddefinitions $end\n#0\n1!\n#3\n0!\n");
        let controller = ParseController::new(ParseConfig::default());
        controller.start(file.path()).unwrap();
        assert!(controller.wait(Duration::from_secs(10)));

        assert!(controller.is_finished());
        assert_eq!(controller.progress(), 1.0);
        assert_eq!(controller.current_operation(), "Finished");
        let vcd = controller.model().unwrap();
        assert_eq!(vcd.store_for_id(1).unwrap().len(), 2);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn broken_file_fails_without_a_model() {
        let file = vcd_file("$scope module top $end\n$upscope $end\n$upscope $end\n");
        let controller = ParseController::new(ParseConfig::default());
        controller.start(file.path()).unwrap();
        assert!(controller.wait(Duration::from_secs(10)));

        assert_eq!(controller.state(), ParseState::Failed);
        assert!(controller.model().is_none());
        assert!(controller.last_error().unwrap().contains("$upscope"));
    }

    #[test]
    fn stop_when_idle_is_immediate() {
        let controller = ParseController::new(ParseConfig::default());
        assert!(controller.stop());
        assert_eq!(controller.state(), ParseState::Idle);
    }
}
