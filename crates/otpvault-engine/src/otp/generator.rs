//! Tick-driven code generation.
//!
//! A [`CodeGenerator`] owns a background task that recomputes the code
//! set for a list of entries on a fixed tick (default 500 ms) and
//! publishes through a `tokio::sync::watch` channel, so:
//!
//! - observers joining late immediately see the latest snapshot,
//! - a snapshot is only published when it differs from the previous one
//!   (ticks inside the same code window are silent),
//! - dropping or cancelling the generator stops the task and ends every
//!   stream.
//!
//! One failing entry never poisons the others: each slot in a snapshot
//! is its own `Result`.

use crate::otp::core;
use crate::otp::types::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default recompute tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// One code per entry, in the order the entries were given.
pub type CodeSnapshot = Vec<Result<EntryCode, OtpError>>;

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Generator configuration.
#[derive(Clone)]
pub struct GeneratorConfig {
    /// How often codes are recomputed.
    pub tick: Duration,
    /// Time source, unix seconds. `None` means the system clock.
    clock: Option<Clock>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            clock: None,
        }
    }
}

impl GeneratorConfig {
    /// Builder: set the tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Builder: replace the system clock (timing tests).
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    fn now(&self) -> u64 {
        match &self.clock {
            Some(clock) => clock(),
            None => core::current_unix_time(),
        }
    }

    /// Tick length in whole seconds, rounded up. Reported as the
    /// `seconds_remaining` of counter-based entries.
    fn tick_seconds(&self) -> u32 {
        ((self.tick.as_millis() + 999) / 1000) as u32
    }
}

/// Owns the background recompute task. Dropping it stops the task.
pub struct CodeGenerator {
    rx: watch::Receiver<CodeSnapshot>,
    handle: JoinHandle<()>,
}

impl CodeGenerator {
    /// Start generating codes for `entries`.
    ///
    /// The first snapshot is computed synchronously, so [`Self::latest`]
    /// and any stream opened right away already hold real codes.
    pub fn start(entries: Vec<Entry>, config: GeneratorConfig) -> Self {
        let initial = compute_snapshot(&entries, config.now(), config.tick_seconds());
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(run_ticker(entries, config, tx));

        Self { rx, handle }
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> CodeSnapshot {
        self.rx.borrow().clone()
    }

    /// Open a stream of snapshot changes. The stream starts at the
    /// latest snapshot, so late joiners never wait for a rollover.
    pub fn stream(&self) -> CodeStream {
        CodeStream {
            rx: self.rx.clone(),
        }
    }

    /// Stop the background task. Every open stream ends after the
    /// change it has already observed.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the background task has stopped.
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CodeGenerator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_ticker(entries: Vec<Entry>, config: GeneratorConfig, tx: watch::Sender<CodeSnapshot>) {
    let mut interval =
        tokio::time::interval_at(tokio::time::Instant::now() + config.tick, config.tick);
    let tick_seconds = config.tick_seconds();
    loop {
        interval.tick().await;
        let snapshot = compute_snapshot(&entries, config.now(), tick_seconds);
        // Emit-on-change: skip the send when nothing rolled over.
        let changed = *tx.borrow() != snapshot;
        if changed && tx.send(snapshot).is_err() {
            // Generator and all streams are gone.
            log::debug!("code ticker stopping: no receivers left");
            return;
        }
    }
}

fn compute_snapshot(entries: &[Entry], unix_seconds: u64, tick_seconds: u32) -> CodeSnapshot {
    entries
        .iter()
        .map(|entry| {
            core::generate_at(entry, unix_seconds).map(|mut code| {
                if !entry.entry_type.is_time_based() {
                    // Counter-based codes only change on demand; report
                    // the poll interval instead of a window.
                    code.seconds_remaining = tick_seconds;
                }
                code
            })
        })
        .collect()
}

/// A change stream over published snapshots.
pub struct CodeStream {
    rx: watch::Receiver<CodeSnapshot>,
}

impl CodeStream {
    /// The latest snapshot, without waiting.
    pub fn latest(&self) -> CodeSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot. Returns `None` once the
    /// generator has been cancelled or dropped.
    pub async fn next_change(&mut self) -> Option<CodeSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Adapt into a `futures::Stream` of snapshots, starting with the
    /// current one.
    pub fn into_stream(self) -> tokio_stream::wrappers::WatchStream<CodeSnapshot> {
        tokio_stream::wrappers::WatchStream::new(self.rx)
    }
}
