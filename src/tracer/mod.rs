//! Bounded, timeout-safe execution tracing
//!
//! Runs a snippet under the interpreter on a dedicated thread and collects
//! the distinct lines it touches, in first-visit order. Two hard bounds keep
//! arbitrary input harmless:
//!
//! - at most `max_events` distinct lines are recorded; once the cap is hit
//!   the run is cancelled rather than left running with a silenced hook;
//!   the emitted trace is identical either way, the cancelled form just
//!   skips the dead execution
//! - a wall-clock timeout, after which the run is abandoned and whatever
//!   was collected so far is returned
//!
//! An abandoned run is cancelled cooperatively through a shared flag the
//! line hook checks; the thread winds down on its next line event rather
//! than being killed. Snippet faults (exceptions, unsupported constructs)
//! also yield the partial trace, never an error.

pub mod interp;
pub mod value;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use self::interp::{Interrupt, StepHook};

pub const DEFAULT_MAX_EVENTS: usize = 200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds for a single traced run.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Maximum number of distinct lines recorded.
    pub max_events: usize,
    /// Wall-clock budget for the run.
    pub timeout: Duration,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

enum TraceEvent {
    Line(u32),
    Done,
}

/// Hook that forwards each newly-visited line over a channel.
struct ChannelHook {
    seen: HashSet<u32>,
    max_events: usize,
    cancelled: Arc<AtomicBool>,
    tx: mpsc::Sender<TraceEvent>,
}

impl StepHook for ChannelHook {
    fn on_line(&mut self, line: u32) -> Result<(), Interrupt> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Interrupt::Cancelled);
        }
        if !self.seen.insert(line) {
            return Ok(());
        }
        if self.seen.len() > self.max_events {
            // Cap reached: no further distinct line can be recorded, so the
            // rest of the run is pure cost.
            return Err(Interrupt::Cancelled);
        }
        // Never blocks: the channel holds max_events lines plus Done, and
        // the seen-set admits at most max_events sends.
        if self.tx.blocking_send(TraceEvent::Line(line)).is_err() {
            // Receiver gone: the run was abandoned after timeout.
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    fn cancelled(&mut self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Trace `source` under `config`, returning the distinct lines executed in
/// first-visit order. Infallible: faults, timeouts and unsupported input
/// all degrade to a (possibly empty) partial trace.
pub async fn trace(source: &str, config: &TraceConfig) -> Vec<u32> {
    let (tx, mut rx) = mpsc::channel(config.max_events + 1);
    let cancelled = Arc::new(AtomicBool::new(false));

    let source = source.to_string();
    let flag = cancelled.clone();
    let max_events = config.max_events;
    std::thread::spawn(move || {
        let mut hook = ChannelHook {
            seen: HashSet::new(),
            max_events,
            cancelled: flag,
            tx,
        };
        match interp::run(&source, &mut hook) {
            Ok(()) => debug!("traced run completed"),
            Err(Interrupt::Fault(f)) => {
                debug!(kind = %f.kind, message = %f.message, "traced run raised")
            }
            Err(Interrupt::Cancelled) => debug!("traced run cancelled"),
        }
        let _ = hook.tx.blocking_send(TraceEvent::Done);
    });

    let mut lines = Vec::new();
    let outcome = tokio::time::timeout(config.timeout, async {
        while let Some(event) = rx.recv().await {
            match event {
                TraceEvent::Line(line) => lines.push(line),
                TraceEvent::Done => break,
            }
        }
    })
    .await;

    if outcome.is_err() {
        cancelled.store(true, Ordering::Relaxed);
        warn!(
            collected = lines.len(),
            "trace timed out, returning partial trace"
        );
        // Pick up anything the run managed to emit before the deadline.
        while let Ok(event) = rx.try_recv() {
            if let TraceEvent::Line(line) = event {
                lines.push(line);
            }
        }
    }

    debug!(lines = lines.len(), "trace finished");
    lines
}
