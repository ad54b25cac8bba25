//! pipeline/tracker.rs
//! Aggregates the completions of one `process` call.
//!
//! Design notes:
//! - Created fresh per call and shared with the accelerator through `Arc`.
//! - The done signal fires at most once, when every expected lane has been
//!   submitted and every submitted lane has completed. Submission and
//!   completion both re-check the condition under the same lock, so a
//!   callback that races ahead of `note_submitted` cannot strand the waiter.
//! - A submission failure truncates the expected count; lanes already in
//!   flight are still waited for.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::accelerator::{CompletionHandler, OpCompletion};

/// How the submitting thread waits for completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Park on the done signal; degrades to spin-yield if the signal is lost.
    #[default]
    Park,
    /// Poll with `thread::yield_now` between checks.
    SpinYield,
}

#[derive(Debug)]
struct TrackerState {
    expected: usize,
    submitted: usize,
    processed: usize,
    verified: bool,
    signalled: bool,
    completions: Vec<Option<OpCompletion>>,
}

/// Final state of a tracked call.
#[derive(Debug)]
pub struct TrackerOutcome {
    pub submitted: usize,
    pub processed: usize,
    /// Every processed lane succeeded and verified.
    pub verified: bool,
    /// Completions indexed by lane; `None` for lanes never submitted.
    pub completions: Vec<Option<OpCompletion>>,
}

#[derive(Debug)]
pub struct CompletionTracker {
    state: Mutex<TrackerState>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl CompletionTracker {
    /// Tracker for a call of `lanes` lanes (1 when not pipelining).
    pub fn new(lanes: usize) -> Self {
        let (done_tx, done_rx) = bounded(1);
        let mut completions = Vec::with_capacity(lanes);
        completions.resize_with(lanes, || None);
        Self {
            state: Mutex::new(TrackerState {
                expected: lanes,
                submitted: 0,
                processed: 0,
                verified: true,
                signalled: false,
                completions,
            }),
            done_tx,
            done_rx,
        }
    }

    /// Count one accepted submission.
    pub fn note_submitted(&self) {
        let mut st = self.lock();
        st.submitted += 1;
        self.check_done(&mut st);
    }

    /// Stop expecting lanes beyond the ones already submitted.
    pub fn truncate_to_submitted(&self) {
        let mut st = self.lock();
        st.expected = st.submitted;
        self.check_done(&mut st);
    }

    pub fn is_done(&self) -> bool {
        self.lock().signalled
    }

    /// Block until the done signal fires.
    pub fn wait(&self, strategy: WaitStrategy) {
        if strategy == WaitStrategy::Park {
            loop {
                match self.done_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(()) => return,
                    Err(RecvTimeoutError::Timeout) => {
                        // the signal may already have been drained
                        if self.is_done() {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        warn!("completion signal lost; falling back to spin-yield");
                        break;
                    }
                }
            }
        }
        while !self.is_done() {
            std::thread::yield_now();
        }
    }

    /// Consume the tracker state once waiting has finished.
    pub fn finish(&self) -> TrackerOutcome {
        let mut st = self.lock();
        TrackerOutcome {
            submitted: st.submitted,
            processed: st.processed,
            verified: st.verified,
            completions: std::mem::take(&mut st.completions),
        }
    }

    fn check_done(&self, st: &mut TrackerState) {
        if !st.signalled && st.submitted == st.expected && st.processed == st.submitted {
            st.signalled = true;
            let _ = self.done_tx.try_send(());
            debug!(lanes = st.processed, verified = st.verified, "call complete");
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // state stays consistent even if a handler panicked mid-update
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl CompletionHandler for CompletionTracker {
    fn on_complete(&self, completion: OpCompletion) {
        let mut st = self.lock();
        st.processed += 1;
        if !completion.is_success() {
            st.verified = false;
        }
        let lane = completion.lane;
        match st.completions.get_mut(lane) {
            Some(slot) => *slot = Some(completion),
            None => {
                warn!(lane, "completion for unknown lane");
                st.verified = false;
            }
        }
        self.check_done(&mut st);
    }
}
