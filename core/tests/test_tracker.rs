// Completion tracker: one done signal per call, whatever order submissions
// and completions arrive in.

#[cfg(test)]
mod tests {

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cipher_offload::accelerator::{AcceleratorError, CompletionHandler, OpCompletion};
use cipher_offload::pipeline::{CompletionTracker, WaitStrategy};

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

fn ok(lane: usize) -> OpCompletion {
    OpCompletion { lane, status: Ok(()), verified: true, buffer: vec![lane as u8; 4] }
}

fn unverified(lane: usize) -> OpCompletion {
    OpCompletion { lane, status: Ok(()), verified: false, buffer: Vec::new() }
}

fn failed(lane: usize) -> OpCompletion {
    OpCompletion {
        lane,
        status: Err(AcceleratorError::Operation("device fault".into())),
        verified: true,
        buffer: Vec::new(),
    }
}

// ----------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------

#[test]
fn all_lanes_complete_from_worker_threads() {
    for strategy in [WaitStrategy::Park, WaitStrategy::SpinYield] {
        let tracker = Arc::new(CompletionTracker::new(8));
        let mut workers = Vec::new();
        for lane in 0..8 {
            tracker.note_submitted();
            let t = tracker.clone();
            workers.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(lane as u64));
                t.on_complete(ok(lane));
            }));
        }
        tracker.wait(strategy);
        assert!(tracker.is_done());

        let outcome = tracker.finish();
        assert_eq!((outcome.submitted, outcome.processed), (8, 8));
        assert!(outcome.verified);
        for (lane, c) in outcome.completions.iter().enumerate() {
            let c = c.as_ref().unwrap();
            assert_eq!(c.lane, lane);
            assert_eq!(c.buffer, vec![lane as u8; 4]);
        }
        for w in workers {
            w.join().unwrap();
        }
    }
}

#[test]
fn completion_racing_ahead_of_submission_bookkeeping() {
    // the callback fires before the submitter counts the lane
    let tracker = CompletionTracker::new(2);
    tracker.on_complete(ok(0));
    tracker.note_submitted();
    assert!(!tracker.is_done());

    tracker.on_complete(ok(1));
    assert!(!tracker.is_done(), "second lane not yet counted as submitted");
    tracker.note_submitted();
    assert!(tracker.is_done());
    tracker.wait(WaitStrategy::Park);
}

#[test]
fn many_racing_calls_never_hang() {
    for round in 0..200 {
        let lanes = round % 5 + 1;
        let tracker = Arc::new(CompletionTracker::new(lanes));
        let handles: Vec<_> = (0..lanes)
            .map(|lane| {
                let t = tracker.clone();
                thread::spawn(move || t.on_complete(ok(lane)))
            })
            .collect();
        for _ in 0..lanes {
            tracker.note_submitted();
        }
        tracker.wait(WaitStrategy::Park);
        assert_eq!(tracker.finish().processed, lanes);
        for h in handles {
            h.join().unwrap();
        }
    }
}

#[test]
fn failures_clear_the_verified_flag() {
    for bad in [unverified(1), failed(1)] {
        let tracker = CompletionTracker::new(2);
        tracker.note_submitted();
        tracker.note_submitted();
        tracker.on_complete(ok(0));
        tracker.on_complete(bad);
        tracker.wait(WaitStrategy::SpinYield);

        let outcome = tracker.finish();
        assert!(!outcome.verified);
        assert_eq!(outcome.processed, 2);
    }
}

#[test]
fn truncation_waits_only_for_submitted_lanes() {
    let tracker = Arc::new(CompletionTracker::new(4));
    tracker.note_submitted();
    tracker.note_submitted();
    // third submission rejected
    tracker.truncate_to_submitted();
    assert!(!tracker.is_done(), "two lanes still in flight");

    let t = tracker.clone();
    let h = thread::spawn(move || {
        t.on_complete(ok(1));
        t.on_complete(ok(0));
    });
    tracker.wait(WaitStrategy::Park);
    h.join().unwrap();

    let outcome = tracker.finish();
    assert_eq!((outcome.submitted, outcome.processed), (2, 2));
    assert!(outcome.completions[2].is_none() && outcome.completions[3].is_none());
}

#[test]
fn truncation_before_any_submission_is_done() {
    let tracker = CompletionTracker::new(3);
    tracker.truncate_to_submitted();
    assert!(tracker.is_done());
    tracker.wait(WaitStrategy::Park);
    assert_eq!(tracker.finish().submitted, 0);
}

#[test]
fn completion_for_unknown_lane_is_a_failure() {
    let tracker = CompletionTracker::new(1);
    tracker.note_submitted();
    tracker.on_complete(ok(5));
    tracker.wait(WaitStrategy::SpinYield);
    assert!(!tracker.finish().verified);
}

#[test]
fn second_wait_returns_after_signal_consumed() {
    let tracker = CompletionTracker::new(1);
    tracker.note_submitted();
    tracker.on_complete(ok(0));
    tracker.wait(WaitStrategy::Park);
    // the signal is gone; the state check still ends the wait
    tracker.wait(WaitStrategy::Park);
    assert!(tracker.is_done());
}

}
