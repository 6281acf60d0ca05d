//! Progress reporting (§4.D, §6): an optional callback invoked once per completed tile.

use parking_lot::Mutex;

/// Callback invoked with `(tiles_done, tiles_total)` once per completed tile.
///
/// Delivery is serialized through an internal mutex, so the callback never observes
/// concurrent invocations even though tiles complete on different worker threads; the
/// counts it receives are monotonically non-decreasing.
pub trait ProgressSink: Send {
    /// Called once per completed tile, including degenerate (empty) tiles.
    fn on_progress(&mut self, tiles_done: usize, tiles_total: usize);
}

impl<F: FnMut(usize, usize) + Send> ProgressSink for F {
    fn on_progress(&mut self, tiles_done: usize, tiles_total: usize) {
        self(tiles_done, tiles_total)
    }
}

/// The running tile count and the sink it is reported to, behind one lock so that
/// incrementing the count and invoking the callback happen as a single atomic step.
struct ProgressState<'a> {
    done: usize,
    sink: Option<&'a mut dyn ProgressSink>,
}

/// Thread-safe wrapper shared by reference across worker tasks.
pub(crate) struct SharedProgress<'a> {
    state: Mutex<ProgressState<'a>>,
    total: usize,
}

impl<'a> SharedProgress<'a> {
    pub(crate) fn new(sink: Option<&'a mut dyn ProgressSink>, total: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState { done: 0, sink }),
            total,
        }
    }

    /// Reports that one more tile has finished. Incrementing the shared counter and
    /// invoking the sink happen under the same lock acquisition, so two workers can
    /// never interleave such that the sink observes a larger count before a smaller
    /// one (§4.D: "the counts are monotonically non-decreasing").
    pub(crate) fn tile_done(&self) {
        let mut state = self.state.lock();
        state.done += 1;
        let done = state.done;
        if let Some(sink) = &mut state.sink {
            sink.on_progress(done, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_implement_progress_sink() {
        let calls = AtomicUsize::new(0);
        let mut sink = |_done: usize, _total: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let shared = SharedProgress::new(Some(&mut sink), 3);
        shared.tile_done();
        shared.tile_done();
        drop(shared);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tile_done_reports_monotonically_increasing_counts() {
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        let mut sink = |done: usize, _total: usize| {
            seen.lock().push(done);
        };
        let shared = SharedProgress::new(Some(&mut sink), 3);
        shared.tile_done();
        shared.tile_done();
        shared.tile_done();
        drop(shared);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn no_sink_is_a_no_op() {
        let shared: SharedProgress = SharedProgress::new(None, 0);
        shared.tile_done();
    }
}
