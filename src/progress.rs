//! Progress reporting and cooperative cancellation
//!
//! The pipeline runs as one sequential task off the interactive thread. The
//! consumer injects a [`ProgressSink`] to observe overall completion, a
//! [`FailureSink`] to surface user-facing failures, and a
//! [`CancellationToken`] it can set to make the pipeline unwind at the next
//! safe point. No ambient globals: every core entry point takes these
//! explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback receiving overall progress as a fraction in `[0, 1]`.
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// Callback surfacing a user-facing failure: a message plus a dismissal
/// continuation the consumer invokes once the user has acknowledged it.
pub type FailureSink = Arc<dyn Fn(&str, Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Returns a progress sink that discards all updates.
pub fn null_progress() -> ProgressSink {
    Arc::new(|_| {})
}

/// Returns a failure sink that drops the message and runs the continuation.
pub fn null_failure() -> FailureSink {
    Arc::new(|_, dismiss| dismiss())
}

/// Cooperative cancellation flag shared between the pipeline and consumer.
///
/// Cloning yields a handle to the same flag. Coarse-grained: the pipeline
/// polls it at known safe points (per download chunk, per acquisition step,
/// per processed element) and unwinds once it observes `true`.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Irrevocable for the lifetime of the token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Scales per-phase progress into a coherent overall fraction.
///
/// Holds a committed base plus a phase weight. [`set`](Self::set) reports a
/// transient position inside the current step without committing it;
/// [`add`](Self::add) commits completed steps. As long as each phase only
/// reports forward motion, the overall fraction is monotonically
/// non-decreasing.
pub struct ProgressTracker {
    sink: ProgressSink,
    progress: f32,
    modifier: f32,
}

impl ProgressTracker {
    pub fn new(sink: ProgressSink) -> Self {
        Self {
            sink,
            progress: 0.0,
            modifier: 1.0,
        }
    }

    /// Start a new run: reset the committed base and set the phase weight.
    pub fn reset(&mut self, modifier: f32) {
        self.progress = 0.0;
        self.modifier = modifier;
        (self.sink)(0.0);
    }

    /// Report a transient position within the current step.
    pub fn set(&self, value: f32) {
        let overall = self.progress + value.clamp(0.0, 1.0) * self.modifier;
        (self.sink)(overall);
    }

    /// Commit `steps` completed steps at the current weight.
    pub fn add(&mut self, steps: f32) {
        self.progress += steps * self.modifier;
        (self.sink)(self.progress);
    }

    /// Report unconditional completion.
    pub fn finish(&self) {
        (self.sink)(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<f32>>>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&values);
        let sink: ProgressSink = Arc::new(move |v| captured.lock().unwrap().push(v));
        (sink, values)
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_tracker_scales_by_modifier() {
        let (sink, values) = recording_sink();
        let mut tracker = ProgressTracker::new(sink);
        tracker.reset(1.0 / 8.0);
        tracker.set(0.5);
        tracker.add(1.0);
        tracker.add(1.0);
        let values = values.lock().unwrap();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.0625).abs() < 1e-6);
        assert!((values[2] - 0.125).abs() < 1e-6);
        assert!((values[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_tracker_clamps_transient_values() {
        let (sink, values) = recording_sink();
        let tracker = ProgressTracker::new(sink);
        tracker.set(4.0);
        tracker.set(-1.0);
        let values = values.lock().unwrap();
        assert_eq!(*values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_tracker_finish_reports_one() {
        let (sink, values) = recording_sink();
        let tracker = ProgressTracker::new(sink);
        tracker.finish();
        assert_eq!(*values.lock().unwrap(), vec![1.0]);
    }
}
