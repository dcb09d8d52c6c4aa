//! Execution-time measurement.
//!
//! ```rust
//! use tracelog::timer::{measure_time, time_fn};
//!
//! let (sum, elapsed) = time_fn(|| (1..=100).sum::<u32>());
//! assert_eq!(sum, 5050);
//!
//! let done = measure_time("rebuild index");
//! // ... work ...
//! let _took = done();
//! ```
//!
//! [`measure_time`] and [`TimerGuard`] report through `tracing` under the
//! `timer` target.

use std::future::Future;
use std::time::{Duration, Instant};

const TARGET: &str = "timer";

/// Run `f` and return its result with the time it took.
pub fn time_fn<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Wrap `f` so every call reports its duration to `on_complete`.
///
/// The callback runs after `f` returns and is skipped when `f` panics.
pub fn with_timing<T, F, C>(mut f: F, mut on_complete: C) -> impl FnMut() -> T
where
    F: FnMut() -> T,
    C: FnMut(Duration),
{
    move || {
        let start = Instant::now();
        let result = f();
        on_complete(start.elapsed());
        result
    }
}

/// Start measuring `label`; call the returned closure to stop.
///
/// Logs a start line now and `"<label>: <elapsed>"` on stop, and returns the
/// elapsed time.
pub fn measure_time(label: impl Into<String>) -> impl FnOnce() -> Duration {
    let label = label.into();
    tracing::info!(target: TARGET, "starting measurement: {}", label);
    let start = Instant::now();

    move || {
        let elapsed = start.elapsed();
        tracing::info!(
            target: TARGET,
            elapsed_us = elapsed.as_micros() as u64,
            "{}: {:?}",
            label,
            elapsed
        );
        elapsed
    }
}

/// Drop-based [`measure_time`]: reports when it goes out of scope.
///
/// ```rust
/// use tracelog::timer::measure_scope;
///
/// fn load() {
///     let _timer = measure_scope("load config");
///     // ... reported when `load` returns ...
/// }
/// # load();
/// ```
#[must_use = "the measurement ends when the guard is dropped"]
pub struct TimerGuard {
    label: String,
    start: Instant,
}

impl TimerGuard {
    /// Time elapsed so far.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            target: TARGET,
            elapsed_us = elapsed.as_micros() as u64,
            "{}: {:?}",
            self.label,
            elapsed
        );
    }
}

/// Start a [`TimerGuard`] for `label`.
pub fn measure_scope(label: impl Into<String>) -> TimerGuard {
    let label = label.into();
    tracing::info!(target: TARGET, "starting measurement: {}", label);
    TimerGuard {
        label,
        start: Instant::now(),
    }
}

/// Await `fut` and return its output with the wall time it took, including
/// time spent suspended.
pub async fn time_future<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = fut.await;
    (output, start.elapsed())
}
