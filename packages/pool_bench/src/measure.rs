use std::time::{Duration, Instant};

/// Runs `f` and returns the elapsed wall-clock time in milliseconds.
///
/// # Example
///
/// ```
/// let elapsed_ms = pool_bench::execution(|| {
///     std::thread::sleep(std::time::Duration::from_millis(5));
/// });
///
/// assert!(elapsed_ms >= 5);
/// ```
#[must_use]
pub fn execution<R>(f: impl FnOnce() -> R) -> u128 {
    duration(f).as_millis()
}

/// Runs `f` and returns the elapsed wall-clock time.
#[must_use]
pub fn duration<R>(f: impl FnOnce() -> R) -> Duration {
    let start = Instant::now();

    _ = f();

    start.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_covers_the_callable() {
        let slept = duration(|| std::thread::sleep(Duration::from_millis(10)));

        assert!(slept >= Duration::from_millis(10));
    }

    #[test]
    fn execution_reports_whole_milliseconds() {
        let elapsed_ms = execution(|| std::thread::sleep(Duration::from_millis(10)));

        assert!(elapsed_ms >= 10);
    }
}
