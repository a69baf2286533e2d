use std::alloc::Global;
use std::panic::{self, AssertUnwindSafe};

use small_pool::{PoolAllocator, pooled_page_count};
use thiserror::Error;

use crate::{execution, populate_and_measure};

/// Timings and checks from one passed comparison round.
#[derive(Debug)]
#[non_exhaustive]
pub struct TrialReport {
    /// Wall-clock milliseconds for the pooled run.
    pub pooled_ms: u128,

    /// Wall-clock milliseconds for the general-purpose run.
    pub standard_ms: u128,

    /// The aggregate entry size both runs agreed on.
    pub aggregate_size: usize,
}

/// Ways a comparison round can fail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrialError {
    /// The workload panicked, typically because an allocation failed inside
    /// the container.
    #[error("the {allocator} workload panicked")]
    WorkloadPanicked {
        /// Which of the two runs panicked.
        allocator: &'static str,
    },

    /// The two runs disagreed on the aggregate entry size.
    #[error("aggregate sizes disagree: pooled {pooled}, standard {standard}")]
    SumMismatch {
        /// Aggregate reported by the pooled run.
        pooled: usize,

        /// Aggregate reported by the general-purpose run.
        standard: usize,
    },

    /// The pools still held pages after the pooled map was dropped.
    #[error("{remaining} pages were not reclaimed after the workload")]
    PagesLeaked {
        /// Pages still held across all pools.
        remaining: usize,
    },
}

/// Runs one comparison round over `entries` map entries.
///
/// The pooled workload runs first; once its map is gone, every pool must
/// report zero pages. A panic in either workload is caught and reported as a
/// failed round rather than terminating the process.
///
/// # Errors
///
/// See [`TrialError`] for the individual failure modes.
pub fn run_trial(entries: u64) -> Result<TrialReport, TrialError> {
    let (pooled_ms, pooled_size) = run_guarded("pooled", || {
        populate_and_measure(PoolAllocator::new(), entries)
    })?;

    let remaining = pooled_page_count();
    if remaining > 0 {
        return Err(TrialError::PagesLeaked { remaining });
    }

    let (standard_ms, standard_size) =
        run_guarded("standard", || populate_and_measure(Global, entries))?;

    if pooled_size != standard_size {
        return Err(TrialError::SumMismatch {
            pooled: pooled_size,
            standard: standard_size,
        });
    }

    Ok(TrialReport {
        pooled_ms,
        standard_ms,
        aggregate_size: pooled_size,
    })
}

/// Times one workload run, converting a panic into a failed round.
fn run_guarded(
    allocator: &'static str,
    workload: impl FnOnce() -> usize,
) -> Result<(u128, usize), TrialError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut aggregate_size = 0_usize;
        let elapsed_ms = execution(|| aggregate_size = workload());

        (elapsed_ms, aggregate_size)
    }))
    .map_err(|_payload| TrialError::WorkloadPanicked { allocator })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_passes_and_reports_matching_sums() {
        let report = run_trial(10_000).unwrap();

        let per_entry = size_of::<u64>() + size_of::<String>();
        assert_eq!(report.aggregate_size, per_entry * 10_000);
    }

    #[test]
    fn empty_round_passes() {
        let report = run_trial(0).unwrap();

        assert_eq!(report.aggregate_size, 0);
    }

    #[test]
    fn panicking_workload_becomes_a_failed_round() {
        let result = run_guarded("pooled", || panic!("simulated allocation failure"));

        assert!(matches!(
            result,
            Err(TrialError::WorkloadPanicked { allocator: "pooled" })
        ));
    }
}
