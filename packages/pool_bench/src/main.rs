//! Binary entry point for the pool comparison driver.
//!
//! Repeats the pooled-versus-standard comparison a configurable number of
//! times, printing per-round timings and pass/fail, and exits nonzero at the
//! first failed round.

use std::process::ExitCode;

use argh::FromArgs;
use pool_bench::run_trial;

/// Compare the small-object pool allocator against the general-purpose
/// allocator on an ordered-map workload.
#[derive(FromArgs)]
struct Args {
    /// number of comparison rounds to run
    #[argh(option, default = "10")]
    trials: u32,

    /// number of map entries per round
    #[argh(option, default = "1_000_000")]
    entries: u64,
}

// Binary entry point - exercising process exit codes requires spawning
// subprocesses, which the library-level tests already cover indirectly.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    for round in 1..=args.trials {
        match run_trial(args.entries) {
            Ok(report) => {
                println!(
                    "round {round}: pass - pooled {} ms, standard {} ms, {} bytes of entries",
                    report.pooled_ms, report.standard_ms, report.aggregate_size
                );
            }
            Err(error) => {
                eprintln!("round {round}: fail - {error}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
