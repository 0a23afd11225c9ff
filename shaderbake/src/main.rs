//! shaderbake - multi-threaded shader compiling & processing tool.
//!
//! Reads a config file listing shader sources, profiles, entry points and
//! macro permutations; decides which permutations are stale from
//! `#include`-aware timestamps; drives the configured compiler over a
//! worker pool; and packs per-shader permutation blobs.

mod assemble;
mod cli;
mod driver;
mod output;
mod planner;
mod pool;
mod report;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use shaderbake_common::options::Options;

use crate::planner::Planner;
use crate::report::Reporter;

fn main() -> ExitCode {
    let started = Instant::now();
    let args = cli::Args::parse();

    match run(args, started) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Args, started: Instant) -> Result<ExitCode> {
    let options = cli::build_options(args)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
            eprintln!("Aborting...");
        })
        .context("cannot install the interrupt handler")?;
    }

    // Part of the spawn contract: build scripts invoked by the compiler can
    // find out who is driving them.
    if !options.use_api {
        std::env::set_var("COMPILER", &options.compiler);
    }

    let plan = Planner::new(&options)?.plan()?;

    if plan.tasks.is_empty() {
        println!("All {} shaders are up to date.", options.platform.as_str());
        return Ok(ExitCode::SUCCESS);
    }

    println!("Using compiler: {}", options.compiler.display());

    let reporter = Reporter::new(&options, plan.tasks.len() as u32);
    run_pool(&options, plan.tasks, &reporter, &cancel);

    // A fatal error or a termination request; skip blob building.
    if cancel.load(Ordering::SeqCst) {
        return Ok(ExitCode::FAILURE);
    }

    let blobs_ok = if options.is_blob() {
        assemble::assemble_blobs(&options, &plan.blobs, &reporter)
    } else {
        true
    };

    let failed = reporter.failed_count();
    if failed > 0 {
        reporter.warning(&format!("{failed} task(s) failed to complete!"));
    } else {
        println!(
            "{} task(s) completed successfully.",
            reporter.original_count()
        );
    }
    println!(
        "Elapsed time {:.2} ms",
        started.elapsed().as_secs_f64() * 1000.0
    );

    if blobs_ok && failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_pool(options: &Options, tasks: Vec<planner::Task>, reporter: &Reporter, cancel: &AtomicBool) {
    if options.use_api {
        #[cfg(feature = "api")]
        pool::run_tasks(options, tasks, reporter, cancel, || {
            driver::api::ApiDriver::new(options, reporter)
        });
        // Validation rejects --useAPI when the feature is compiled out.
        #[cfg(not(feature = "api"))]
        unreachable!("--useAPI is rejected during options validation");
    } else {
        pool::run_tasks(options, tasks, reporter, cancel, || {
            Some(driver::exe::ExeDriver::new(options, reporter))
        });
    }
}
