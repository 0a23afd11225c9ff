//! Console progress and failure reporting.
//!
//! Workers report per-task outcomes here; everything else reads the atomic
//! counters after the pool has quiesced.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};

use shaderbake_common::options::Options;

use crate::planner::Task;

const RED: &str = "\x1b[31m";
const GRAY: &str = "\x1b[90m";
const WHITE: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

pub struct Reporter {
    platform: &'static str,
    colorize: bool,
    original_task_count: u32,
    processed_task_count: AtomicU32,
    failed_task_count: AtomicU32,
}

impl Reporter {
    pub fn new(options: &Options, original_task_count: u32) -> Self {
        Reporter {
            platform: options.platform.as_str(),
            colorize: options.colorize,
            original_task_count,
            processed_task_count: AtomicU32::new(0),
            failed_task_count: AtomicU32::new(0),
        }
    }

    fn color(&self, code: &'static str) -> &'static str {
        if self.colorize {
            code
        } else {
            ""
        }
    }

    // Build tools often run under CMake or ninja with a pipe for stdout;
    // flush so progress interleaves correctly with the compiler's output.
    fn print(&self, message: std::fmt::Arguments<'_>) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_fmt(message);
        let _ = stdout.write_all(self.color(WHITE).as_bytes());
        let _ = stdout.write_all(b"\n");
        let _ = stdout.flush();
    }

    pub fn task_succeeded(&self, task: &Task, message: &str) {
        let processed = self.processed_task_count.fetch_add(1, Ordering::SeqCst) + 1;
        let progress = 100.0 * processed as f64 / self.original_task_count.max(1) as f64;

        if message.trim().is_empty() {
            self.print(format_args!(
                "{}[{:5.1}%]{} {}{} {}{} {{{}}}{} {{{}}}",
                self.color(GREEN),
                progress,
                self.color(GRAY),
                self.platform,
                self.color(WHITE),
                task.source.display(),
                self.color(GRAY),
                task.entry_point,
                self.color(WHITE),
                task.combined_defines,
            ));
        } else {
            // Warnings came back from the compiler; keep the whole line loud.
            self.print(format_args!(
                "{}[{:5.1}%] {} {} {{{}}} {{{}}}\n{}",
                self.color(YELLOW),
                progress,
                self.platform,
                task.source.display(),
                task.entry_point,
                task.combined_defines,
                message.trim_end(),
            ));
        }
    }

    pub fn task_retry_queued(&self, task: &Task) {
        self.print(format_args!(
            "{}[ RETRY-QUEUED ] {} {} {{{}}} {{{}}}",
            self.color(YELLOW),
            self.platform,
            task.source.display(),
            task.entry_point,
            task.combined_defines,
        ));
    }

    pub fn task_failed(&self, task: &Task, message: &str) {
        self.failed_task_count.fetch_add(1, Ordering::SeqCst);

        let message = if message.trim().is_empty() {
            "<no message text>"
        } else {
            message.trim_end()
        };
        self.print(format_args!(
            "{}[ FAIL ] {} {} {{{}}} {{{}}}\n{}",
            self.color(RED),
            self.platform,
            task.source.display(),
            task.entry_point,
            task.combined_defines,
            message,
        ));
    }

    pub fn error(&self, message: &str) {
        self.print(format_args!("{}ERROR: {}", self.color(RED), message));
    }

    pub fn warning(&self, message: &str) {
        self.print(format_args!("{}WARNING: {}", self.color(YELLOW), message));
    }

    /// Plain informational line, used for `--verbose` command echo.
    pub fn note(&self, message: &str) {
        self.print(format_args!("{}{}", self.color(WHITE), message));
    }

    pub fn failed_count(&self) -> u32 {
        self.failed_task_count.load(Ordering::SeqCst)
    }

    pub fn original_count(&self) -> u32 {
        self.original_task_count
    }
}
