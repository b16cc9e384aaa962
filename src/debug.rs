//! # Debugging and Logging Utilities
//!
//! Conditional logging and simple performance measurement for the compiler
//! pipeline. Logging is gated by environment variables rather than a
//! external logging crate, matching the minimal ambient footprint the rest
//! of this binary aims for.

use std::time::Instant;

/// Checks if the general debug mode is active.
///
/// Debugging is enabled if the `LICE_DEBUG` environment variable is set, or
/// if the code is compiled with `debug_assertions` enabled (the default for
/// `cargo build`).
pub fn is_debug_enabled() -> bool {
    std::env::var("LICE_DEBUG").is_ok() || cfg!(debug_assertions)
}

/// Checks if verbose/performance tracking mode is active.
///
/// Enabled if the `LICE_VERBOSE` environment variable is set.
pub fn is_perf_enabled() -> bool {
    std::env::var("LICE_VERBOSE").is_ok()
}

/// Logs a message related to the lexer phase, only if debug mode is active.
pub fn log_lexer(msg: &str) {
    if is_debug_enabled() {
        eprintln!("[lexer] {}", msg);
    }
}

/// Logs a message related to the parser/semantic phase, only if debug mode
/// is active.
pub fn log_parser(msg: &str) {
    if is_debug_enabled() {
        eprintln!("[parser] {}", msg);
    }
}

/// Logs a message related to the code generation phase, only if debug mode
/// is active.
pub fn log_codegen(msg: &str) {
    if is_debug_enabled() {
        eprintln!("[codegen] {}", msg);
    }
}

/// Logs a general message related to driver orchestration, only if debug
/// mode is active.
pub fn log_compiler(msg: &str) {
    if is_debug_enabled() {
        eprintln!("[lice] {}", msg);
    }
}

/// A simple structure for timing the duration of a compiler phase.
///
/// Usage: `let timer = PerfTimer::new("parse"); ... timer.finish();`
pub struct PerfTimer {
    start: Instant,
    label: String,
}

impl PerfTimer {
    /// Creates a new timer instance, capturing the current moment.
    pub fn new(label: &str) -> Self {
        Self {
            start: Instant::now(),
            label: label.to_string(),
        }
    }

    /// Stops the timer and prints the elapsed duration if `LICE_VERBOSE` is
    /// set.
    pub fn finish(self) {
        if is_perf_enabled() {
            let duration = self.start.elapsed();
            eprintln!("[perf] {}: {:?}", self.label, duration);
        }
    }
}
