#![deny(missing_docs)]
//! Shared logging utilities for the hub workspace.
//!
//! This crate provides the `hub_*` logging macros used across the codebase,
//! a per-thread draft context that prefixes log lines, and a minimal test
//! initializer for the global logger.

use std::cell::RefCell;

thread_local! {
    /// Draft id the current thread is working on, if any.
    static DRAFT_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the draft id that subsequent log lines on this thread refer to.
/// The main loop calls this whenever a draft is mounted or unmounted.
pub fn set_draft_context(draft_id: Option<&str>) {
    DRAFT_CONTEXT.with(|ctx| *ctx.borrow_mut() = draft_id.map(str::to_owned));
}

/// Returns the draft id set for the current thread, if any.
pub fn draft_context() -> Option<String> {
    DRAFT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Prefix used by the logging macros: `"[draft=<id>] "` or empty.
#[doc(hidden)]
pub fn context_prefix() -> String {
    DRAFT_CONTEXT.with(|ctx| match ctx.borrow().as_deref() {
        Some(id) => format!("[draft={id}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! hub_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! hub_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! hub_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! hub_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! hub_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
