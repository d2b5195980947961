//! Verbosity-gated logging macros for the scheduling loops.
//!
//! The schedulers narrate their decisions at three levels, controlled by a
//! verbosity value carried in the config (no global state):
//! - 1: CHANGES (task assignments, time advances)
//! - 2: CHECKS (task consideration, skip reasons)
//! - 3: DEBUG (full algorithm internals)
//!
//! Messages are routed through the `log` facade so the host application's
//! logger decides where they end up.

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1): assignments and time advances.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            log::debug!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2): consideration and skip reasons.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            log::trace!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3): algorithm internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            log::trace!($($arg)*);
        }
    };
}
