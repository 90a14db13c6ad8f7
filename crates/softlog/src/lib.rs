//! # softlog
//!
//! Named logger handles with `{}` message templates, cached in a
//! [`softmap::SoftMap`] so each name is built once and may be dropped again
//! under memory pressure.
//!
//! ```
//! let log = softlog::logger("payments");
//! log.info("charged {} cents to {}", &[&1250, &"acct-7"]);
//!
//! assert!(std::sync::Arc::ptr_eq(&log, &softlog::logger(" payments ")));
//! ```

#![warn(missing_docs)]

mod logger;
mod registry;

pub use logger::{fill_placeholders, EnhancedLogger};
pub use registry::{global, logger, logger_for, LoggerRegistry, ROOT_LOGGER_NAME};

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, at `INFO` by default.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_subscriber() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .try_init()
        .is_ok()
}
