//! Cache of logger handles keyed by name

use std::any::type_name;
use std::sync::Arc;

use once_cell::sync::Lazy;
use softmap::SoftMap;

use crate::logger::EnhancedLogger;

/// Name of the logger returned for blank names
pub const ROOT_LOGGER_NAME: &str = "ROOT";

static GLOBAL: Lazy<LoggerRegistry> = Lazy::new(LoggerRegistry::new);

/// Hands out shared [`EnhancedLogger`]s, building each name once.
///
/// Handles are held softly: a reclaimer may drop them under memory pressure,
/// in which case the next lookup builds a fresh one.
#[derive(Debug)]
pub struct LoggerRegistry {
    pool: SoftMap<String, EnhancedLogger>,
    root: Arc<EnhancedLogger>,
}

impl LoggerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_pool(SoftMap::new())
    }

    /// Create a registry caching loggers in `pool`
    pub fn with_pool(pool: SoftMap<String, EnhancedLogger>) -> Self {
        Self {
            pool,
            root: Arc::new(EnhancedLogger::new(ROOT_LOGGER_NAME)),
        }
    }

    /// Logger for `name`; blank names get the root logger
    pub fn on(&self, name: &str) -> Arc<EnhancedLogger> {
        let name = name.trim();
        if name.is_empty() {
            return Arc::clone(&self.root);
        }
        self.pool
            .get_or_insert_soft_with(name.to_owned(), || EnhancedLogger::new(name))
    }

    /// Logger named after the type `T`
    pub fn on_type<T: ?Sized>(&self) -> Arc<EnhancedLogger> {
        self.on(type_name::<T>())
    }

    /// The root logger
    pub fn root(&self) -> Arc<EnhancedLogger> {
        Arc::clone(&self.root)
    }

    /// Backing cache
    pub fn pool(&self) -> &SoftMap<String, EnhancedLogger> {
        &self.pool
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry, created on first use
pub fn global() -> &'static LoggerRegistry {
    &GLOBAL
}

/// Logger for `name` from the process-wide registry
pub fn logger(name: &str) -> Arc<EnhancedLogger> {
    global().on(name)
}

/// Logger named after `T` from the process-wide registry
pub fn logger_for<T: ?Sized>() -> Arc<EnhancedLogger> {
    global().on_type::<T>()
}
