//! # softmap
//!
//! Concurrent hash map whose values may be reclaimed under memory pressure
//! while their keys are still mapped.
//!
//! ## Architecture
//! - **SoftCell**: a key plus a value that can be cleared once, reporting
//!   itself on a reclaim queue when it is
//! - **ReclaimQueue**: lock-free many-producer queue of reclaimed cells
//! - **SoftMap**: DashMap of cells; removes reclaimed keys lazily on read and
//!   drains the reclaim queue in bounded sweeps once dead reads accumulate
//! - **Reaper**: the reclamation policy, clearing the least recently read
//!   soft values when a [`PressureProbe`] reports memory pressure
//!
//! ## Example
//! ```
//! use softmap::SoftMap;
//!
//! let map = SoftMap::new();
//! map.put_soft("a", 1);
//! map.put_soft("b", 2);
//!
//! map.reclaim("a");
//! assert_eq!(map.get_soft("a"), None);
//! assert!(!map.contains_key("a"));
//! assert_eq!(map.get_soft("b").as_deref(), Some(&2));
//! ```

#![warn(missing_docs)]

mod cell;
mod config;
mod entry;
mod error;
mod map;
mod queue;
mod reaper;
mod stats;

pub use cell::SoftCell;
pub use config::{SoftMapConfig, DEFAULT_SWEEP_THRESHOLD};
pub use entry::SoftEntry;
pub use error::{Error, Result};
pub use map::SoftMap;
pub use queue::ReclaimQueue;
pub use reaper::{
    ManualPressure, MemoryPressure, MemoryThresholds, PressureProbe, ReapReport, Reaper,
    ReaperConfig, SystemMemoryProbe,
};
pub use stats::SoftMapStats;
