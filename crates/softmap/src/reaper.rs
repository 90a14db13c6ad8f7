//! Memory-pressure driven reclamation
//!
//! Rust has no collector that clears soft references on its own, so the
//! decision is made here: a [`PressureProbe`] reports how tight memory is, and
//! a reap pass reclaims the least recently read soft values in proportion.
//! Weak entries whose owners are gone are reported on every pass.
//!
//! Reaping only clears values and queues notifications. Removing the keys is
//! still left to reads and sweeps on the map.

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::System;
use tracing::{debug, warn};

use crate::error::Result;
use crate::map::SoftMap;

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    /// Plenty of memory available
    Low,
    /// Memory usage is moderate
    Medium,
    /// Memory usage is high, start reclaiming
    High,
    /// Critical memory shortage, reclaim everything soft
    Critical,
}

impl MemoryPressure {
    fn to_u8(self) -> u8 {
        match self {
            MemoryPressure::Low => 0,
            MemoryPressure::Medium => 1,
            MemoryPressure::High => 2,
            MemoryPressure::Critical => 3,
        }
    }

    fn from_u8(level: u8) -> Self {
        match level {
            0 => MemoryPressure::Low,
            1 => MemoryPressure::Medium,
            2 => MemoryPressure::High,
            _ => MemoryPressure::Critical,
        }
    }
}

/// Source of the current memory pressure
pub trait PressureProbe: Send + Sync {
    /// Sample the current pressure
    fn pressure(&self) -> MemoryPressure;
}

/// Probe with a pressure level set by the host
#[derive(Debug)]
pub struct ManualPressure {
    level: AtomicU8,
}

impl ManualPressure {
    /// Create a probe reporting `pressure`
    pub fn new(pressure: MemoryPressure) -> Self {
        Self {
            level: AtomicU8::new(pressure.to_u8()),
        }
    }

    /// Change the reported pressure
    pub fn set(&self, pressure: MemoryPressure) {
        self.level.store(pressure.to_u8(), Ordering::Release);
    }
}

impl Default for ManualPressure {
    fn default() -> Self {
        Self::new(MemoryPressure::Low)
    }
}

impl PressureProbe for ManualPressure {
    fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_u8(self.level.load(Ordering::Acquire))
    }
}

/// Usage ratios at which system memory is considered under pressure
#[derive(Debug, Clone)]
pub struct MemoryThresholds {
    /// Usage ratio considered moderate
    pub medium_watermark: f64,
    /// Start reclaiming when memory usage exceeds this ratio
    pub high_watermark: f64,
    /// Critical memory threshold
    pub critical_watermark: f64,
    /// Available memory below this many bytes is critical regardless of ratio
    pub min_available_memory: u64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            medium_watermark: 0.60,
            high_watermark: 0.80,
            critical_watermark: 0.95,
            min_available_memory: 256 * 1024 * 1024,
        }
    }
}

impl MemoryThresholds {
    /// Classify a memory sample
    pub fn classify(&self, total: u64, used: u64, available: u64) -> MemoryPressure {
        if total == 0 {
            return MemoryPressure::Low;
        }
        let usage_ratio = used as f64 / total as f64;

        if available < self.min_available_memory || usage_ratio >= self.critical_watermark {
            MemoryPressure::Critical
        } else if usage_ratio >= self.high_watermark {
            MemoryPressure::High
        } else if usage_ratio >= self.medium_watermark {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

/// Probe reading system memory through `sysinfo`
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    thresholds: MemoryThresholds,
}

impl SystemMemoryProbe {
    /// Create a probe classifying samples with `thresholds`
    pub fn new(thresholds: MemoryThresholds) -> Self {
        Self {
            system: Mutex::new(System::new()),
            thresholds,
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new(MemoryThresholds::default())
    }
}

impl PressureProbe for SystemMemoryProbe {
    fn pressure(&self) -> MemoryPressure {
        let mut system = self.system.lock();
        system.refresh_memory();
        self.thresholds.classify(
            system.total_memory(),
            system.used_memory(),
            system.available_memory(),
        )
    }
}

/// How often and how hard the reaper reclaims
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Pause between reap passes
    pub interval: Duration,
    /// Share of live soft values reclaimed under `High` pressure
    pub high_fraction: f64,
    /// Share of live soft values reclaimed under `Critical` pressure
    pub critical_fraction: f64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            high_fraction: 0.25,
            critical_fraction: 1.0,
        }
    }
}

impl ReaperConfig {
    fn fraction(&self, pressure: MemoryPressure) -> f64 {
        match pressure {
            MemoryPressure::Low | MemoryPressure::Medium => 0.0,
            MemoryPressure::High => self.high_fraction,
            MemoryPressure::Critical => self.critical_fraction,
        }
        .clamp(0.0, 1.0)
    }
}

/// Outcome of one reap pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Weak entries found without an owner
    pub collected: usize,
    /// Soft values cleared
    pub reclaimed: usize,
}

/// Background thread reclaiming map values under memory pressure.
///
/// The thread holds the map weakly and exits once the map is dropped.
/// Dropping the `Reaper` stops the thread.
pub struct Reaper {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Run one reap pass against `map` at the given pressure
    pub fn reap_once<K, V, S>(
        map: &SoftMap<K, V, S>,
        pressure: MemoryPressure,
        config: &ReaperConfig,
    ) -> ReapReport
    where
        K: Eq + Hash + Clone,
        S: BuildHasher + Clone,
    {
        let mut report = ReapReport::default();
        let mut soft = Vec::new();
        for cell in map.cells() {
            if cell.collect_if_dead() {
                report.collected += 1;
            } else if cell.is_soft() {
                soft.push(cell);
            }
        }

        let fraction = config.fraction(pressure);
        if fraction > 0.0 && !soft.is_empty() {
            let quota = (soft.len() as f64 * fraction).ceil() as usize;
            soft.sort_by_key(|cell| cell.last_read());
            report.reclaimed = soft
                .iter()
                .take(quota)
                .filter(|cell| cell.reclaim())
                .count();
        }

        map.stats()
            .record_reclaimed((report.collected + report.reclaimed) as u64);
        if report.collected > 0 || report.reclaimed > 0 {
            debug!(
                ?pressure,
                collected = report.collected,
                reclaimed = report.reclaimed,
                "reap pass finished"
            );
        }

        if map.pending_reclaimed() >= map.config().sweep_threshold {
            map.sweep();
        }
        report
    }

    /// Start a named thread reaping `map` every `config.interval`
    pub fn spawn<K, V, S>(
        map: &Arc<SoftMap<K, V, S>>,
        probe: Arc<dyn PressureProbe>,
        config: ReaperConfig,
    ) -> Result<Self>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
        S: BuildHasher + Clone + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let map: Weak<SoftMap<K, V, S>> = Arc::downgrade(map);
        let stop = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("softmap-reaper".into())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let Some(map) = map.upgrade() else {
                        break;
                    };
                    let pressure = probe.pressure();
                    if pressure == MemoryPressure::Critical {
                        warn!("memory pressure is critical, reclaiming soft values");
                    }
                    Self::reap_once(&map, pressure, &config);
                    drop(map);
                    thread::park_timeout(config.interval);
                }
            })?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Check if the reaper thread is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown_thread();
    }

    fn shutdown_thread(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("reaper thread panicked");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown_thread();
    }
}
