//! # Scheduler Metrics
//!
//! Counters for scheduler activity.

use core::sync::atomic::{AtomicU64, Ordering};

/// Scheduler metrics
#[derive(Debug)]
pub struct SchedulerMetrics {
    /// Total context switches
    context_switches: AtomicU64,
    /// Total clock ticks
    ticks: AtomicU64,
    /// Total preemptions at quantum expiry
    preemptions: AtomicU64,
    /// Times a process blocked (sleep or mutex)
    blocks: AtomicU64,
    /// Times the scheduler found nothing ready and waited
    idle_waits: AtomicU64,
}

impl SchedulerMetrics {
    /// Create new metrics
    pub const fn new() -> Self {
        Self {
            context_switches: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            idle_waits: AtomicU64::new(0),
        }
    }

    /// Record a context switch
    pub fn record_context_switch(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a clock tick
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a preemption
    pub fn record_preemption(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a process blocking
    pub fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an idle wait
    pub fn record_idle_wait(&self) {
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent copy of every counter
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            context_switches: self.context_switches.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            idle_waits: self.idle_waits.load(Ordering::Relaxed),
        }
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SchedulerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total context switches
    pub context_switches: u64,
    /// Total clock ticks
    pub ticks: u64,
    /// Total preemptions at quantum expiry
    pub preemptions: u64,
    /// Times a process blocked
    pub blocks: u64,
    /// Times the scheduler waited for an interrupt
    pub idle_waits: u64,
}
