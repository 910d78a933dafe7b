//! Sampling cadence and sleep-time bookkeeping.
//!
//! The main task wakes for many reasons (capture IRQ, key press, display
//! refresh).  The [`SampleGate`] makes sure correlation and recalculation
//! run at most once per sample interval no matter how often that is.
//!
//! The system tick does not advance in deep sleep, so the [`SleepClock`]
//! measures each sleep in reference-clock ticks and adds it back:
//!
//! ```text
//!   scheduler time = awake time (system tick) + slept time (reference ticks)
//!
//!   ──awake──┬──────── sleep ────────┬──awake──
//!            enter_sleep(t0)         exit_sleep(t1)
//!                                    slept += (t1 - t0) & mask
//! ```
//!
//! One sleep must stay below the reference counter's wrap period or the
//! tick delta aliases; [`SleepClock::bound`] enforces that.

use log::{debug, trace};

use crate::config::SystemConfig;

// ═══════════════════════════════════════════════════════════════
//  Sample gate
// ═══════════════════════════════════════════════════════════════

pub struct SampleGate {
    interval_ms: u64,
    last_run_ms: Option<u64>,
}

impl SampleGate {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms),
            last_run_ms: None,
        }
    }

    /// `true` when a cycle should run now; the gate then restarts from
    /// `now_ms`.  The very first poll is always due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.last_run_ms {
            Some(last) if now_ms.saturating_sub(last) < self.interval_ms => {
                trace!("SampleGate: skip at {} ms", now_ms);
                false
            }
            _ => {
                self.last_run_ms = Some(now_ms);
                true
            }
        }
    }

    /// Milliseconds until the next cycle is due (0 if already due).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_run_ms {
            Some(last) => self.interval_ms.saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Awake hold
// ═══════════════════════════════════════════════════════════════

/// Keeps the CPU out of light sleep for a while after a key press so the
/// menu task can respond.  Each press restarts the window.
#[derive(Debug, Default)]
pub struct AwakeHold {
    until_ms: Option<u64>,
}

impl AwakeHold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stay awake until `now_ms + hold_ms`.
    pub fn extend(&mut self, now_ms: u64, hold_ms: u64) {
        let until = now_ms.saturating_add(hold_ms);
        self.until_ms = Some(self.until_ms.map_or(until, |u| u.max(until)));
    }

    /// `true` while the window is open.  Closes it once expired.
    pub fn active(&mut self, now_ms: u64) -> bool {
        match self.until_ms {
            Some(until) if now_ms < until => true,
            Some(_) => {
                self.until_ms = None;
                debug!("AwakeHold: released at {} ms", now_ms);
                false
            }
            None => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sleep clock
// ═══════════════════════════════════════════════════════════════

pub struct SleepClock {
    reference_hz: u64,
    reference_mask: u32,
    max_sleep_ms: u32,
    entry_ticks: Option<u32>,
    slept_ticks: u64,
}

impl SleepClock {
    pub fn new(reference_hz: u32, reference_mask: u32, max_sleep_ms: u32) -> Self {
        Self {
            reference_hz: u64::from(reference_hz),
            reference_mask,
            max_sleep_ms,
            entry_ticks: None,
            slept_ticks: 0,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.reference_clock_hz,
            config.reference_mask(),
            config.max_sleep_ms(),
        )
    }

    /// Clamp a requested sleep to the wrap-safe maximum.
    pub fn bound(&self, requested_ms: u32) -> u32 {
        requested_ms.min(self.max_sleep_ms)
    }

    pub fn max_sleep_ms(&self) -> u32 {
        self.max_sleep_ms
    }

    /// Record the reference counter just before sleeping.
    pub fn enter_sleep(&mut self, ticks_now: u32) {
        self.entry_ticks = Some(ticks_now);
    }

    /// Record the reference counter after waking; returns the ticks slept.
    /// Without a matching `enter_sleep` nothing is added.
    pub fn exit_sleep(&mut self, ticks_now: u32) -> u32 {
        let Some(entry) = self.entry_ticks.take() else {
            return 0;
        };
        let ticks = ticks_now.wrapping_sub(entry) & self.reference_mask;
        self.slept_ticks += u64::from(ticks);
        debug!("SleepClock: slept {} ticks", ticks);
        ticks
    }

    /// Total time spent asleep.  Sub-millisecond remainders carry over
    /// between sleeps.
    pub fn slept_ms(&self) -> u64 {
        self.slept_ticks * 1000 / self.reference_hz
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
