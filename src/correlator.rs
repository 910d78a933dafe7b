//! Pulse/reference correlator.
//!
//! Two free-running hardware counters are sampled together: the sensor
//! pulse counter and the reference-clock capture register.  Only the
//! differences between consecutive snapshots mean anything.
//!
//! ```text
//!   coordinator                     capture ISR
//!   ───────────                     ───────────
//!   arm() ── enable IRQ ──▶ (sleep) ──▶ on_capture_interrupt()
//!                                      read pulse + capture regs
//!                                      disable IRQ
//!            ◀── CaptureSlot ────────── signal(snapshot)
//!   take() ── correlate(prev, new)
//! ```
//!
//! The capture interrupt is one-shot per cycle.  Leaving it enabled would
//! wake the CPU on every sensor edge, and the capture register stops
//! refreshing after an even number of edges in deep sleep; arming only
//! when needed and disarming on the first capture avoids both.  Two side
//! effects are kept on purpose:
//!
//! - a capture just after the CPU re-enters sleep causes one extra, early
//!   wake;
//! - the rate lags the true rate by up to one sampling period, most visibly
//!   when flow stops.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, trace};

use crate::app::ports::CapturePort;
use crate::config::SystemConfig;

/// Raw register pair read in the same interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub pulses: u32,
    pub ticks: u32,
}

/// Single-slot ISR → coordinator handoff.  Holds at most one snapshot.
pub type CaptureSlot = Signal<CriticalSectionRawMutex, CaptureSnapshot>;

/// Pulse and reference-tick deltas between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deltas {
    pub pulses: u32,
    pub ticks: u32,
}

/// Outcome of one [`Correlator::take`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// No capture fired since the last take.
    NoCapture,
    /// First capture after start-up; it only establishes the baseline.
    Baseline,
    Window(Deltas),
}

/// Wraparound-tolerant difference of two snapshots for counters of the
/// given widths.
pub fn correlate(old: CaptureSnapshot, new: CaptureSnapshot, pulse_mask: u32, reference_mask: u32) -> Deltas {
    Deltas {
        pulses: new.pulses.wrapping_sub(old.pulses) & pulse_mask,
        ticks: new.ticks.wrapping_sub(old.ticks) & reference_mask,
    }
}

/// Interrupt-side half: read both registers, disarm, publish.
///
/// Must only be called from the capture interrupt (or a test standing in
/// for it).  Never touches the totalizer.
pub fn on_capture_interrupt<H: CapturePort + ?Sized>(hw: &mut H, slot: &CaptureSlot) {
    let snapshot = CaptureSnapshot {
        pulses: hw.pulse_count(),
        ticks: hw.reference_capture(),
    };
    hw.set_capture_irq(false);
    slot.signal(snapshot);
}

/// Coordinator-side half.
pub struct Correlator {
    previous: Option<CaptureSnapshot>,
    pulse_mask: u32,
    reference_mask: u32,
    armed: bool,
}

impl Correlator {
    pub fn new(pulse_mask: u32, reference_mask: u32) -> Self {
        Self {
            previous: None,
            pulse_mask,
            reference_mask,
            armed: false,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.pulse_mask(), config.reference_mask())
    }

    /// Enable the capture interrupt for the coming sleep window.
    ///
    /// Returns `false` without arming when a snapshot is still pending, so
    /// the slot never holds more than one value per cycle.
    pub fn arm<H: CapturePort + ?Sized>(&mut self, hw: &mut H, slot: &CaptureSlot) -> bool {
        if slot.signaled() {
            trace!("Correlator: snapshot pending, not re-arming");
            return false;
        }
        hw.set_capture_irq(true);
        self.armed = true;
        true
    }

    pub fn disarm<H: CapturePort + ?Sized>(&mut self, hw: &mut H) {
        hw.set_capture_irq(false);
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consume the pending snapshot, if any, and correlate it against the
    /// previous one.
    pub fn take(&mut self, slot: &CaptureSlot) -> Sample {
        let Some(snapshot) = slot.try_take() else {
            return Sample::NoCapture;
        };
        self.armed = false;
        let sample = match self.previous {
            None => Sample::Baseline,
            Some(prev) => Sample::Window(correlate(prev, snapshot, self.pulse_mask, self.reference_mask)),
        };
        self.previous = Some(snapshot);
        debug!("Correlator: {:?} from {:?}", sample, snapshot);
        sample
    }

    /// Forget the baseline; the next capture starts a fresh window.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
