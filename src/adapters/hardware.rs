//! Capture hardware adapter.
//!
//! Implements [`CapturePort`] over the pulse counter and the reference
//! clock.
//!
//! - **`target_os = "espidf"`**: [`EspCapture`] reads the PCNT unit and the
//!   sleep-compensated system timer through
//!   [`hw_init`](crate::drivers::hw_init).  The capture is latched in
//!   software: the GPIO ISR reads the reference counter at the edge, so
//!   `reference_capture` and `reference_now` agree.
//! - **`not(target_os = "espidf")`**: [`SimCapture`] holds both counters in
//!   plain fields and fires the capture itself when an edge arrives while
//!   armed.  Used by host tests.

use crate::app::ports::CapturePort;
use crate::correlator::CaptureSlot;

/// The capture slot shared by the capture ISR and the main loop.
pub static CAPTURE_SLOT: CaptureSlot = CaptureSlot::new();

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

/// Zero-sized handle; the PCNT unit lives in `hw_init`.
#[cfg(target_os = "espidf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EspCapture;

#[cfg(target_os = "espidf")]
impl CapturePort for EspCapture {
    fn pulse_count(&mut self) -> u32 {
        crate::drivers::hw_init::pcnt_count()
    }

    fn reference_capture(&mut self) -> u32 {
        crate::drivers::hw_init::reference_ticks()
    }

    fn reference_now(&mut self) -> u32 {
        crate::drivers::hw_init::reference_ticks()
    }

    fn set_capture_irq(&mut self, enabled: bool) {
        crate::drivers::hw_init::capture_irq(enabled);
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Host-side stand-in for the two timers.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimCapture {
    pulses: u32,
    ticks: u32,
    latched_ticks: u32,
    irq_enabled: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `ticks` reference periods pass.
    pub fn advance(&mut self, ticks: u32) {
        self.ticks = self.ticks.wrapping_add(ticks);
    }

    /// Register `count` sensor edges.  The first edge fires the capture if
    /// the interrupt is armed.
    pub fn edges(&mut self, count: u32, slot: &CaptureSlot) {
        if count == 0 {
            return;
        }
        self.pulses = self.pulses.wrapping_add(1);
        if self.irq_enabled {
            self.latched_ticks = self.ticks;
            crate::correlator::on_capture_interrupt(self, slot);
        }
        self.pulses = self.pulses.wrapping_add(count - 1);
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

#[cfg(not(target_os = "espidf"))]
impl CapturePort for SimCapture {
    fn pulse_count(&mut self) -> u32 {
        self.pulses
    }

    fn reference_capture(&mut self) -> u32 {
        self.latched_ticks
    }

    fn reference_now(&mut self) -> u32 {
        self.ticks
    }

    fn set_capture_irq(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }
}
