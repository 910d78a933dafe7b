//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FlowService (domain)
//! ```
//!
//! Driven adapters (timers, backup memory, RTC, journal, event sinks)
//! implement these traits.  The [`FlowService`](super::service::FlowService)
//! takes them as generic call-site arguments, so the domain core never
//! touches hardware directly.

use crate::error::BackupError;
use crate::flow_status::FlowStatus;

// ───────────────────────────────────────────────────────────────
// Capture port (driven adapter: timers → correlator)
// ───────────────────────────────────────────────────────────────

/// The two free-running counters behind the frequency measurement.
///
/// Also used from interrupt context by
/// [`on_capture_interrupt`](crate::correlator::on_capture_interrupt);
/// implementations must not block or allocate.
pub trait CapturePort {
    /// Raw sensor-edge counter.
    fn pulse_count(&mut self) -> u32;

    /// Reference-clock value latched by the last capture event.
    fn reference_capture(&mut self) -> u32;

    /// Live reference-clock counter (used to measure sleep).
    fn reference_now(&mut self) -> u32;

    /// Enable or disable the one-shot capture interrupt.
    fn set_capture_irq(&mut self, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Backup port (driven adapter: domain ↔ always-powered memory)
// ───────────────────────────────────────────────────────────────

/// The battery-backed memory region holding the totalizer image.
pub trait BackupPort {
    /// Backup battery sense.
    fn battery_present(&mut self) -> bool;

    /// The whole region, as retained across resets.
    fn region(&self) -> &[u8];

    /// Overwrite the start of the region with `image`.
    fn write(&mut self, image: &[u8]) -> Result<(), BackupError>;
}

// ───────────────────────────────────────────────────────────────
// RTC port
// ───────────────────────────────────────────────────────────────

/// Calendar time as the RTC reports it.  No formatting here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

pub trait RtcPort {
    fn now(&mut self) -> RtcDateTime;
}

// ───────────────────────────────────────────────────────────────
// Flow journal port (driven adapter: domain → event logger)
// ───────────────────────────────────────────────────────────────

/// The external event logger's ingestion call.  Invoked once per cycle
/// with the current status; the logger decides what to keep.
pub trait FlowJournalPort {
    fn ingest(&mut self, status: FlowStatus, at: RtcDateTime);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
