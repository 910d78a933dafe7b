//! Outbound application events.
//!
//! The [`FlowService`](super::service::FlowService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, display driver, printer).

use crate::error::{BackupError, SetupError};
use crate::fixed::Milli;
use crate::flow_status::FlowStatus;
use crate::persistence::EnvSource;
use crate::totalizer::RateBand;

use super::commands::SetupCommand;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The environment was chosen at power-up.
    Restored { source: EnvSource, reset_count: u32 },

    /// One sampling cycle completed.
    Sample(FlowReading),

    /// The flow status moved.
    StatusChanged { from: FlowStatus, to: FlowStatus },

    /// The rate crossed one of the advisory limits.
    RateBandChanged { from: RateBand, to: RateBand },

    /// A setup command was applied.
    SetupApplied(SetupCommand),

    /// A setup command was rejected; nothing changed.
    SetupRejected(SetupError),

    TicketIssued(u16),

    BackupSynced,

    BackupFailed(BackupError),
}

/// Per-cycle result, ready for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    pub status: FlowStatus,
    pub pulse_delta: u32,
    pub tick_delta: u32,
    pub ttl: Milli,
    pub acm: Milli,
    pub rate: Milli,
    pub band: RateBand,
}
