//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A display or printer adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Sample(r) => {
                info!(
                    "FLOW | {} | dp={} dt={} | ttl={} acm={} | rate={} ({:?})",
                    r.status.name(),
                    r.pulse_delta,
                    r.tick_delta,
                    r.ttl,
                    r.acm,
                    r.rate,
                    r.band,
                );
            }
            AppEvent::Restored { source, reset_count } => {
                info!("START | source={:?} reset #{}", source, reset_count);
            }
            AppEvent::StatusChanged { from, to } => {
                info!("STATUS | {} -> {}", from.name(), to.name());
            }
            AppEvent::RateBandChanged { from, to } => {
                info!("LIMIT | rate {:?} -> {:?}", from, to);
            }
            AppEvent::SetupApplied(cmd) => {
                info!("SETUP | {} applied", cmd.name());
            }
            AppEvent::SetupRejected(e) => {
                warn!("SETUP | rejected: {}", e);
            }
            AppEvent::TicketIssued(n) => {
                info!("TICKET | #{:05}", n);
            }
            AppEvent::BackupSynced => {}
            AppEvent::BackupFailed(e) => {
                warn!("BACKUP | write failed: {}", e);
            }
        }
    }
}
