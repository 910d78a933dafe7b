//! Cycle statistics and fatal-error handling.
//!
//! [`CycleStats`] counts what the coordinator did each pass; the main loop
//! logs a snapshot periodically.  [`fatal_halt`] is the end of the road for
//! start-up resource failures: there is no degraded mode without a capture
//! slot or timer, so the CPU parks and the external supervisor resets it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Correlation/recalculation passes run.
    pub cycles: u64,
    /// Snapshots taken from the capture slot.
    pub captures: u64,
    /// Cycles that found no snapshot.
    pub cycles_without_capture: u64,
    /// Wake-ups the sample gate turned away.
    pub gate_skips: u64,
    /// Windows longer than the reference wrap; rate held.
    pub ambiguous_windows: u64,
    /// Zero-tick windows; rate held.
    pub zero_tick_windows: u64,
    /// Wake events by reason.
    pub capture_wakes: u64,
    pub key_wakes: u64,
    pub refresh_wakes: u64,
}

impl CycleStats {
    /// Fraction of cycles that saw a capture, in percent.
    pub fn capture_ratio_percent(&self) -> u8 {
        if self.cycles == 0 {
            return 0;
        }
        (self.captures.min(self.cycles) * 100 / self.cycles) as u8
    }
}

impl core::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "cycles={} captures={} idle={} skips={} ambiguous={} zero_dt={} wakes(cap/key/disp)={}/{}/{}",
            self.cycles,
            self.captures,
            self.cycles_without_capture,
            self.gate_skips,
            self.ambiguous_windows,
            self.zero_tick_windows,
            self.capture_wakes,
            self.key_wakes,
            self.refresh_wakes
        )
    }
}

/// Log `reason` and park forever.
pub fn fatal_halt(reason: &str) -> ! {
    log::error!("FATAL: {}, halting", reason);
    loop {
        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(1000);

        #[cfg(not(target_os = "espidf"))]
        std::thread::park();
    }
}

/// Install a panic hook that logs the reason before the default abort.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
