//! Inbound commands to the application service.
//!
//! The setup menu (an external collaborator) turns key presses into these;
//! the [`FlowService`](super::service::FlowService) validates and applies
//! them.

use crate::fixed::Milli;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetupCommand {
    /// Calibration factor, ×1000 pulses per liter.
    SetCalibration(u32),

    /// Raw volume-unit selector from the menu.
    SetVolUnit(u8),

    /// Raw time-unit selector from the menu.
    SetTimeUnit(u8),

    CycleVolDecimals,

    CycleRateDecimals,

    /// Zero the trip accumulator.
    ResetTrip,

    /// Zero the batch accumulator.
    ResetBatch,

    SetRateLimits { low: Milli, high: Milli },

    SetFilter(u32),

    /// Override the derived K factor.
    SetFactorK(f64),

    /// Override the derived rate factor.
    SetFactorRate(f64),

    /// Reinitialise the whole environment from the configured preset.
    FactoryReset,
}

impl SetupCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetCalibration(_) => "set-calibration",
            Self::SetVolUnit(_) => "set-vol-unit",
            Self::SetTimeUnit(_) => "set-time-unit",
            Self::CycleVolDecimals => "cycle-vol-decimals",
            Self::CycleRateDecimals => "cycle-rate-decimals",
            Self::ResetTrip => "reset-trip",
            Self::ResetBatch => "reset-batch",
            Self::SetRateLimits { .. } => "set-rate-limits",
            Self::SetFilter(_) => "set-filter",
            Self::SetFactorK(_) => "set-factor-k",
            Self::SetFactorRate(_) => "set-factor-rate",
            Self::FactoryReset => "factory-reset",
        }
    }
}
