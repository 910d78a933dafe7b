//! Totalizer environment: the persisted aggregate state of the meter.
//!
//! ```text
//!   pulse_ttl ─┐                    ┌─▶ ttl  (×1000, derived)
//!   pulse_acm ─┼──▶ ÷ factor_k ─────┼─▶ acm  (×1000, derived)
//!              │                    │
//!   factor_cal ┴─▶ factor_k ─▶ factor_r ─▶ rate (×1000, derived)
//!   vol_unit ──┘        time_unit ─┘   ▲
//!                               delta_p/delta_t
//! ```
//!
//! The pulse counters and `factor_cal` are authoritative; everything on the
//! right-hand side is recomputed from them.  Fields are private: reads go
//! through the accessors below, writes go through
//! [`Totalizer`](engine::Totalizer), whose setters validate first.

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::fixed::Milli;
use crate::presets::FactoryPreset;
use crate::units::{TimeUnit, VolUnit};

pub use engine::{EngineParams, RateBand, Totalizer};

/// Smallest accepted calibration factor: 1.000 pulse per liter.
pub const FACTOR_CAL_MIN: u32 = 1_000;
/// Largest accepted calibration factor: 99 999.999 pulses per liter
/// (eight display digits).
pub const FACTOR_CAL_MAX: u32 = 99_999_999;

/// Highest decimal-place selector value; selectors cycle `0..=PF_SEL_MAX`.
pub const PF_SEL_MAX: u8 = 3;

/// Rate sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateParams {
    /// Reference ticks → display-units-per-time-unit multiplier.
    factor_r: f64,
    /// Reference ticks spanned by the last correlation window.
    delta_t: u32,
    /// Sensor pulses counted in the last correlation window.
    delta_p: u32,
    rate: Milli,
    rate_pf_sel: u8,
    /// Advisory nominal sensor bounds, same scale as `rate`.
    limit_high: Milli,
    limit_low: Milli,
    filter: u32,
}

impl RateParams {
    pub fn factor_r(&self) -> f64 {
        self.factor_r
    }

    pub fn delta_t(&self) -> u32 {
        self.delta_t
    }

    pub fn delta_p(&self) -> u32 {
        self.delta_p
    }

    pub fn rate(&self) -> Milli {
        self.rate
    }

    pub fn rate_pf_sel(&self) -> u8 {
        self.rate_pf_sel
    }

    pub fn limit_high(&self) -> Milli {
        self.limit_high
    }

    pub fn limit_low(&self) -> Milli {
        self.limit_low
    }

    pub fn filter(&self) -> u32 {
        self.filter
    }
}

/// The persisted totalizer environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalizerEnv {
    pulse_acm: u64,
    pulse_ttl: u64,
    acm: Milli,
    ttl: Milli,
    vol_pf_sel: u8,
    factor_cal: u32,
    factor_k: f64,
    vol_unit: VolUnit,
    time_unit: TimeUnit,
    rate: RateParams,
    ticket_number: u16,
}

impl TotalizerEnv {
    /// Fresh environment from a factory preset: zero counters, derived
    /// factors computed for `reference_hz`.
    pub fn from_preset(preset: &FactoryPreset, reference_hz: u32) -> Self {
        let factor_k = engine::factor_k(preset.factor_cal, preset.vol_unit);
        Self {
            pulse_acm: 0,
            pulse_ttl: 0,
            acm: Milli::ZERO,
            ttl: Milli::ZERO,
            vol_pf_sel: preset.vol_pf_sel,
            factor_cal: preset.factor_cal,
            factor_k,
            vol_unit: preset.vol_unit,
            time_unit: preset.time_unit,
            rate: RateParams {
                factor_r: engine::factor_rate(factor_k, preset.time_unit, reference_hz),
                delta_t: 0,
                delta_p: 0,
                rate: Milli::ZERO,
                rate_pf_sel: preset.rate_pf_sel,
                limit_high: preset.limit_high,
                limit_low: preset.limit_low,
                filter: preset.filter,
            },
            ticket_number: 0,
        }
    }

    /// Check the invariants every setter enforces.  Used on environments
    /// that did not come through the setters (a decoded backup image).
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(FACTOR_CAL_MIN..=FACTOR_CAL_MAX).contains(&self.factor_cal) {
            return Err(SetupError::CalibrationOutOfRange {
                value: self.factor_cal,
                min: FACTOR_CAL_MIN,
                max: FACTOR_CAL_MAX,
            });
        }
        for sel in [self.vol_pf_sel, self.rate.rate_pf_sel] {
            if sel > PF_SEL_MAX {
                return Err(SetupError::InvalidDecimalSelector(sel));
            }
        }
        if self.rate.limit_low > self.rate.limit_high {
            return Err(SetupError::InvertedRateLimits {
                low: self.rate.limit_low.raw(),
                high: self.rate.limit_high.raw(),
            });
        }
        Ok(())
    }

    // ── Read accessors ────────────────────────────────────────

    pub fn pulse_acm(&self) -> u64 {
        self.pulse_acm
    }

    pub fn pulse_ttl(&self) -> u64 {
        self.pulse_ttl
    }

    /// Batch volume (×1000, display unit) as of the last recalculation.
    pub fn acm(&self) -> Milli {
        self.acm
    }

    /// Trip volume (×1000, display unit) as of the last recalculation.
    pub fn ttl(&self) -> Milli {
        self.ttl
    }

    pub fn vol_pf_sel(&self) -> u8 {
        self.vol_pf_sel
    }

    pub fn factor_cal(&self) -> u32 {
        self.factor_cal
    }

    pub fn factor_k(&self) -> f64 {
        self.factor_k
    }

    pub fn vol_unit(&self) -> VolUnit {
        self.vol_unit
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn rate(&self) -> &RateParams {
        &self.rate
    }

    pub fn ticket_number(&self) -> u16 {
        self.ticket_number
    }
}
