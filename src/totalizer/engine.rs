//! Rate/volume engine.
//!
//! All intermediate math is `f64`; results are truncated into ×1000 fixed
//! point by [`Milli::from_f64_trunc`].  The operation order of every formula
//! below is part of the contract: reordering the multiplications changes
//! the last bit for ratios that are not exact in binary (barrels, gallons).
//!
//! | Quantity  | Formula                                            |
//! |-----------|----------------------------------------------------|
//! | factor_k  | `factor_cal * liters_per_unit / 1000`              |
//! | factor_r  | `reference_hz / factor_k * seconds_per_time_unit`  |
//! | ttl, acm  | `trunc(pulses / factor_k * 1000)`                  |
//! | rate      | `trunc(delta_p / denom * factor_r * 1000)`         |

use log::{debug, info, warn};

use super::{FACTOR_CAL_MAX, FACTOR_CAL_MIN, PF_SEL_MAX, TotalizerEnv};
use crate::config::{RateDenominator, SystemConfig};
use crate::error::SetupError;
use crate::fixed::{Milli, SCALE};
use crate::units::{TimeUnit, VolUnit};

// ═══════════════════════════════════════════════════════════════
//  Pure formulas
// ═══════════════════════════════════════════════════════════════

/// Pulses per display volume unit.
pub fn factor_k(factor_cal: u32, unit: VolUnit) -> f64 {
    f64::from(factor_cal) * unit.liters_per_unit() / f64::from(SCALE)
}

/// Multiplier turning `pulses / reference_ticks` into display units per
/// time unit.
pub fn factor_rate(factor_k: f64, time_unit: TimeUnit, reference_hz: u32) -> f64 {
    f64::from(reference_hz) / factor_k * f64::from(time_unit.seconds())
}

/// Calibrated volume of `pulses`.
pub fn volume(pulses: u64, factor_k: f64) -> Milli {
    Milli::from_f64_trunc(pulses as f64 / factor_k * f64::from(SCALE))
}

/// Flow rate for one correlation window, or `None` when the effective
/// denominator is zero.
pub fn rate(delta_p: u32, delta_t: u32, factor_r: f64, denominator: RateDenominator) -> Option<Milli> {
    let denom = match denominator {
        RateDenominator::Elapsed => delta_t,
        RateDenominator::ElapsedMinusOne => delta_t.checked_sub(1)?,
    };
    if denom == 0 {
        return None;
    }
    Some(Milli::from_f64_trunc(
        f64::from(delta_p) / f64::from(denom) * factor_r * f64::from(SCALE),
    ))
}

/// Next decimal-place selector: `0 → 1 → 2 → 3 → 0`.
pub const fn next_pf_sel(sel: u8) -> u8 {
    if sel >= PF_SEL_MAX { 0 } else { sel + 1 }
}

/// Advisory position of the rate against the sensor's nominal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBand {
    Below,
    Nominal,
    Above,
}

/// Classify `rate` against `[low, high]`.  A zero rate (no flow) is not
/// "below" anything.
pub fn rate_band(rate: Milli, low: Milli, high: Milli) -> RateBand {
    if rate > high {
        RateBand::Above
    } else if rate != Milli::ZERO && rate < low {
        RateBand::Below
    } else {
        RateBand::Nominal
    }
}

// ═══════════════════════════════════════════════════════════════
//  Engine parameters
// ═══════════════════════════════════════════════════════════════

/// Build-level constants the engine needs next to the persisted state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub reference_hz: u32,
    pub denominator: RateDenominator,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

impl EngineParams {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            reference_hz: config.reference_clock_hz,
            denominator: config.rate_denominator,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Totalizer
// ═══════════════════════════════════════════════════════════════

/// Sole writer of a [`TotalizerEnv`].
///
/// Every mutating method either succeeds completely or returns a
/// [`SetupError`] and leaves the environment untouched.
pub struct Totalizer {
    env: TotalizerEnv,
    params: EngineParams,
}

impl Totalizer {
    /// Take ownership of `env`.  Derived factors are recomputed so a
    /// restored image can never carry a stale K or rate factor.
    pub fn new(env: TotalizerEnv, params: EngineParams) -> Self {
        let mut t = Self { env, params };
        t.factor_k_calc();
        t.recalculate();
        t
    }

    pub fn env(&self) -> &TotalizerEnv {
        &self.env
    }

    pub fn params(&self) -> EngineParams {
        self.params
    }

    pub fn into_env(self) -> TotalizerEnv {
        self.env
    }

    // ── Accumulation ──────────────────────────────────────────

    /// Credit `delta` pulses to both the trip and batch counters.
    pub fn pulse_add(&mut self, delta: u32) {
        self.env.pulse_acm = self.env.pulse_acm.saturating_add(u64::from(delta));
        self.env.pulse_ttl = self.env.pulse_ttl.saturating_add(u64::from(delta));
    }

    /// Record the pulse/tick deltas of the latest correlation window.
    pub fn set_rate_window(&mut self, delta_p: u32, delta_t: u32) {
        self.env.rate.delta_p = delta_p;
        self.env.rate.delta_t = delta_t;
    }

    // ── Derived factors ───────────────────────────────────────

    /// Recompute and cache K from the calibration factor and volume unit,
    /// then the rate factor that depends on it.
    pub fn factor_k_calc(&mut self) -> f64 {
        self.env.factor_k = factor_k(self.env.factor_cal, self.env.vol_unit);
        self.factor_rate_calc();
        self.env.factor_k
    }

    /// Recompute and cache the rate factor from K and the time unit.
    pub fn factor_rate_calc(&mut self) -> f64 {
        self.env.rate.factor_r = factor_rate(self.env.factor_k, self.env.time_unit, self.params.reference_hz);
        self.env.rate.factor_r
    }

    /// Override the cached K factor (and the rate factor derived from it).
    /// The next calibration or unit change recomputes K from those again.
    pub fn set_factor_k(&mut self, k: f64) -> Result<(), SetupError> {
        if !k.is_finite() || k <= 0.0 {
            warn!("Totalizer: rejected K factor {}", k);
            return Err(SetupError::InvalidFactor);
        }
        self.env.factor_k = k;
        self.factor_rate_calc();
        Ok(())
    }

    /// Override the cached rate factor.
    pub fn set_factor_r(&mut self, r: f64) -> Result<(), SetupError> {
        if !r.is_finite() || r <= 0.0 {
            warn!("Totalizer: rejected rate factor {}", r);
            return Err(SetupError::InvalidFactor);
        }
        self.env.rate.factor_r = r;
        Ok(())
    }

    // ── Volumes and rate ──────────────────────────────────────

    pub fn ttl_calc(&mut self) -> Milli {
        self.env.ttl = volume(self.env.pulse_ttl, self.env.factor_k);
        self.env.ttl
    }

    pub fn acm_calc(&mut self) -> Milli {
        self.env.acm = volume(self.env.pulse_acm, self.env.factor_k);
        self.env.acm
    }

    /// Recompute the rate from the stored window.  A zero denominator keeps
    /// the previous rate.
    pub fn rate_calc(&mut self) -> Milli {
        let r = &mut self.env.rate;
        match rate(r.delta_p, r.delta_t, r.factor_r, self.params.denominator) {
            Some(value) => r.rate = value,
            None => {
                if r.delta_p != 0 {
                    warn!(
                        "Totalizer: zero tick window for {} pulses, holding rate {}",
                        r.delta_p, r.rate
                    );
                }
            }
        }
        r.rate
    }

    pub fn rate_band(&self) -> RateBand {
        let r = &self.env.rate;
        rate_band(r.rate, r.limit_low, r.limit_high)
    }

    /// Recompute trip, batch and rate.
    pub fn recalculate(&mut self) {
        self.ttl_calc();
        self.acm_calc();
        self.rate_calc();
        debug!(
            "Totalizer: ttl={} acm={} rate={}",
            self.env.ttl, self.env.acm, self.env.rate.rate
        );
    }

    // ── Validated setters ─────────────────────────────────────

    pub fn set_factor_cal(&mut self, value: u32) -> Result<(), SetupError> {
        if !(FACTOR_CAL_MIN..=FACTOR_CAL_MAX).contains(&value) {
            warn!("Totalizer: rejected calibration {}", value);
            return Err(SetupError::CalibrationOutOfRange {
                value,
                min: FACTOR_CAL_MIN,
                max: FACTOR_CAL_MAX,
            });
        }
        self.env.factor_cal = value;
        self.factor_k_calc();
        self.recalculate();
        info!("Totalizer: calibration set to {}", Milli::from_raw(value));
        Ok(())
    }

    pub fn set_vol_unit(&mut self, unit: VolUnit) {
        self.env.vol_unit = unit;
        self.factor_k_calc();
        self.recalculate();
        info!("Totalizer: volume unit {}", unit.label());
    }

    /// Validate a raw menu selector, then apply it.
    pub fn set_vol_unit_index(&mut self, raw: u8) -> Result<(), SetupError> {
        let unit = VolUnit::try_from(raw)?;
        self.set_vol_unit(unit);
        Ok(())
    }

    pub fn set_time_unit(&mut self, unit: TimeUnit) {
        self.env.time_unit = unit;
        self.factor_rate_calc();
        self.rate_calc();
        info!("Totalizer: time unit {}", unit.label());
    }

    pub fn set_time_unit_index(&mut self, raw: u8) -> Result<(), SetupError> {
        let unit = TimeUnit::try_from(raw)?;
        self.set_time_unit(unit);
        Ok(())
    }

    pub fn set_rate_limits(&mut self, low: Milli, high: Milli) -> Result<(), SetupError> {
        if low > high {
            return Err(SetupError::InvertedRateLimits {
                low: low.raw(),
                high: high.raw(),
            });
        }
        self.env.rate.limit_low = low;
        self.env.rate.limit_high = high;
        Ok(())
    }

    pub fn set_filter(&mut self, filter: u32) {
        self.env.rate.filter = filter;
    }

    // ── Decimal-place selectors ───────────────────────────────

    pub fn vol_pf_inc(&mut self) -> u8 {
        self.env.vol_pf_sel = next_pf_sel(self.env.vol_pf_sel);
        self.env.vol_pf_sel
    }

    pub fn rate_pf_inc(&mut self) -> u8 {
        self.env.rate.rate_pf_sel = next_pf_sel(self.env.rate.rate_pf_sel);
        self.env.rate.rate_pf_sel
    }

    // ── Resets ────────────────────────────────────────────────

    /// Zero the batch accumulator only.
    pub fn acm_reset(&mut self) {
        self.env.pulse_acm = 0;
        self.env.acm = Milli::ZERO;
        info!("Totalizer: batch reset");
    }

    /// Zero the trip accumulator only.
    pub fn ttl_reset(&mut self) {
        self.env.pulse_ttl = 0;
        self.env.ttl = Milli::ZERO;
        info!("Totalizer: trip reset");
    }

    /// Replace the whole environment (factory reset path).
    pub fn replace(&mut self, env: TotalizerEnv) {
        self.env = env;
        self.factor_k_calc();
        self.recalculate();
    }

    // ── Tickets ───────────────────────────────────────────────

    /// Advance and return the ticket number.
    pub fn next_ticket(&mut self) -> u16 {
        self.env.ticket_number = self.env.ticket_number.wrapping_add(1);
        self.env.ticket_number
    }
}
