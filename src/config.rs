//! System configuration parameters
//!
//! Build-time and board-level tunables for the flow computer.  These are
//! not user-editable; operator settings (calibration, units, limits) live
//! in the [`TotalizerEnv`](crate::totalizer::TotalizerEnv).

use serde::{Deserialize, Serialize};

/// Denominator used by the rate formula.
///
/// Two firmware revisions disagree: one divides the pulse delta by the raw
/// reference-tick delta, the later one by `delta_t - 1`.  Both are kept so
/// the choice is explicit per build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateDenominator {
    /// `delta_p / delta_t`
    Elapsed,
    /// `delta_p / (delta_t - 1)`
    ElapsedMinusOne,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Sampling ---
    /// Minimum awake+slept time between two correlation cycles (ms).
    pub sample_interval_ms: u32,
    /// Longest sleep the main loop asks for when idle (ms).  The hard
    /// bound from the reference counter wrap is applied on top.
    pub max_idle_sleep_ms: u32,
    /// How long a key press keeps the CPU out of light sleep (ms).
    pub key_awake_ms: u32,

    // --- Timers ---
    /// Reference clock feeding the capture timer (Hz).
    pub reference_clock_hz: u32,
    /// Width of the free-running reference counter (bits).
    pub reference_counter_bits: u8,
    /// Width of the sensor-edge pulse counter (bits).
    pub pulse_counter_bits: u8,

    // --- Rate engine ---
    pub rate_denominator: RateDenominator,

    // --- Persistence ---
    /// Factory preset used on first boot and after a backup loss.
    pub sensor_model: heapless::String<16>,
    /// Year the RTC reports after losing power.
    pub rtc_lost_year: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut sensor_model = heapless::String::new();
        let _ = sensor_model.push_str("AI_25");
        Self {
            sample_interval_ms: 1000, // 1 Hz
            max_idle_sleep_ms: 1000,
            key_awake_ms: 5000,

            reference_clock_hz: 32_768,
            reference_counter_bits: 16,
            pulse_counter_bits: 32,

            rate_denominator: RateDenominator::Elapsed,

            sensor_model,
            rtc_lost_year: 2000,
        }
    }
}

/// Errors from [`SystemConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}

/// Bitmask for a counter of `bits` width.
pub const fn counter_mask(bits: u8) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}

impl SystemConfig {
    pub fn reference_mask(&self) -> u32 {
        counter_mask(self.reference_counter_bits)
    }

    pub fn pulse_mask(&self) -> u32 {
        counter_mask(self.pulse_counter_bits)
    }

    /// Reference counter wrap period in milliseconds.  A tick delta is only
    /// unambiguous for intervals shorter than this.
    pub fn reference_wrap_ms(&self) -> u64 {
        (u64::from(self.reference_mask()) + 1) * 1000 / u64::from(self.reference_clock_hz)
    }

    /// Hard upper bound on a single sleep: one tick short of a reference
    /// counter wrap.
    pub fn max_sleep_ms(&self) -> u32 {
        let ms = u64::from(self.reference_mask()) * 1000 / u64::from(self.reference_clock_hz);
        ms.min(u64::from(u32::MAX)) as u32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=10_000).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 100–10000",
            ));
        }
        if !(1_000..=10_000_000).contains(&self.reference_clock_hz) {
            return Err(ConfigError::ValidationFailed(
                "reference_clock_hz must be 1 kHz–10 MHz",
            ));
        }
        if !(8..=32).contains(&self.reference_counter_bits) {
            return Err(ConfigError::ValidationFailed(
                "reference_counter_bits must be 8–32",
            ));
        }
        if !(8..=32).contains(&self.pulse_counter_bits) {
            return Err(ConfigError::ValidationFailed(
                "pulse_counter_bits must be 8–32",
            ));
        }
        if self.max_sleep_ms() < self.sample_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "reference counter wraps faster than one sample interval",
            ));
        }
        if self.max_idle_sleep_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_idle_sleep_ms must be non-zero",
            ));
        }
        if self.key_awake_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "key_awake_ms must be at most 60000",
            ));
        }
        if self.sensor_model.is_empty() {
            return Err(ConfigError::ValidationFailed("sensor_model must be set"));
        }
        Ok(())
    }
}
