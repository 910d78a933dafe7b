//! Factory presets, keyed by sensor model.
//!
//! Used on first boot, after a backup-memory loss and by the factory-reset
//! command.  Calibration factors are ×1000 pulses per liter; rate limits are
//! ×1000 in the preset's own volume/time unit.

use crate::fixed::Milli;
use crate::units::{TimeUnit, VolUnit};

#[derive(Debug, Clone, PartialEq)]
pub struct FactoryPreset {
    pub model: &'static str,
    pub factor_cal: u32,
    pub vol_unit: VolUnit,
    pub time_unit: TimeUnit,
    pub vol_pf_sel: u8,
    pub rate_pf_sel: u8,
    pub limit_low: Milli,
    pub limit_high: Milli,
    pub filter: u32,
}

pub static ALL: &[FactoryPreset] = &[
    FactoryPreset {
        model: "AI_25",
        factor_cal: 123_456,
        vol_unit: VolUnit::Liter,
        time_unit: TimeUnit::Second,
        vol_pf_sel: 2,
        rate_pf_sel: 2,
        limit_low: Milli::from_raw(300),
        limit_high: Milli::from_raw(4_000),
        filter: 0,
    },
    FactoryPreset {
        model: "AI_40",
        factor_cal: 45_870,
        vol_unit: VolUnit::Liter,
        time_unit: TimeUnit::Minute,
        vol_pf_sel: 2,
        rate_pf_sel: 1,
        limit_low: Milli::from_raw(40_000),
        limit_high: Milli::from_raw(600_000),
        filter: 0,
    },
    FactoryPreset {
        model: "AI_50",
        factor_cal: 23_250,
        vol_unit: VolUnit::CubicMeter,
        time_unit: TimeUnit::Hour,
        vol_pf_sel: 3,
        rate_pf_sel: 2,
        limit_low: Milli::from_raw(4_000),
        limit_high: Milli::from_raw(60_000),
        filter: 2,
    },
    FactoryPreset {
        model: "AI_80",
        factor_cal: 7_600,
        vol_unit: VolUnit::CubicMeter,
        time_unit: TimeUnit::Hour,
        vol_pf_sel: 3,
        rate_pf_sel: 1,
        limit_low: Milli::from_raw(10_000),
        limit_high: Milli::from_raw(160_000),
        filter: 2,
    },
];

/// Look up a preset by exact model name.
pub fn find(model: &str) -> Option<&'static FactoryPreset> {
    ALL.iter().find(|p| p.model == model)
}
