//! Volume and time unit tables.
//!
//! Each unit is a closed enum; the conversion ratio and short display
//! label come from an exhaustive `match`, so an out-of-range selector
//! can never index past the end of a table.  Raw selector bytes coming
//! from the setup menu go through [`TryFrom<u8>`] first.

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

// ═══════════════════════════════════════════════════════════════
//  Volume units
// ═══════════════════════════════════════════════════════════════

/// Display volume unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VolUnit {
    Liter = 0,
    CubicMeter = 1,
    GallonUs = 2,
    GallonImperial = 3,
    Barrel = 4,
    CubicFoot = 5,
}

impl VolUnit {
    /// Number of selectable volume units.
    pub const COUNT: usize = 6;

    /// Every unit, in selector order.
    pub const ALL: [VolUnit; Self::COUNT] = [
        Self::Liter,
        Self::CubicMeter,
        Self::GallonUs,
        Self::GallonImperial,
        Self::Barrel,
        Self::CubicFoot,
    ];

    /// Liters contained in one of this unit.
    pub const fn liters_per_unit(self) -> f64 {
        match self {
            Self::Liter => 1.0,
            Self::CubicMeter => 1000.0,
            Self::GallonUs => 3.785_411_784,
            Self::GallonImperial => 4.546_09,
            // US oil barrel, 42 US gallons.
            Self::Barrel => 158.987_294_928,
            Self::CubicFoot => 28.316_846_592,
        }
    }

    /// Short label for the segment display.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Liter => "L",
            Self::CubicMeter => "m3",
            Self::GallonUs => "GAL",
            Self::GallonImperial => "IGL",
            Self::Barrel => "bbl",
            Self::CubicFoot => "ft3",
        }
    }

    /// Selector index as stored by the menu layer.
    pub const fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for VolUnit {
    type Error = SetupError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Liter),
            1 => Ok(Self::CubicMeter),
            2 => Ok(Self::GallonUs),
            3 => Ok(Self::GallonImperial),
            4 => Ok(Self::Barrel),
            5 => Ok(Self::CubicFoot),
            other => Err(SetupError::InvalidVolUnit(other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Time units
// ═══════════════════════════════════════════════════════════════

/// Time base of the displayed flow rate (volume per `TimeUnit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeUnit {
    Second = 0,
    Minute = 1,
    Hour = 2,
    Day = 3,
}

impl TimeUnit {
    pub const COUNT: usize = 4;

    pub const ALL: [TimeUnit; Self::COUNT] = [Self::Second, Self::Minute, Self::Hour, Self::Day];

    /// Seconds in one of this unit.
    pub const fn seconds(self) -> u32 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Second => "/s",
            Self::Minute => "/min",
            Self::Hour => "/h",
            Self::Day => "/d",
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TimeUnit {
    type Error = SetupError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Second),
            1 => Ok(Self::Minute),
            2 => Ok(Self::Hour),
            3 => Ok(Self::Day),
            other => Err(SetupError::InvalidTimeUnit(other)),
        }
    }
}
