//! Fixed-point ×1000 values.
//!
//! Volumes and rates are computed in `f64` and then stored as an unsigned
//! integer holding the true quantity multiplied by 1000.  The conversion
//! **truncates toward zero**; it never rounds.  Downstream display, ticket
//! printing and the event logger all depend on this exact behaviour.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Scale of every fixed-point quantity in the firmware.
pub const SCALE: u32 = 1000;

/// An unsigned fixed-point number with three implied decimal digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Milli(u32);

impl Milli {
    pub const ZERO: Milli = Milli(0);
    pub const MAX: Milli = Milli(u32::MAX);

    /// Wrap an already-scaled raw value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Scaled integer representation.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Truncate an already-scaled `f64` into fixed point.
    ///
    /// Uses Rust's saturating float-to-int cast: NaN and negative inputs
    /// become 0, inputs above `u32::MAX` become `u32::MAX`.
    #[inline]
    pub fn from_f64_trunc(scaled: f64) -> Self {
        Self(scaled as u32)
    }

    /// Unscaled value as `f64`.
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }

    /// Integer part.
    pub const fn whole(self) -> u32 {
        self.0 / SCALE
    }

    /// Three-digit fractional part.
    pub const fn frac(self) -> u32 {
        self.0 % SCALE
    }

    /// Render with `places` decimals (clamped to 0..=3); hidden digits are
    /// dropped, not rounded.
    pub fn display(self, places: u8) -> MilliDisplay {
        MilliDisplay {
            value: self,
            places: places.min(3),
        }
    }
}

impl fmt::Display for Milli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.whole(), self.frac())
    }
}

/// Formatter returned by [`Milli::display`].
#[derive(Debug, Clone, Copy)]
pub struct MilliDisplay {
    value: Milli,
    places: u8,
}

impl fmt::Display for MilliDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.value.whole();
        let frac = self.value.frac();
        match self.places {
            0 => write!(f, "{whole}"),
            1 => write!(f, "{whole}.{:01}", frac / 100),
            2 => write!(f, "{whole}.{:02}", frac / 10),
            _ => write!(f, "{whole}.{frac:03}"),
        }
    }
}
