//! Unified error types for the flow-meter firmware.
//!
//! A single top-level [`Error`] that every subsystem converts into, plus the
//! narrower [`SetupError`] returned by every validated setter.  All variants
//! are `Copy` so the menu layer can hold on to a rejection and show it.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A setup edit was rejected.
    Setup(SetupError),
    /// The backup-memory image could not be read or written.
    Backup(BackupError),
    /// Peripheral or scheduler-object initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(e) => write!(f, "setup: {e}"),
            Self::Backup(e) => write!(f, "backup: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Setup (validation) errors
// ---------------------------------------------------------------------------

/// Rejection reasons for setter calls.  On any of these the totalizer
/// environment is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// Calibration factor (×1000) outside the accepted window.
    CalibrationOutOfRange { value: u32, min: u32, max: u32 },
    /// Volume unit selector is not a known unit.
    InvalidVolUnit(u8),
    /// Time unit selector is not a known unit.
    InvalidTimeUnit(u8),
    /// A derived factor written directly was zero, negative or not finite.
    InvalidFactor,
    /// Decimal-place selector above the highest display position.
    InvalidDecimalSelector(u8),
    /// Advisory rate limits with `low > high`.
    InvertedRateLimits { low: u32, high: u32 },
    /// No factory preset exists for the sensor model.
    UnknownSensorModel,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalibrationOutOfRange { value, min, max } => {
                write!(f, "calibration {value} outside {min}..={max}")
            }
            Self::InvalidVolUnit(raw) => write!(f, "invalid volume unit {raw}"),
            Self::InvalidTimeUnit(raw) => write!(f, "invalid time unit {raw}"),
            Self::InvalidFactor => write!(f, "derived factor must be finite and positive"),
            Self::InvalidDecimalSelector(sel) => write!(f, "invalid decimal selector {sel}"),
            Self::InvertedRateLimits { low, high } => {
                write!(f, "rate limit low {low} above high {high}")
            }
            Self::UnknownSensorModel => write!(f, "unknown sensor model"),
        }
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

// ---------------------------------------------------------------------------
// Backup-memory errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupError {
    /// The encoded image does not fit in the retained region.
    RegionTooSmall { needed: usize, available: usize },
    /// Serialisation of the image failed.
    Encode,
    /// The region holds no valid image (blank, foreign or corrupted).
    NoImage,
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionTooSmall { needed, available } => {
                write!(f, "image needs {needed} bytes, region has {available}")
            }
            Self::Encode => write!(f, "image encode failed"),
            Self::NoImage => write!(f, "no valid image"),
        }
    }
}

impl From<BackupError> for Error {
    fn from(e: BackupError) -> Self {
        Self::Backup(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
