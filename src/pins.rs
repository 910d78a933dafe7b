//! GPIO / peripheral pin assignments for the flow computer board.
//!
//! Single source of truth.  Every driver references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Flow sensor
// ---------------------------------------------------------------------------

/// Open-collector pulse output of the primary flow sensor.  Feeds the PCNT
/// unit and, through the GPIO matrix, the one-shot capture interrupt.
pub const FLOW_PULSE_GPIO: i32 = 6;

/// Line level while a pulse is in progress.  The open-collector output
/// pulls the line LOW; the internal pull-up holds it HIGH between pulses.
pub const FLOW_PULSE_ACTIVE_HIGH: bool = false;

/// PCNT limits.  The unit accumulates across overflows at the high limit.
pub const PCNT_HIGH_LIMIT: i32 = i16::MAX as i32;
pub const PCNT_LOW_LIMIT: i32 = -1;

// ---------------------------------------------------------------------------
// Reference clock
// ---------------------------------------------------------------------------

/// Reference tick rate the capture timestamps are scaled to.
pub const REFERENCE_CLOCK_HZ: u32 = 32_768;

// ---------------------------------------------------------------------------
// Backup domain
// ---------------------------------------------------------------------------

/// Digital input: HIGH while the backup cell is fitted and above cut-off.
pub const BACKUP_BATTERY_SENSE_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// Keypad (active-low, external pull-ups)
// ---------------------------------------------------------------------------

pub const KEY_ENTER_GPIO: i32 = 16;
pub const KEY_NEXT_GPIO: i32 = 17;
