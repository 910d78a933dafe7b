//! ESP32 time adapters.
//!
//! - [`SystemRtc`] implements [`RtcPort`] from the system wall clock.  On
//!   ESP-IDF this is `gettimeofday()` + `localtime_r()`; the RTC keeps it
//!   running through light sleep and software resets.
//! - [`AwakeClock`] reports milliseconds the CPU has been awake.  FreeRTOS
//!   ticks stop in light sleep, so slept time is added separately by the
//!   service from the reference clock.
//!
//! Host builds use `std::time` for both, plus a settable [`SimRtc`].

use crate::app::ports::{RtcDateTime, RtcPort};

/// Seconds since the epoch for 2020-01-01.  Earlier wall-clock values mean
/// the clock was never set or lost power.
const EPOCH_2020: i64 = 1_577_836_800;

// ───────────────────────────────────────────────────────────────
// Wall clock
// ───────────────────────────────────────────────────────────────

/// Wall-clock RTC.  An unset clock reports `lost_year`, the same year the
/// hardware RTC shows after losing its supply.
pub struct SystemRtc {
    lost_year: u16,
}

impl SystemRtc {
    pub fn new(lost_year: u16) -> Self {
        Self { lost_year }
    }

    fn lost(&self) -> RtcDateTime {
        RtcDateTime {
            year: self.lost_year,
            month: 1,
            day: 1,
            ..RtcDateTime::default()
        }
    }
}

#[cfg(target_os = "espidf")]
impl RtcPort for SystemRtc {
    fn now(&mut self) -> RtcDateTime {
        use esp_idf_svc::sys;

        let mut tv = sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return self.lost();
        }
        if tv.tv_sec < EPOCH_2020 {
            return self.lost();
        }
        let secs = tv.tv_sec as sys::time_t;
        let mut tm: sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { sys::localtime_r(&secs, &mut tm) }.is_null() {
            return self.lost();
        }
        RtcDateTime {
            year: (tm.tm_year + 1900) as u16,
            month: (tm.tm_mon + 1) as u8,
            day: tm.tm_mday as u8,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
            second: tm.tm_sec as u8,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RtcPort for SystemRtc {
    fn now(&mut self) -> RtcDateTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        if secs < EPOCH_2020 {
            return self.lost();
        }
        civil_from_unix(secs)
    }
}

/// UTC calendar fields from Unix seconds (proleptic Gregorian).
#[cfg(not(target_os = "espidf"))]
fn civil_from_unix(secs: i64) -> RtcDateTime {
    let days = secs.div_euclid(86_400);
    let sod = secs.rem_euclid(86_400);

    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    RtcDateTime {
        year: year as u16,
        month: month as u8,
        day: day as u8,
        hour: (sod / 3_600) as u8,
        minute: (sod % 3_600 / 60) as u8,
        second: (sod % 60) as u8,
    }
}

/// Settable RTC for host tests and simulation.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy)]
pub struct SimRtc {
    pub now: RtcDateTime,
}

#[cfg(not(target_os = "espidf"))]
impl SimRtc {
    pub fn at_year(year: u16) -> Self {
        Self {
            now: RtcDateTime {
                year,
                month: 1,
                day: 1,
                ..RtcDateTime::default()
            },
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RtcPort for SimRtc {
    fn now(&mut self) -> RtcDateTime {
        self.now
    }
}

// ───────────────────────────────────────────────────────────────
// Awake time
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds spent awake.
pub struct AwakeClock {
    #[cfg(target_os = "espidf")]
    last_tick: u32,
    #[cfg(target_os = "espidf")]
    wraps: u64,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for AwakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AwakeClock {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self { last_tick: 0, wraps: 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds awake since boot.  The 32-bit tick counter is extended
    /// on each call, so poll at least once per wrap.
    #[cfg(target_os = "espidf")]
    pub fn awake_ms(&mut self) -> u64 {
        use esp_idf_svc::sys;

        let tick = unsafe { sys::xTaskGetTickCount() };
        if tick < self.last_tick {
            self.wraps += 1;
        }
        self.last_tick = tick;
        let ticks = (self.wraps << 32) | u64::from(tick);
        ticks * 1000 / u64::from(sys::configTICK_RATE_HZ)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn awake_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
