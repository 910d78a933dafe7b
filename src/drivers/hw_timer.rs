//! Display refresh timer using ESP-IDF's esp_timer API.
//!
//! While flow is present the display's flow indicator blinks; a periodic
//! timer pushes [`Event::DisplayRefresh`] into the lock-free queue at the
//! blink rate.  With no flow the timer is stopped so it does not keep
//! pulling the CPU out of light sleep.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR); the
//! event queue's push is safe from there.

use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Blink half-period.
pub const DISPLAY_REFRESH_PERIOD_MS: u64 = 500;

/// Created/running flags of the refresh timer.  `running` only turns true
/// once the timer exists and a start call succeeded.
pub struct RefreshState {
    created: AtomicBool,
    running: AtomicBool,
}

impl RefreshState {
    pub const fn new() -> Self {
        Self {
            created: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub fn mark_created(&self) {
        self.created.store(true, Ordering::Release);
    }

    /// Drive the timer towards `enabled` through `apply`, which returns
    /// whether the start/stop call succeeded.  Idempotent.
    pub fn set(&self, enabled: bool, apply: impl FnOnce(bool) -> bool) {
        if !self.created.load(Ordering::Acquire) {
            return;
        }
        if self.running.load(Ordering::Acquire) == enabled {
            return;
        }
        if apply(enabled) {
            self.running.store(enabled, Ordering::Release);
        }
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}

static STATE: RefreshState = RefreshState::new();

#[cfg(target_os = "espidf")]
static mut REFRESH_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: REFRESH_TIMER is written once in `init_timers()` before any
/// timer callbacks fire.  Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn refresh_timer() -> esp_timer_handle_t { unsafe { REFRESH_TIMER } }

#[cfg(target_os = "espidf")]
unsafe extern "C" fn refresh_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::DisplayRefresh);
}

/// Create the (stopped) display refresh timer.
#[cfg(target_os = "espidf")]
pub fn init_timers() {
    // SAFETY: REFRESH_TIMER is written here once at boot from the single
    // main-task context before the timer is ever started.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(refresh_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"display\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&args, &raw mut REFRESH_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: display timer create failed (rc={}), indicator will not blink", ret);
            return;
        }
    }
    STATE.mark_created();
    info!("hw_timer: display timer created ({} ms)", DISPLAY_REFRESH_PERIOD_MS);
}

#[cfg(not(target_os = "espidf"))]
pub fn init_timers() {
    STATE.mark_created();
    log::info!("hw_timer(sim): display timer simulated");
}

/// Start or stop the periodic display refresh.  Idempotent; a no-op when
/// the timer was never created.
pub fn set_display_refresh(enabled: bool) {
    STATE.set(enabled, apply);
}

/// Whether the refresh timer exists and is running.
pub fn display_refresh_running() -> bool {
    STATE.running()
}

#[cfg(target_os = "espidf")]
fn apply(enabled: bool) -> bool {
    // SAFETY: refresh_timer() contract, main task only; STATE only calls
    // this after init_timers() stored a valid handle.
    unsafe {
        let t = refresh_timer();
        let ret = if enabled {
            esp_timer_start_periodic(t, DISPLAY_REFRESH_PERIOD_MS * 1000)
        } else {
            esp_timer_stop(t)
        };
        if ret != ESP_OK {
            log::warn!("hw_timer: display timer {} failed (rc={})", if enabled { "start" } else { "stop" }, ret);
            return false;
        }
    }
    true
}

#[cfg(not(target_os = "espidf"))]
fn apply(enabled: bool) -> bool {
    log::debug!("hw_timer(sim): display refresh {}", if enabled { "on" } else { "off" });
    true
}
