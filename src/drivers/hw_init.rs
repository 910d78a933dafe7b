//! One-shot hardware peripheral initialization.
//!
//! Configures the flow input, the pulse counter (PCNT), the keypad and the
//! capture interrupt using raw ESP-IDF sys calls.  The battery sense pin is
//! owned by an `esp-idf-hal` `PinDriver` in `main()` instead.  Called once from
//! `main()` before the event loop starts.  Also hosts the small register
//! helpers the capture adapter calls, including from ISR context.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    PcntInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::PcntInitFailed(rc) => write!(f, "PCNT init failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("peripheral init")
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_pcnt()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Capture trigger ───────────────────────────────────────────

/// Interrupt condition armed on the flow input for the one-shot capture.
///
/// The capture doubles as the light-sleep wake source, and GPIO wake on the
/// ESP32-S3 is level-only, so the trigger is the pulse's active level.
/// Arming on the idle level would fire at once.  The ISR disarms on entry,
/// so the level interrupt fires once per arm, at the leading edge of the
/// first pulse.  A pulse already in progress when the capture is armed
/// fires it immediately; that pulse has been counted by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    LowLevel,
    HighLevel,
}

/// Trigger for a line whose pulses are driven to `active_high`.
pub const fn capture_trigger(active_high: bool) -> CaptureTrigger {
    if active_high { CaptureTrigger::HighLevel } else { CaptureTrigger::LowLevel }
}

/// Pull that holds the flow input at its idle level: `(pull_up, pull_down)`.
pub const fn idle_pull(active_high: bool) -> (bool, bool) {
    (!active_high, active_high)
}

#[cfg(target_os = "espidf")]
fn capture_intr_type() -> gpio_int_type_t {
    match capture_trigger(pins::FLOW_PULSE_ACTIVE_HIGH) {
        CaptureTrigger::LowLevel => gpio_int_type_t_GPIO_INTR_LOW_LEVEL,
        CaptureTrigger::HighLevel => gpio_int_type_t_GPIO_INTR_HIGH_LEVEL,
    }
}

// ── GPIO inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let (flow_up, flow_down) = idle_pull(pins::FLOW_PULSE_ACTIVE_HIGH);
    let inputs = [
        (pins::FLOW_PULSE_GPIO, u32::from(flow_up), u32::from(flow_down)),
        (pins::KEY_ENTER_GPIO, gpio_pullup_t_GPIO_PULLUP_DISABLE, gpio_pulldown_t_GPIO_PULLDOWN_DISABLE),
        (pins::KEY_NEXT_GPIO, gpio_pullup_t_GPIO_PULLUP_DISABLE, gpio_pulldown_t_GPIO_PULLDOWN_DISABLE),
    ];

    for &(pin, pull_up_en, pull_down_en) in &inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en,
            pull_down_en,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

// ── Pulse counter ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static PCNT_UNIT: AtomicPtr<pcnt_unit_t> = AtomicPtr::new(core::ptr::null_mut());

#[cfg(target_os = "espidf")]
unsafe fn init_pcnt() -> Result<(), HwInitError> {
    let mut unit_cfg = pcnt_unit_config_t {
        low_limit: pins::PCNT_LOW_LIMIT,
        high_limit: pins::PCNT_HIGH_LIMIT,
        ..Default::default()
    };
    unit_cfg.flags.set_accum_count(1);

    let mut unit: pcnt_unit_handle_t = core::ptr::null_mut();
    let ret = unsafe { pcnt_new_unit(&unit_cfg, &mut unit) };
    if ret != ESP_OK { return Err(HwInitError::PcntInitFailed(ret)); }

    let chan_cfg = pcnt_chan_config_t {
        edge_gpio_num: pins::FLOW_PULSE_GPIO,
        level_gpio_num: -1,
        ..Default::default()
    };
    let mut chan: pcnt_channel_handle_t = core::ptr::null_mut();
    let ret = unsafe { pcnt_new_channel(unit, &chan_cfg, &mut chan) };
    if ret != ESP_OK { return Err(HwInitError::PcntInitFailed(ret)); }

    // Count the leading edge of each pulse, the same edge the capture
    // latches, so the count read in the capture ISR includes that pulse.
    let (pos_act, neg_act) = if pins::FLOW_PULSE_ACTIVE_HIGH {
        (
            pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
            pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_HOLD,
        )
    } else {
        (
            pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_HOLD,
            pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
        )
    };
    let ret = unsafe { pcnt_channel_set_edge_action(chan, pos_act, neg_act) };
    if ret != ESP_OK { return Err(HwInitError::PcntInitFailed(ret)); }

    // Overflow watch point so the driver can accumulate beyond 16 bits.
    let ret = unsafe { pcnt_unit_add_watch_point(unit, pins::PCNT_HIGH_LIMIT) };
    if ret != ESP_OK { return Err(HwInitError::PcntInitFailed(ret)); }

    for step in [pcnt_unit_enable, pcnt_unit_clear_count, pcnt_unit_start] {
        let ret = unsafe { step(unit) };
        if ret != ESP_OK { return Err(HwInitError::PcntInitFailed(ret)); }
    }

    PCNT_UNIT.store(unit, Ordering::Release);
    info!("hw_init: PCNT counting on GPIO{}", pins::FLOW_PULSE_GPIO);
    Ok(())
}

/// Accumulated pulse count.  ISR-safe.
#[cfg(target_os = "espidf")]
pub fn pcnt_count() -> u32 {
    let unit = PCNT_UNIT.load(Ordering::Acquire);
    if unit.is_null() {
        return 0;
    }
    let mut count: i32 = 0;
    // SAFETY: unit was created in init_pcnt() and is never deleted;
    // pcnt_unit_get_count is placed in IRAM and allowed from ISRs.
    unsafe { pcnt_unit_get_count(unit, &mut count) };
    count as u32
}

#[cfg(not(target_os = "espidf"))]
pub fn pcnt_count() -> u32 {
    0
}

// ── Reference clock ───────────────────────────────────────────

/// System time scaled to reference ticks.  ESP-IDF advances it by the
/// slept duration after each light sleep.  ISR-safe.
#[cfg(target_os = "espidf")]
pub fn reference_ticks() -> u32 {
    // SAFETY: esp_timer_get_time is IRAM-safe and callable from ISRs.
    let us = unsafe { esp_timer_get_time() } as u64;
    (u128::from(us) * u128::from(pins::REFERENCE_CLOCK_HZ) / 1_000_000) as u32
}

#[cfg(not(target_os = "espidf"))]
pub fn reference_ticks() -> u32 {
    0
}

// ── Capture interrupt ─────────────────────────────────────────

/// Enable or disable the one-shot capture interrupt on the flow input,
/// together with its light-sleep wake source.  ISR-safe.
///
/// `gpio_wakeup_enable` also rewrites the pin's interrupt type, so both use
/// the same [`CaptureTrigger`] level.
#[cfg(target_os = "espidf")]
pub fn capture_irq(enabled: bool) {
    // SAFETY: register-level enable/disable on a pin configured in
    // init_gpio_inputs(); these calls do not allocate or block.
    unsafe {
        if enabled {
            gpio_wakeup_enable(pins::FLOW_PULSE_GPIO, capture_intr_type());
            gpio_intr_enable(pins::FLOW_PULSE_GPIO);
        } else {
            gpio_intr_disable(pins::FLOW_PULSE_GPIO);
            gpio_wakeup_disable(pins::FLOW_PULSE_GPIO);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn capture_irq(_enabled: bool) {}

// ── GPIO ISR service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
unsafe extern "C" fn capture_gpio_isr(_arg: *mut core::ffi::c_void) {
    let mut hw = crate::adapters::hardware::EspCapture;
    crate::correlator::on_capture_interrupt(&mut hw, &crate::adapters::hardware::CAPTURE_SLOT);
    push_event(Event::CaptureReady);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn key_gpio_isr(_arg: *mut core::ffi::c_void) {
    push_event(Event::KeyPressed);
}

/// Install the GPIO ISR service and register the capture and keypad
/// handlers.  The capture interrupt starts disabled; the coordinator arms
/// it before each sleep.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  Handlers only touch the capture slot
    // and the lock-free event queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::FLOW_PULSE_GPIO, capture_intr_type());
        gpio_isr_handler_add(pins::FLOW_PULSE_GPIO, Some(capture_gpio_isr), core::ptr::null_mut());
        capture_irq(false);

        for pin in [pins::KEY_ENTER_GPIO, pins::KEY_NEXT_GPIO] {
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_NEGEDGE);
            gpio_isr_handler_add(pin, Some(key_gpio_isr), core::ptr::null_mut());
            gpio_wakeup_enable(pin, gpio_int_type_t_GPIO_INTR_LOW_LEVEL);
            gpio_intr_enable(pin);
        }
        esp_sleep_enable_gpio_wakeup();

        info!("hw_init: ISR service installed (capture, keypad)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_init_succeeds() {
        assert_eq!(init_peripherals(), Ok(()));
        assert_eq!(init_isr_service(), Ok(()));
    }

    #[test]
    fn capture_arms_on_the_pulse_level_not_the_idle_level() {
        // Idle-high line (pull-up, open collector): arm on LOW.
        assert_eq!(idle_pull(false), (true, false));
        assert_eq!(capture_trigger(false), CaptureTrigger::LowLevel);
        // Idle-low line: arm on HIGH.
        assert_eq!(idle_pull(true), (false, true));
        assert_eq!(capture_trigger(true), CaptureTrigger::HighLevel);
    }

    #[test]
    fn flow_input_idles_opposite_its_capture_level() {
        let (pull_up, _) = idle_pull(crate::pins::FLOW_PULSE_ACTIVE_HIGH);
        let idle_high = pull_up;
        let fires_on_high = capture_trigger(crate::pins::FLOW_PULSE_ACTIVE_HIGH) == CaptureTrigger::HighLevel;
        assert_ne!(idle_high, fires_on_high);
    }

    #[test]
    fn init_error_display_names_the_peripheral() {
        assert_eq!(format!("{}", HwInitError::PcntInitFailed(-1)), "PCNT init failed (rc=-1)");
    }
}
