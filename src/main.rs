//! Flow-meter Firmware: Main Entry Point
//!
//! Hexagonal architecture with a sleep-driven main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspCapture      BackupDomain    SystemRtc     StatusJournal   │
//! │  (CapturePort)   (BackupPort)    (RtcPort)     (FlowJournal)   │
//! │  LogEventSink    AwakeClock                                    │
//! │  (EventSink)                                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              FlowService (pure logic)                  │    │
//! │  │  Correlator · Totalizer · FlowStatus FSM               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  SampleGate · SleepClock (light-sleep accounting)              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{Pin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use log::info;

use flowmeter::adapters::backup::BackupDomain;
use flowmeter::adapters::hardware::{EspCapture, CAPTURE_SLOT};
use flowmeter::adapters::journal::StatusJournal;
use flowmeter::adapters::log_sink::LogEventSink;
use flowmeter::adapters::time::{AwakeClock, SystemRtc};
use flowmeter::app::service::FlowService;
use flowmeter::config::SystemConfig;
use flowmeter::diagnostics::{self, fatal_halt};
use flowmeter::drivers::{hw_init, hw_timer};
use flowmeter::events;
use flowmeter::pins;

/// Journal depth: start/stop records kept in RAM.
const JOURNAL_LEN: usize = 32;

/// Awake time between two stats log lines.
const STATS_INTERVAL_MS: u64 = 60_000;

/// Loop period while the CPU must stay awake (key hold, cycle due).
const AWAKE_TICK_MS: u32 = 20;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Flowmeter v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    // ── 2. Initialise hardware peripherals ───────────────────
    if let Err(e) = hw_init::init_peripherals() {
        fatal_halt(&format!("HAL init failed: {}", e));
    }
    if let Err(e) = hw_init::init_isr_service() {
        fatal_halt(&format!("ISR service init failed: {}", e));
    }
    hw_timer::init_timers();

    // ── 3. Configuration ──────────────────────────────────────
    let config = SystemConfig::default();
    if config.reference_clock_hz != pins::REFERENCE_CLOCK_HZ {
        fatal_halt("reference_clock_hz does not match the board crystal");
    }
    let requested_sleep_ms = config.max_idle_sleep_ms;

    // ── 4. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    // The HAL hands out pins by type; keep this in step with pins.rs.
    let battery_pin = peripherals.pins.gpio21;
    if battery_pin.pin() != pins::BACKUP_BATTERY_SENSE_GPIO {
        fatal_halt("battery sense pin does not match pins::BACKUP_BATTERY_SENSE_GPIO");
    }
    let mut battery_sense = PinDriver::input(battery_pin)?;
    battery_sense.set_pull(Pull::Down)?;
    info!("Battery sense on GPIO{}", pins::BACKUP_BATTERY_SENSE_GPIO);

    let mut hw = EspCapture;
    let mut backup = BackupDomain::new(battery_sense);
    let mut rtc = SystemRtc::new(config.rtc_lost_year);
    let mut clock = AwakeClock::new();
    let mut journal: StatusJournal<JOURNAL_LEN> = StatusJournal::new();
    let mut log_sink = LogEventSink::new();

    // ── 5. Construct app service ──────────────────────────────
    let mut app = match FlowService::start(config, &CAPTURE_SLOT, &mut backup, &mut rtc, &mut log_sink) {
        Ok(app) => app,
        Err(e) => fatal_halt(&format!("service start failed: {}", e)),
    };

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    let mut last_stats_ms: u64 = 0;

    loop {
        app.on_wake(&mut hw);
        app.note_wakes(&events::drain_wakes(), clock.awake_ms());

        if app.poll(clock.awake_ms(), &mut rtc, &mut journal, &mut log_sink).is_some() {
            hw_timer::set_display_refresh(app.indicator_blink());
        }

        // Failures are logged and emitted by the service; the image is
        // still dirty and the next cycle retries.
        let _ = app.sync_backup(&mut backup, &mut log_sink);

        let awake = clock.awake_ms();
        if awake.saturating_sub(last_stats_ms) >= STATS_INTERVAL_MS {
            info!("STATS | {}", app.stats());
            last_stats_ms = awake;
        }

        match app.prepare_sleep(&mut hw, awake, requested_sleep_ms) {
            0 => FreeRtos::delay_ms(AWAKE_TICK_MS),
            ms => light_sleep(ms),
        }
    }
}

/// Enter light sleep for at most `ms`.  A capture or key interrupt ends
/// it early.
fn light_sleep(ms: u32) {
    use esp_idf_svc::sys::*;

    // SAFETY: called from the main task only; wake sources (timer, GPIO)
    // are configured before each sleep.
    unsafe {
        esp_sleep_enable_timer_wakeup(u64::from(ms) * 1000);
        esp_light_sleep_start();
    }
}
