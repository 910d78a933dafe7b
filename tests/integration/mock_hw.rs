//! Test rig for integration tests.
//!
//! Wires the host stand-ins (SimCapture, SimRtc, BackupDomain, StatusJournal)
//! to a recording event sink, and drives the service through whole
//! sleep/wake cycles the way `main()` does on hardware.

use core::convert::Infallible;

use flowmeter::adapters::backup::BackupDomain;
use flowmeter::adapters::hardware::SimCapture;
use flowmeter::adapters::journal::StatusJournal;
use flowmeter::adapters::time::SimRtc;
use flowmeter::app::events::{AppEvent, FlowReading};
use flowmeter::app::ports::EventSink;
use flowmeter::app::service::FlowService;
use flowmeter::config::SystemConfig;
use flowmeter::correlator::CaptureSlot;

/// Reference ticks in one second at the default 32.768 kHz.
pub const TICKS_PER_SEC: u32 = 32_768;

/// Reference ticks between the start of a sleep and the first sensor edge.
const EDGE_PHASE_TICKS: u32 = 100;

// ── Battery sense pin ─────────────────────────────────────────

pub struct BatteryPin(pub bool);

impl embedded_hal::digital::ErrorType for BatteryPin {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for BatteryPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0)
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub hw: SimCapture,
    pub rtc: SimRtc,
    pub journal: StatusJournal<16>,
    pub sink: RecordingSink,
    pub backup: BackupDomain<BatteryPin>,
    pub awake_ms: u64,
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl Rig {
    /// Blank backup memory, battery fitted, RTC running.
    pub fn new() -> Self {
        Self::with_backup(Vec::new(), true, 2026)
    }

    /// Boot with a region carried over from a previous run.
    pub fn with_backup(region: Vec<u8>, battery: bool, rtc_year: u16) -> Self {
        Self {
            hw: SimCapture::new(),
            rtc: SimRtc::at_year(rtc_year),
            journal: StatusJournal::new(),
            sink: RecordingSink::new(),
            backup: BackupDomain::with_region(BatteryPin(battery), region),
            awake_ms: 0,
        }
    }

    pub fn start<'a>(&mut self, slot: &'a CaptureSlot, config: SystemConfig) -> FlowService<'a> {
        FlowService::start(config, slot, &mut self.backup, &mut self.rtc, &mut self.sink)
            .expect("service start")
    }

    /// Poll without sleeping first.
    pub fn poll(&mut self, svc: &mut FlowService<'_>) -> Option<FlowReading> {
        svc.poll(self.awake_ms, &mut self.rtc, &mut self.journal, &mut self.sink)
    }

    /// One full second asleep with `pulses` sensor edges, then the cycle
    /// that follows the wake.
    pub fn sleep_cycle(&mut self, svc: &mut FlowService<'_>, slot: &CaptureSlot, pulses: u32) -> FlowReading {
        let ms = svc.prepare_sleep(&mut self.hw, self.awake_ms, 1000);
        assert_eq!(ms, 1000, "expected a full-second sleep");

        self.hw.advance(EDGE_PHASE_TICKS);
        self.hw.edges(pulses, slot);
        self.hw.advance(TICKS_PER_SEC - EDGE_PHASE_TICKS);

        svc.on_wake(&mut self.hw);
        self.poll(svc).expect("cycle due after a full-second sleep")
    }

    /// Hand backup memory to the next boot.
    pub fn into_region(self) -> Vec<u8> {
        self.backup.into_region()
    }
}
