//! Application service: the hexagonal core.
//!
//! [`FlowService`] owns the totalizer, correlator, flow-status machine and
//! scheduling state.  It is the only writer of the totalizer environment;
//! everything else reads it through [`FlowService::totalizer`] or changes
//! it through [`FlowService::handle_command`].  All I/O flows through port
//! traits passed at call sites.
//!
//! ```text
//!  CapturePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  CaptureSlot ──▶ │         FlowService          │ ──▶ FlowJournalPort
//!      RtcPort ──▶ │ Correlator · Totalizer · FSM │ ◀─▶ BackupPort
//!                  └──────────────────────────────┘
//! ```
//!
//! Main loop contract, per wake-up:
//!
//! 1. [`on_wake`](FlowService::on_wake) adds the slept reference ticks.
//! 2. [`poll`](FlowService::poll) runs a cycle if the sample gate allows.
//! 3. [`sync_backup`](FlowService::sync_backup) rewrites the image if dirty.
//! 4. [`prepare_sleep`](FlowService::prepare_sleep) arms the capture IRQ and
//!    returns how long to sleep.

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::correlator::{CaptureSlot, Correlator, Sample};
use crate::diagnostics::CycleStats;
use crate::error::{BackupError, Error, SetupError};
use crate::flow_status::{FlowStatus, FlowStatusMachine};
use crate::persistence::{self, EnvSource};
use crate::presets;
use crate::events::WakeSummary;
use crate::scheduler::{AwakeHold, SampleGate, SleepClock};
use crate::totalizer::{EngineParams, RateBand, Totalizer, TotalizerEnv};

use super::commands::SetupCommand;
use super::events::{AppEvent, FlowReading};
use super::ports::{BackupPort, CapturePort, EventSink, FlowJournalPort, RtcPort};

// ───────────────────────────────────────────────────────────────
// FlowService
// ───────────────────────────────────────────────────────────────

pub struct FlowService<'a> {
    config: SystemConfig,
    slot: &'a CaptureSlot,
    totalizer: Totalizer,
    correlator: Correlator,
    status: FlowStatusMachine,
    gate: SampleGate,
    sleep: SleepClock,
    hold: AwakeHold,
    stats: CycleStats,
    band: RateBand,
    /// Scheduler time of the last consumed capture.
    last_capture_ms: Option<u64>,
    reference_wrap_ms: u64,
    source: EnvSource,
    reset_count: u32,
    backup_dirty: bool,
}

impl<'a> FlowService<'a> {
    /// Validate `config`, restore the environment and build the service.
    ///
    /// The restored image is marked dirty so the incremented reset counter
    /// reaches backup memory on the first sync.
    pub fn start(
        config: SystemConfig,
        slot: &'a CaptureSlot,
        backup: &mut impl BackupPort,
        rtc: &mut impl RtcPort,
        sink: &mut impl EventSink,
    ) -> Result<Self, Error> {
        config.validate()?;
        let restored = persistence::restore(backup, rtc, &config)?;
        let totalizer = Totalizer::new(restored.env, EngineParams::from_config(&config));
        let band = totalizer.rate_band();

        info!(
            "FlowService started: source={:?} reset #{} model={}",
            restored.source, restored.reset_count, config.sensor_model
        );
        sink.emit(&AppEvent::Restored {
            source: restored.source,
            reset_count: restored.reset_count,
        });

        Ok(Self {
            slot,
            totalizer,
            correlator: Correlator::from_config(&config),
            status: FlowStatusMachine::new(),
            gate: SampleGate::new(config.sample_interval_ms),
            sleep: SleepClock::from_config(&config),
            hold: AwakeHold::new(),
            stats: CycleStats::default(),
            band,
            last_capture_ms: None,
            reference_wrap_ms: config.reference_wrap_ms(),
            source: restored.source,
            reset_count: restored.reset_count,
            backup_dirty: true,
            config,
        })
    }

    // ── Time ──────────────────────────────────────────────────

    /// Scheduler time: awake time plus measured sleep.
    pub fn now_ms(&self, awake_ms: u64) -> u64 {
        awake_ms + self.sleep.slept_ms()
    }

    /// Account for the wake events drained since the last pass.  A key
    /// press keeps the CPU awake for `key_awake_ms`.
    pub fn note_wakes(&mut self, wakes: &WakeSummary, awake_ms: u64) {
        self.stats.capture_wakes += u64::from(wakes.captures);
        self.stats.key_wakes += u64::from(wakes.keys);
        self.stats.refresh_wakes += u64::from(wakes.refreshes);
        if wakes.keys > 0 {
            self.hold.extend(self.now_ms(awake_ms), u64::from(self.config.key_awake_ms));
            debug!("FlowService: key wake, holding awake {} ms", self.config.key_awake_ms);
        }
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one sampling cycle if the gate allows it.
    ///
    /// Consumes the pending capture (if any), accumulates pulses,
    /// recalculates volumes and rate, advances the flow status and hands
    /// it to the journal.  Returns `None` when the gate skipped.
    pub fn poll(
        &mut self,
        awake_ms: u64,
        rtc: &mut impl RtcPort,
        journal: &mut impl FlowJournalPort,
        sink: &mut impl EventSink,
    ) -> Option<FlowReading> {
        let now = self.now_ms(awake_ms);
        if !self.gate.poll(now) {
            self.stats.gate_skips += 1;
            return None;
        }
        self.stats.cycles += 1;

        let (pulse_delta, tick_delta) = self.consume_capture(now);

        self.totalizer.recalculate();

        let prev = self.status.status();
        let status = self.status.update(pulse_delta != 0);
        if status != prev {
            sink.emit(&AppEvent::StatusChanged { from: prev, to: status });
        }
        journal.ingest(status, rtc.now());

        let band = self.totalizer.rate_band();
        if band != self.band {
            info!("Rate band {:?} -> {:?}", self.band, band);
            sink.emit(&AppEvent::RateBandChanged {
                from: self.band,
                to: band,
            });
            self.band = band;
        }

        let env = self.totalizer.env();
        let reading = FlowReading {
            status,
            pulse_delta,
            tick_delta,
            ttl: env.ttl(),
            acm: env.acm(),
            rate: env.rate().rate(),
            band,
        };
        debug!(
            "Cycle {}: dp={} dt={} ttl={} acm={} rate={} {}",
            self.stats.cycles,
            pulse_delta,
            tick_delta,
            reading.ttl,
            reading.acm,
            reading.rate,
            status.name()
        );
        sink.emit(&AppEvent::Sample(reading));
        Some(reading)
    }

    /// Take the capture slot and apply its deltas.  Returns the pulse and
    /// tick deltas credited this cycle.
    fn consume_capture(&mut self, now: u64) -> (u32, u32) {
        match self.correlator.take(self.slot) {
            Sample::NoCapture => {
                // Rate window left as is: the displayed rate holds.
                self.stats.cycles_without_capture += 1;
                (0, 0)
            }
            Sample::Baseline => {
                self.stats.captures += 1;
                self.last_capture_ms = Some(now);
                (0, 0)
            }
            Sample::Window(d) => {
                self.stats.captures += 1;
                let span = self.last_capture_ms.map_or(0, |t| now.saturating_sub(t));
                self.last_capture_ms = Some(now);

                self.totalizer.pulse_add(d.pulses);
                if span >= self.reference_wrap_ms {
                    self.stats.ambiguous_windows += 1;
                    warn!(
                        "Capture window {} ms reaches reference wrap {} ms, rate held",
                        span, self.reference_wrap_ms
                    );
                } else if d.ticks == 0 {
                    self.stats.zero_tick_windows += 1;
                    warn!("Zero-tick capture window ({} pulses), rate held", d.pulses);
                } else {
                    self.totalizer.set_rate_window(d.pulses, d.ticks);
                }
                self.backup_dirty = true;
                (d.pulses, d.ticks)
            }
        }
    }

    // ── Sleep / wake ──────────────────────────────────────────

    /// Arm the capture interrupt and start measuring the sleep.
    ///
    /// Returns the sleep length to use: `requested_ms` capped by the idle
    /// limit, the time until the next cycle is due, and the reference wrap.
    /// Zero means a cycle is due or a key hold is open, and the caller
    /// should not sleep.
    pub fn prepare_sleep(&mut self, hw: &mut impl CapturePort, awake_ms: u64, requested_ms: u32) -> u32 {
        let now = self.now_ms(awake_ms);
        if self.hold.active(now) {
            return 0;
        }
        let until_due = self.gate.remaining_ms(now);
        let ms = self.sleep.bound(
            requested_ms
                .min(self.config.max_idle_sleep_ms)
                .min(until_due.min(u64::from(u32::MAX)) as u32),
        );
        if ms == 0 {
            return 0;
        }
        self.correlator.arm(hw, self.slot);
        self.sleep.enter_sleep(hw.reference_now());
        ms
    }

    /// Account for the sleep that just ended.  Returns the ticks slept.
    pub fn on_wake(&mut self, hw: &mut impl CapturePort) -> u32 {
        self.sleep.exit_sleep(hw.reference_now())
    }

    // ── Command handling ──────────────────────────────────────

    /// Validate and apply a setup command.  On `Err` nothing changed.
    pub fn handle_command(&mut self, cmd: SetupCommand, sink: &mut impl EventSink) -> Result<(), SetupError> {
        match self.apply(cmd) {
            Ok(()) => {
                self.backup_dirty = true;
                info!("Setup: {}", cmd.name());
                sink.emit(&AppEvent::SetupApplied(cmd));
                Ok(())
            }
            Err(e) => {
                warn!("Setup: {} rejected: {}", cmd.name(), e);
                sink.emit(&AppEvent::SetupRejected(e));
                Err(e)
            }
        }
    }

    fn apply(&mut self, cmd: SetupCommand) -> Result<(), SetupError> {
        let t = &mut self.totalizer;
        match cmd {
            SetupCommand::SetCalibration(value) => t.set_factor_cal(value)?,
            SetupCommand::SetVolUnit(raw) => t.set_vol_unit_index(raw)?,
            SetupCommand::SetTimeUnit(raw) => t.set_time_unit_index(raw)?,
            SetupCommand::CycleVolDecimals => {
                t.vol_pf_inc();
            }
            SetupCommand::CycleRateDecimals => {
                t.rate_pf_inc();
            }
            SetupCommand::ResetTrip => t.ttl_reset(),
            SetupCommand::ResetBatch => t.acm_reset(),
            SetupCommand::SetRateLimits { low, high } => t.set_rate_limits(low, high)?,
            SetupCommand::SetFilter(filter) => t.set_filter(filter),
            SetupCommand::SetFactorK(k) => {
                t.set_factor_k(k)?;
                t.recalculate();
            }
            SetupCommand::SetFactorRate(r) => {
                t.set_factor_r(r)?;
                t.rate_calc();
            }
            SetupCommand::FactoryReset => {
                let preset = presets::find(&self.config.sensor_model).ok_or(SetupError::UnknownSensorModel)?;
                t.replace(TotalizerEnv::from_preset(preset, self.config.reference_clock_hz));
                self.correlator.reset();
                self.last_capture_ms = None;
            }
        }
        Ok(())
    }

    /// Advance and return the ticket number for a printed report.
    pub fn issue_ticket(&mut self, sink: &mut impl EventSink) -> u16 {
        let ticket = self.totalizer.next_ticket();
        self.backup_dirty = true;
        sink.emit(&AppEvent::TicketIssued(ticket));
        ticket
    }

    // ── Backup ────────────────────────────────────────────────

    /// Rewrite the backup image if anything changed since the last sync.
    /// Returns whether a write happened.
    pub fn sync_backup(&mut self, backup: &mut impl BackupPort, sink: &mut impl EventSink) -> Result<bool, BackupError> {
        if !self.backup_dirty {
            return Ok(false);
        }
        match persistence::store(backup, self.totalizer.env(), self.reset_count) {
            Ok(()) => {
                self.backup_dirty = false;
                debug!("Backup synced");
                sink.emit(&AppEvent::BackupSynced);
                Ok(true)
            }
            Err(e) => {
                warn!("Backup sync failed: {}", e);
                sink.emit(&AppEvent::BackupFailed(e));
                Err(e)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Read-only view of the environment.
    pub fn totalizer(&self) -> &TotalizerEnv {
        self.totalizer.env()
    }

    pub fn status(&self) -> FlowStatus {
        self.status.status()
    }

    /// Whether the display's flow indicator should blink.
    pub fn indicator_blink(&self) -> bool {
        self.status.indicator_blink()
    }

    pub fn rate_band(&self) -> RateBand {
        self.band
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn source(&self) -> EnvSource {
        self.source
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    pub fn is_backup_dirty(&self) -> bool {
        self.backup_dirty
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}
