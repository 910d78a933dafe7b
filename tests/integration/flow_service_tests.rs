//! Integration tests for the FlowService → correlator → totalizer → FSM
//! pipeline, driven through simulated sleep/wake cycles.

use crate::mock_hw::Rig;

use flowmeter::app::events::AppEvent;
use flowmeter::config::SystemConfig;
use flowmeter::correlator::CaptureSlot;
use flowmeter::events::{Event, EventQueue, WakeSummary};
use flowmeter::fixed::Milli;
use flowmeter::flow_status::FlowStatus;
use flowmeter::persistence::EnvSource;
use flowmeter::totalizer::RateBand;

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn first_boot_uses_preset_and_emits_restored() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let svc = rig.start(&slot, SystemConfig::default());

    assert_eq!(svc.source(), EnvSource::FirstBoot);
    assert_eq!(svc.reset_count(), 1);
    assert_eq!(svc.status(), FlowStatus::Off);
    assert_eq!(svc.totalizer().factor_cal(), 123_456);
    assert!(svc.is_backup_dirty());
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::Restored { source: EnvSource::FirstBoot, reset_count: 1 })
    ));
}

// ── Full flow cycle ───────────────────────────────────────────

#[test]
fn ai25_flow_start_stop_and_late_window() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());

    // Nothing armed yet: the first cycle sees no capture.
    let r = rig.poll(&mut svc).expect("first poll is due");
    assert_eq!(r.status, FlowStatus::Off);
    assert_eq!(r.pulse_delta, 0);

    // First capture only sets the baseline.
    let r = rig.sleep_cycle(&mut svc, &slot, 500);
    assert_eq!((r.status, r.pulse_delta), (FlowStatus::Off, 0));

    let r = rig.sleep_cycle(&mut svc, &slot, 500);
    assert_eq!(r.status, FlowStatus::Started);
    assert_eq!((r.pulse_delta, r.tick_delta), (500, 32_768));
    assert_eq!(r.ttl, Milli::from_raw(4_050));
    assert_eq!(r.acm, Milli::from_raw(4_050));
    assert_eq!(r.rate, Milli::from_raw(4_050));
    assert_eq!(r.band, RateBand::Above);
    assert!(svc.indicator_blink());

    let r = rig.sleep_cycle(&mut svc, &slot, 500);
    assert_eq!(r.status, FlowStatus::On);
    assert_eq!(r.ttl, Milli::from_raw(8_100));

    // The 250 edges land after this capture; they are credited later.
    let r = rig.sleep_cycle(&mut svc, &slot, 250);
    assert_eq!(r.status, FlowStatus::On);
    assert_eq!(r.pulse_delta, 500);
    assert_eq!(r.ttl, Milli::from_raw(12_150));

    // Flow stops: no capture, rate held.
    let r = rig.sleep_cycle(&mut svc, &slot, 0);
    assert_eq!(r.status, FlowStatus::Stopped);
    assert_eq!(r.rate, Milli::from_raw(4_050));
    assert!(!svc.indicator_blink());

    let r = rig.sleep_cycle(&mut svc, &slot, 0);
    assert_eq!(r.status, FlowStatus::Off);

    // Three seconds since the last capture: the 16-bit tick delta aliases
    // to one second, so pulses count but the rate window is not trusted.
    let r = rig.sleep_cycle(&mut svc, &slot, 500);
    assert_eq!(r.status, FlowStatus::Started);
    assert_eq!(r.pulse_delta, 250);
    assert_eq!(r.tick_delta, 32_768);
    assert_eq!(r.ttl, Milli::from_raw(14_175));
    assert_eq!(r.rate, Milli::from_raw(4_050));
    assert_eq!(svc.stats().ambiguous_windows, 1);
    assert_eq!(svc.totalizer().pulse_ttl(), 1_750);

    let recorded: Vec<_> = rig.journal.entries().map(|e| e.status).collect();
    assert_eq!(
        recorded,
        vec![FlowStatus::Started, FlowStatus::Stopped, FlowStatus::Started]
    );
}

#[test]
fn status_changes_are_emitted_once_each() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);
    for pulses in [100, 100, 100, 0, 0] {
        rig.sleep_cycle(&mut svc, &slot, pulses);
    }

    let changes: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StatusChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            (FlowStatus::Off, FlowStatus::Started),
            (FlowStatus::Started, FlowStatus::On),
            (FlowStatus::On, FlowStatus::Stopped),
            (FlowStatus::Stopped, FlowStatus::Off),
        ]
    );
}

#[test]
fn rate_band_change_is_reported_both_ways() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);
    for pulses in [500, 500, 250, 250] {
        rig.sleep_cycle(&mut svc, &slot, pulses);
    }

    assert_eq!(svc.totalizer().rate().rate(), Milli::from_raw(2_025));
    assert_eq!(svc.rate_band(), RateBand::Nominal);
    let bands: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RateBandChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(bands, vec![RateBand::Above, RateBand::Nominal]);
}

// ── Gate and sleep ────────────────────────────────────────────

#[test]
fn gate_skips_early_wakeups() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());

    assert!(rig.poll(&mut svc).is_some());
    rig.awake_ms = 400;
    assert!(rig.poll(&mut svc).is_none());
    rig.awake_ms = 999;
    assert!(rig.poll(&mut svc).is_none());
    rig.awake_ms = 1_000;
    assert!(rig.poll(&mut svc).is_some());

    let stats = svc.stats();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.gate_skips, 2);
}

#[test]
fn no_sleep_while_a_cycle_is_due() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());

    assert_eq!(svc.prepare_sleep(&mut rig.hw, 0, 1_000), 0);
    assert!(!rig.hw.irq_enabled());
}

#[test]
fn sleep_is_capped_by_next_due_cycle() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let config = SystemConfig {
        sample_interval_ms: 1_500,
        max_idle_sleep_ms: 5_000,
        ..SystemConfig::default()
    };
    let mut svc = rig.start(&slot, config);
    rig.poll(&mut svc);

    rig.awake_ms = 200;
    let ms = svc.prepare_sleep(&mut rig.hw, rig.awake_ms, 60_000);
    assert_eq!(ms, 1_300);
    assert!(ms <= svc.config().max_sleep_ms());
    assert!(rig.hw.irq_enabled());
}

#[test]
fn slept_ticks_advance_scheduler_time() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);

    svc.prepare_sleep(&mut rig.hw, 0, 1_000);
    rig.hw.advance(16_384);
    assert_eq!(svc.on_wake(&mut rig.hw), 16_384);
    assert_eq!(svc.now_ms(0), 500);
}

#[test]
fn idle_cycles_hold_rate_and_count_no_capture() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);
    rig.sleep_cycle(&mut svc, &slot, 200);
    rig.sleep_cycle(&mut svc, &slot, 200);
    let rate = svc.totalizer().rate().rate();
    assert_ne!(rate, Milli::ZERO);

    for _ in 0..3 {
        let r = rig.sleep_cycle(&mut svc, &slot, 0);
        assert_eq!(r.rate, rate);
        assert_eq!(r.pulse_delta, 0);
    }
    // Initial poll plus three idle wakes.
    assert_eq!(svc.stats().cycles_without_capture, 4);
}

#[test]
fn key_wake_holds_cpu_awake_then_releases() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);

    let queue = EventQueue::new();
    queue.push(Event::DisplayRefresh);
    queue.push(Event::KeyPressed);
    queue.push(Event::DisplayRefresh);
    rig.awake_ms = 100;
    svc.note_wakes(&WakeSummary::collect(&queue), rig.awake_ms);

    // Cycles keep running during the hold, but the CPU never sleeps.
    rig.awake_ms = 4_000;
    assert!(rig.poll(&mut svc).is_some());
    assert_eq!(svc.prepare_sleep(&mut rig.hw, rig.awake_ms, 1_000), 0);
    assert!(!rig.hw.irq_enabled());

    // Hold ends at 100 + 5000 ms.
    rig.awake_ms = 5_100;
    assert!(rig.poll(&mut svc).is_some());
    assert_eq!(svc.prepare_sleep(&mut rig.hw, rig.awake_ms, 1_000), 1_000);
    assert!(rig.hw.irq_enabled());

    let stats = svc.stats();
    assert_eq!((stats.capture_wakes, stats.key_wakes, stats.refresh_wakes), (0, 1, 2));
}

#[test]
fn wakes_without_keys_do_not_hold() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);

    let wakes = WakeSummary {
        captures: 1,
        refreshes: 3,
        ..WakeSummary::default()
    };
    svc.note_wakes(&wakes, 0);
    assert_eq!(svc.prepare_sleep(&mut rig.hw, 0, 1_000), 1_000);
    assert_eq!(svc.stats().capture_wakes, 1);
}

// ── Tickets ───────────────────────────────────────────────────

#[test]
fn ticket_numbers_advance_and_mark_backup_dirty() {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    svc.sync_backup(&mut rig.backup, &mut rig.sink).unwrap();
    assert!(!svc.is_backup_dirty());

    assert_eq!(svc.issue_ticket(&mut rig.sink), 1);
    assert_eq!(svc.issue_ticket(&mut rig.sink), 2);
    assert!(svc.is_backup_dirty());
    assert!(matches!(rig.sink.last(), Some(AppEvent::TicketIssued(2))));
}
