//! Integration tests for power-up restore through battery-backed memory.

use crate::mock_hw::Rig;

use flowmeter::app::events::AppEvent;
use flowmeter::config::SystemConfig;
use flowmeter::correlator::CaptureSlot;
use flowmeter::fixed::Milli;
use flowmeter::persistence::EnvSource;

/// Run one boot with some flow, sync the image and return the region.
fn boot_with_flow() -> Vec<u8> {
    let slot = CaptureSlot::new();
    let mut rig = Rig::new();
    let mut svc = rig.start(&slot, SystemConfig::default());
    rig.poll(&mut svc);
    for pulses in [500, 500, 500] {
        rig.sleep_cycle(&mut svc, &slot, pulses);
    }
    assert_eq!(svc.totalizer().ttl(), Milli::from_raw(8_100));
    assert_eq!(svc.sync_backup(&mut rig.backup, &mut rig.sink), Ok(true));
    assert_eq!(svc.sync_backup(&mut rig.backup, &mut rig.sink), Ok(false));
    drop(svc);
    rig.into_region()
}

#[test]
fn battery_and_rtc_ok_restores_totals() {
    let region = boot_with_flow();

    let slot = CaptureSlot::new();
    let mut rig = Rig::with_backup(region, true, 2026);
    let svc = rig.start(&slot, SystemConfig::default());

    assert_eq!(svc.source(), EnvSource::Backup);
    assert_eq!(svc.reset_count(), 2);
    assert_eq!(svc.totalizer().pulse_ttl(), 1_000);
    assert_eq!(svc.totalizer().ttl(), Milli::from_raw(8_100));
    assert_eq!(svc.totalizer().rate().rate(), Milli::from_raw(4_050));
}

#[test]
fn missing_battery_falls_back_to_preset() {
    let region = boot_with_flow();

    let slot = CaptureSlot::new();
    let mut rig = Rig::with_backup(region, false, 2026);
    let svc = rig.start(&slot, SystemConfig::default());

    assert_eq!(svc.source(), EnvSource::Preset);
    assert_eq!(svc.reset_count(), 2);
    assert_eq!(svc.totalizer().pulse_ttl(), 0);
    assert_eq!(svc.totalizer().ttl(), Milli::ZERO);
}

#[test]
fn rtc_at_lost_year_falls_back_to_preset() {
    let region = boot_with_flow();

    let slot = CaptureSlot::new();
    let mut rig = Rig::with_backup(region, true, 2000);
    let svc = rig.start(&slot, SystemConfig::default());

    assert_eq!(svc.source(), EnvSource::Preset);
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::Restored { source: EnvSource::Preset, reset_count: 2 })
    ));
}

#[test]
fn reset_counter_increments_across_boots() {
    let mut region = Vec::new();
    for expected in 1..=3u32 {
        let slot = CaptureSlot::new();
        let mut rig = Rig::with_backup(region, true, 2026);
        let mut svc = rig.start(&slot, SystemConfig::default());
        assert_eq!(svc.reset_count(), expected);
        svc.sync_backup(&mut rig.backup, &mut rig.sink).unwrap();
        drop(svc);
        region = rig.into_region();
    }
}

#[test]
fn erased_region_is_first_boot_again() {
    let region = boot_with_flow();

    let slot = CaptureSlot::new();
    let mut rig = Rig::with_backup(region, true, 2026);
    rig.backup.erase();
    let svc = rig.start(&slot, SystemConfig::default());
    assert_eq!(svc.source(), EnvSource::FirstBoot);
    assert_eq!(svc.reset_count(), 1);
}
