//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use flowmeter::correlator::{correlate, CaptureSnapshot};
use flowmeter::fixed::Milli;
use flowmeter::flow_status::{FlowStatus, FlowStatusMachine};
use flowmeter::persistence;
use flowmeter::presets;
use flowmeter::totalizer::{EngineParams, Totalizer, TotalizerEnv, FACTOR_CAL_MAX, FACTOR_CAL_MIN};
use flowmeter::units::{TimeUnit, VolUnit};
use proptest::prelude::*;

fn ai25() -> Totalizer {
    let preset = presets::find("AI_25").expect("AI_25 preset");
    Totalizer::new(TotalizerEnv::from_preset(preset, 32_768), EngineParams::default())
}

// ── Accumulation ──────────────────────────────────────────────

proptest! {
    /// Both pulse counters advance by exactly the delta, and the derived
    /// volumes never decrease.
    #[test]
    fn volumes_are_monotonic(
        deltas in proptest::collection::vec(0u32..=100_000, 1..=50),
    ) {
        let mut t = ai25();
        let mut prev = (Milli::ZERO, Milli::ZERO);
        for d in deltas {
            let (acm0, ttl0) = (t.env().pulse_acm(), t.env().pulse_ttl());
            t.pulse_add(d);
            prop_assert_eq!(t.env().pulse_acm() - acm0, u64::from(d));
            prop_assert_eq!(t.env().pulse_ttl() - ttl0, u64::from(d));
            t.recalculate();
            let now = (t.env().ttl(), t.env().acm());
            prop_assert!(now.0 >= prev.0, "ttl went backwards");
            prop_assert!(now.1 >= prev.1, "acm went backwards");
            prev = now;
        }
    }

    /// Resetting one accumulator never touches the other.
    #[test]
    fn trip_and_batch_reset_independently(
        before in 0u32..=1_000_000,
        after in 0u32..=1_000_000,
        reset_trip in any::<bool>(),
    ) {
        let mut t = ai25();
        t.pulse_add(before);
        t.recalculate();
        if reset_trip { t.ttl_reset() } else { t.acm_reset() }
        t.pulse_add(after);
        t.recalculate();

        let (zeroed, kept) = if reset_trip {
            (t.env().pulse_ttl(), t.env().pulse_acm())
        } else {
            (t.env().pulse_acm(), t.env().pulse_ttl())
        };
        prop_assert_eq!(zeroed, u64::from(after));
        prop_assert_eq!(kept, u64::from(before) + u64::from(after));
    }
}

// ── Validated setters ─────────────────────────────────────────

proptest! {
    /// A calibration outside the window is rejected and changes nothing;
    /// inside it is always accepted.
    #[test]
    fn calibration_setter_is_bounded(value in any::<u32>()) {
        let mut t = ai25();
        t.pulse_add(12_345);
        t.recalculate();
        let before = t.env().clone();

        let result = t.set_factor_cal(value);
        if (FACTOR_CAL_MIN..=FACTOR_CAL_MAX).contains(&value) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(t.env().factor_cal(), value);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(t.env(), &before);
        }
    }

    /// Setting a volume unit reads back the same unit; an invalid selector
    /// keeps the previous one.
    #[test]
    fn vol_unit_setter_round_trip(first in 0u8..6, raw in any::<u8>()) {
        let mut t = ai25();
        t.set_vol_unit_index(first).unwrap();
        let set = VolUnit::try_from(first).unwrap();
        prop_assert_eq!(t.env().vol_unit(), set);

        match t.set_vol_unit_index(raw) {
            Ok(()) => prop_assert_eq!(t.env().vol_unit().index(), raw),
            Err(_) => prop_assert_eq!(t.env().vol_unit(), set),
        }
    }

    /// Raw unit selectors are accepted exactly for the known units.
    #[test]
    fn unit_selectors_round_trip(raw in any::<u8>()) {
        match VolUnit::try_from(raw) {
            Ok(unit) => prop_assert_eq!(unit.index(), raw),
            Err(_) => prop_assert!(usize::from(raw) >= VolUnit::COUNT),
        }
        match TimeUnit::try_from(raw) {
            Ok(unit) => prop_assert_eq!(unit.index(), raw),
            Err(_) => prop_assert!(usize::from(raw) >= TimeUnit::COUNT),
        }
    }
}

// ── Correlation ───────────────────────────────────────────────

proptest! {
    /// Any true delta below the counter width is recovered across a wrap.
    #[test]
    fn correlate_recovers_delta_across_wrap(
        start_pulses in any::<u32>(),
        start_ticks in any::<u32>(),
        dp in any::<u32>(),
        dt in 0u32..=0xFFFF,
    ) {
        let old = CaptureSnapshot { pulses: start_pulses, ticks: start_ticks & 0xFFFF };
        let new = CaptureSnapshot {
            pulses: start_pulses.wrapping_add(dp),
            ticks: start_ticks.wrapping_add(dt) & 0xFFFF,
        };
        let d = correlate(old, new, u32::MAX, 0xFFFF);
        prop_assert_eq!(d.pulses, dp);
        prop_assert_eq!(d.ticks, dt);
    }
}

// ── Flow status ───────────────────────────────────────────────

proptest! {
    /// The indicator blinks exactly in the flowing statuses, and a status
    /// is only reached from one of its allowed predecessors.
    #[test]
    fn flow_status_transitions_are_legal(
        observed in proptest::collection::vec(any::<bool>(), 1..=64),
    ) {
        let mut fsm = FlowStatusMachine::new();
        let mut prev = fsm.status();
        for pulses in observed {
            let next = fsm.update(pulses);
            let legal = match (prev, next) {
                (FlowStatus::Off, s) => s == if pulses { FlowStatus::Started } else { FlowStatus::Off },
                (FlowStatus::Started, s) => s == if pulses { FlowStatus::On } else { FlowStatus::Stopped },
                (FlowStatus::On, s) => s == if pulses { FlowStatus::On } else { FlowStatus::Stopped },
                (FlowStatus::Stopped, s) => s == if pulses { FlowStatus::Started } else { FlowStatus::Off },
            };
            prop_assert!(legal, "{:?} -> {:?} on pulses={}", prev, next, pulses);
            prop_assert_eq!(
                fsm.indicator_blink(),
                matches!(next, FlowStatus::Started | FlowStatus::On)
            );
            prev = next;
        }
    }
}

// ── Backup image ──────────────────────────────────────────────

proptest! {
    /// Arbitrary region contents never panic the decoder.
    #[test]
    fn backup_decode_never_panics(
        bytes in proptest::collection::vec(any::<u8>(), 0..=256),
    ) {
        let _ = persistence::decode(&bytes);
    }
}
