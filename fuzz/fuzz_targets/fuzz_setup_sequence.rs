//! Fuzz target: totalizer setter sequences
//!
//! Interprets the input as a stream of (opcode, argument) pairs driving the
//! totalizer's validated setters, and checks:
//! - No panics for any argument, including NaN and infinite factors
//! - A rejected setter leaves the environment unchanged
//! - Decimal-place selectors stay within range
//!
//! cargo fuzz run fuzz_setup_sequence

#![no_main]

use flowmeter::fixed::Milli;
use flowmeter::presets;
use flowmeter::totalizer::{EngineParams, Totalizer, TotalizerEnv, PF_SEL_MAX};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(preset) = presets::find("AI_25") else {
        return;
    };
    let mut t = Totalizer::new(TotalizerEnv::from_preset(preset, 32_768), EngineParams::default());

    for chunk in data.chunks_exact(5) {
        let arg = u32::from_le_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        let before = t.env().clone();
        let result = match chunk[0] % 10 {
            0 => t.set_factor_cal(arg),
            1 => t.set_vol_unit_index(arg as u8),
            2 => t.set_time_unit_index(arg as u8),
            3 => t.set_factor_k(f64::from(f32::from_bits(arg))),
            4 => t.set_factor_r(f64::from(f32::from_bits(arg))),
            5 => t.set_rate_limits(Milli::from_raw(arg & 0xFFFF), Milli::from_raw(arg >> 16)),
            6 => {
                t.pulse_add(arg);
                t.set_rate_window(arg & 0xFFF, arg >> 20);
                t.recalculate();
                Ok(())
            }
            7 => {
                t.vol_pf_inc();
                t.rate_pf_inc();
                Ok(())
            }
            8 => {
                t.ttl_reset();
                Ok(())
            }
            _ => {
                t.acm_reset();
                Ok(())
            }
        };
        if result.is_err() {
            assert_eq!(t.env(), &before, "rejected setter changed the environment");
        }
        assert!(t.env().vol_pf_sel() <= PF_SEL_MAX);
        assert!(t.env().rate().rate_pf_sel() <= PF_SEL_MAX);
    }
});
