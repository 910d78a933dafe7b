//! Fuzz target: backup-memory image decoder
//!
//! Feeds arbitrary region contents to `persistence::decode` and checks:
//! - No panics under arbitrary byte inputs
//! - Any accepted image carries the expected magic and version
//! - An accepted image re-encodes to bytes that decode to the same image
//! - An environment that passes validation yields a positive K factor
//!
//! cargo fuzz run fuzz_backup_image

#![no_main]

use flowmeter::persistence::{self, BACKUP_MAGIC, BACKUP_VERSION};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(image) = persistence::decode(data) else {
        return;
    };
    assert_eq!(image.magic, BACKUP_MAGIC);
    assert_eq!(image.version, BACKUP_VERSION);

    let bytes = persistence::encode(&image).expect("re-encode accepted image");
    let again = persistence::decode(&bytes).expect("decode re-encoded image");
    assert_eq!(again.reset_count, image.reset_count);
    assert_eq!(again.env.pulse_ttl(), image.env.pulse_ttl());
    assert_eq!(again.env.factor_cal(), image.env.factor_cal());

    if image.env.validate().is_ok() {
        let k = flowmeter::totalizer::engine::factor_k(image.env.factor_cal(), image.env.vol_unit());
        assert!(k > 0.0 && k.is_finite());
    }
});
