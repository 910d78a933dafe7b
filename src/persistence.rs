//! Backup-state persistence.
//!
//! The totalizer environment lives in battery-backed memory as a postcard
//! image.  At power-up [`restore`] picks the environment to run with:
//!
//! ```text
//!   image valid? ──no──▶ FirstBoot  (factory preset)
//!        │yes
//!   env passes validate()? ──no──▶ Corrupt  (factory preset)
//!        │yes
//!   battery present && RTC year != lost sentinel? ──no──▶ Preset
//!        │yes
//!        ▼
//!      Backup
//! ```
//!
//! There is no commit step for the user.  The service rewrites the image
//! whenever the environment changed (see
//! [`FlowService::sync_backup`](crate::app::service::FlowService::sync_backup)).

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{BackupPort, RtcPort};
use crate::config::SystemConfig;
use crate::error::{BackupError, SetupError};
use crate::presets;
use crate::totalizer::TotalizerEnv;

/// "FLOW"
pub const BACKUP_MAGIC: u32 = 0x464C_4F57;
pub const BACKUP_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupImage {
    pub magic: u32,
    pub version: u8,
    /// Power-ups seen by this image.  Starts at 1.
    pub reset_count: u32,
    pub env: TotalizerEnv,
}

/// Where the running environment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSource {
    /// Loaded from backup memory.
    Backup,
    /// Backup present but not trusted (no battery or RTC lost power).
    Preset,
    /// No valid image at all.
    FirstBoot,
    /// Image header intact but the environment breaks a setter invariant.
    Corrupt,
}

#[derive(Debug, Clone)]
pub struct Restored {
    pub env: TotalizerEnv,
    pub source: EnvSource,
    pub reset_count: u32,
}

pub fn encode(image: &BackupImage) -> Result<Vec<u8>, BackupError> {
    postcard::to_allocvec(image).map_err(|_| BackupError::Encode)
}

/// Decode and check an image.  Trailing bytes in the region are ignored.
pub fn decode(bytes: &[u8]) -> Result<BackupImage, BackupError> {
    let image: BackupImage = postcard::from_bytes(bytes).map_err(|_| BackupError::NoImage)?;
    if image.magic != BACKUP_MAGIC || image.version != BACKUP_VERSION {
        return Err(BackupError::NoImage);
    }
    Ok(image)
}

/// Choose the environment for this power-up.
///
/// Fails only when the configured sensor model has no preset and one is
/// needed.
pub fn restore(
    backup: &mut impl BackupPort,
    rtc: &mut impl RtcPort,
    config: &SystemConfig,
) -> Result<Restored, SetupError> {
    let fallback = || {
        presets::find(&config.sensor_model)
            .map(|p| TotalizerEnv::from_preset(p, config.reference_clock_hz))
            .ok_or(SetupError::UnknownSensorModel)
    };

    let image = match decode(backup.region()) {
        Ok(image) => image,
        Err(_) => {
            info!("Backup: no image, first boot with preset {}", config.sensor_model);
            return Ok(Restored {
                env: fallback()?,
                source: EnvSource::FirstBoot,
                reset_count: 1,
            });
        }
    };

    let reset_count = image.reset_count.wrapping_add(1);

    if let Err(e) = image.env.validate() {
        warn!("Backup: image rejected ({}), using preset {}", e, config.sensor_model);
        return Ok(Restored {
            env: fallback()?,
            source: EnvSource::Corrupt,
            reset_count,
        });
    }
    let battery = backup.battery_present();
    let year = rtc.now().year;

    if battery && year != config.rtc_lost_year {
        info!("Backup: restored image (reset #{})", reset_count);
        Ok(Restored {
            env: image.env,
            source: EnvSource::Backup,
            reset_count,
        })
    } else {
        warn!(
            "Backup: image not trusted (battery={}, rtc year={}), using preset {}",
            battery, year, config.sensor_model
        );
        Ok(Restored {
            env: fallback()?,
            source: EnvSource::Preset,
            reset_count,
        })
    }
}

/// Write the current environment to backup memory.
pub fn store(backup: &mut impl BackupPort, env: &TotalizerEnv, reset_count: u32) -> Result<(), BackupError> {
    let image = BackupImage {
        magic: BACKUP_MAGIC,
        version: BACKUP_VERSION,
        reset_count,
        env: env.clone(),
    };
    backup.write(&encode(&image)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::RtcDateTime;
    use crate::totalizer::{EngineParams, Totalizer};

    struct Region {
        bytes: Vec<u8>,
        battery: bool,
    }

    impl BackupPort for Region {
        fn battery_present(&mut self) -> bool {
            self.battery
        }
        fn region(&self) -> &[u8] {
            &self.bytes
        }
        fn write(&mut self, image: &[u8]) -> Result<(), BackupError> {
            if image.len() > self.bytes.len() {
                return Err(BackupError::RegionTooSmall {
                    needed: image.len(),
                    available: self.bytes.len(),
                });
            }
            self.bytes[..image.len()].copy_from_slice(image);
            Ok(())
        }
    }

    struct Clock(u16);

    impl RtcPort for Clock {
        fn now(&mut self) -> RtcDateTime {
            RtcDateTime {
                year: self.0,
                month: 1,
                day: 1,
                ..RtcDateTime::default()
            }
        }
    }

    fn blank(battery: bool) -> Region {
        Region {
            bytes: vec![0; 256],
            battery,
        }
    }

    fn used_env() -> TotalizerEnv {
        let preset = presets::find("AI_25").unwrap();
        let mut t = Totalizer::new(TotalizerEnv::from_preset(preset, 32_768), EngineParams::default());
        t.pulse_add(5_000);
        t.recalculate();
        t.into_env()
    }

    #[test]
    fn blank_region_is_first_boot() {
        let mut region = blank(true);
        let r = restore(&mut region, &mut Clock(2026), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::FirstBoot);
        assert_eq!(r.reset_count, 1);
        assert_eq!(r.env.pulse_ttl(), 0);
        assert_eq!(r.env.factor_cal(), 123_456);
    }

    #[test]
    fn first_boot_ignores_rtc_state() {
        let mut region = blank(false);
        let r = restore(&mut region, &mut Clock(2000), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::FirstBoot);
    }

    #[test]
    fn valid_image_with_battery_and_clock_is_restored() {
        let mut region = blank(true);
        store(&mut region, &used_env(), 7).unwrap();
        let r = restore(&mut region, &mut Clock(2026), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::Backup);
        assert_eq!(r.reset_count, 8);
        assert_eq!(r.env.pulse_ttl(), 5_000);
    }

    #[test]
    fn lost_rtc_year_falls_back_to_preset() {
        let mut region = blank(true);
        store(&mut region, &used_env(), 3).unwrap();
        let r = restore(&mut region, &mut Clock(2000), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::Preset);
        assert_eq!(r.env.pulse_ttl(), 0);
        assert_eq!(r.reset_count, 4);
    }

    #[test]
    fn missing_battery_falls_back_to_preset() {
        let mut region = blank(false);
        store(&mut region, &used_env(), 3).unwrap();
        let r = restore(&mut region, &mut Clock(2026), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::Preset);
    }

    #[test]
    fn unknown_model_without_image_is_an_error() {
        let mut config = SystemConfig::default();
        config.sensor_model.clear();
        let _ = config.sensor_model.push_str("XX_99");
        let mut region = blank(true);
        assert_eq!(
            restore(&mut region, &mut Clock(2026), &config).unwrap_err(),
            SetupError::UnknownSensorModel
        );
    }

    /// Re-encode `env` with some fields overwritten, bypassing the setters.
    fn tampered(env: &TotalizerEnv, edits: &[(&str, serde_json::Value)]) -> TotalizerEnv {
        let mut value = serde_json::to_value(env).unwrap();
        for (field, v) in edits {
            value[*field] = v.clone();
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn image_breaking_env_invariants_falls_back_to_preset() {
        let bad = tampered(
            &used_env(),
            &[("factor_cal", 0.into()), ("vol_pf_sel", 200.into())],
        );
        let mut region = blank(true);
        store(&mut region, &bad, 4).unwrap();

        let r = restore(&mut region, &mut Clock(2026), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::Corrupt);
        assert_eq!(r.reset_count, 5);
        assert_eq!(r.env.factor_cal(), 123_456);
        assert_eq!(r.env.vol_pf_sel(), 2);
        assert_eq!(r.env.pulse_ttl(), 0);
        assert!(r.env.factor_k() > 0.0);
    }

    #[test]
    fn image_with_inverted_limits_is_not_restored() {
        let mut rate = serde_json::to_value(used_env().rate()).unwrap();
        rate["limit_low"] = serde_json::to_value(crate::fixed::Milli::from_raw(9_000)).unwrap();
        let bad = tampered(&used_env(), &[("rate", rate)]);
        let mut region = blank(true);
        store(&mut region, &bad, 1).unwrap();

        let r = restore(&mut region, &mut Clock(2026), &SystemConfig::default()).unwrap();
        assert_eq!(r.source, EnvSource::Corrupt);
        assert_eq!(r.env.rate().limit_low(), crate::fixed::Milli::from_raw(300));
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let mut image = BackupImage {
            magic: BACKUP_MAGIC,
            version: BACKUP_VERSION,
            reset_count: 1,
            env: used_env(),
        };
        image.magic ^= 1;
        let bytes = encode(&image).unwrap();
        assert_eq!(decode(&bytes), Err(BackupError::NoImage));
    }

    #[test]
    fn newer_version_is_rejected() {
        let image = BackupImage {
            magic: BACKUP_MAGIC,
            version: BACKUP_VERSION + 1,
            reset_count: 1,
            env: used_env(),
        };
        assert_eq!(decode(&encode(&image).unwrap()), Err(BackupError::NoImage));
    }

    #[test]
    fn truncated_image_is_rejected() {
        let mut region = blank(true);
        store(&mut region, &used_env(), 1).unwrap();
        let bytes = encode(&decode(region.region()).unwrap()).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn image_larger_than_region_is_refused() {
        let mut region = Region {
            bytes: vec![0; 8],
            battery: true,
        };
        assert!(matches!(
            store(&mut region, &used_env(), 1),
            Err(BackupError::RegionTooSmall { available: 8, .. })
        ));
    }
}
