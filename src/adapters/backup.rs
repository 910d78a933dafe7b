//! Battery-backed memory adapter.
//!
//! Implements [`BackupPort`] over a fixed region that survives resets and,
//! with the backup cell fitted, main-power loss.
//!
//! - **`target_os = "espidf"`**: a `.rtc_noinit` static in RTC slow memory.
//!   The bootloader leaves it untouched across resets and light/deep sleep.
//! - **`not(target_os = "espidf")`**: a heap buffer that tests carry from
//!   one "boot" to the next with [`BackupDomain::into_region`] and
//!   [`BackupDomain::with_region`].
//!
//! The battery sense line is any `embedded-hal` input pin.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::BackupPort;
use crate::error::BackupError;

/// Size of the retained region in bytes.
pub const BACKUP_REGION_LEN: usize = 256;

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc_noinit")]
static mut BACKUP_REGION: [u8; BACKUP_REGION_LEN] = [0; BACKUP_REGION_LEN];

pub struct BackupDomain<P: InputPin> {
    battery_sense: P,
    #[cfg(not(target_os = "espidf"))]
    region: Vec<u8>,
}

impl<P: InputPin> BackupDomain<P> {
    #[cfg(target_os = "espidf")]
    pub fn new(battery_sense: P) -> Self {
        Self { battery_sense }
    }

    /// Blank region, as after the very first power-up.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(battery_sense: P) -> Self {
        Self::with_region(battery_sense, vec![0; BACKUP_REGION_LEN])
    }

    /// Region carried over from a previous boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_region(battery_sense: P, mut region: Vec<u8>) -> Self {
        region.resize(BACKUP_REGION_LEN, 0);
        Self { battery_sense, region }
    }

    /// Hand the retained bytes to the next boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn into_region(self) -> Vec<u8> {
        self.region
    }

    /// Wipe the region, as a battery change with main power off would.
    #[cfg(not(target_os = "espidf"))]
    pub fn erase(&mut self) {
        self.region.fill(0);
    }
}

impl<P: InputPin> BackupPort for BackupDomain<P> {
    fn battery_present(&mut self) -> bool {
        match self.battery_sense.is_high() {
            Ok(level) => level,
            Err(_) => {
                warn!("Backup: battery sense read failed, assuming absent");
                false
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn region(&self) -> &[u8] {
        // SAFETY: only the main task touches the region; no ISR writes it.
        unsafe { core::slice::from_raw_parts((&raw const BACKUP_REGION).cast::<u8>(), BACKUP_REGION_LEN) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn region(&self) -> &[u8] {
        &self.region
    }

    fn write(&mut self, image: &[u8]) -> Result<(), BackupError> {
        if image.len() > BACKUP_REGION_LEN {
            return Err(BackupError::RegionTooSmall {
                needed: image.len(),
                available: BACKUP_REGION_LEN,
            });
        }
        self.copy_in(image);
        Ok(())
    }
}

impl<P: InputPin> BackupDomain<P> {
    #[cfg(target_os = "espidf")]
    fn copy_in(&mut self, image: &[u8]) {
        // SAFETY: callers check the length; single writer (main task).
        unsafe {
            core::ptr::copy_nonoverlapping(image.as_ptr(), (&raw mut BACKUP_REGION).cast::<u8>(), image.len());
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn copy_in(&mut self, image: &[u8]) {
        self.region[..image.len()].copy_from_slice(image);
    }
}
