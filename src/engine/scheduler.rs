//! RGA core affinity

use super::RgaDriver;
use crate::error::{Error, Result};
use crate::surface::RgaSurface;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

bitflags::bitflags! {
    /// Hardware cores an operation may run on (`IM_SCHEDULER_*`)
    ///
    /// The empty mask means the driver's scheduler picks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CoreMask: u32 {
        const RGA3_CORE0 = 1 << 0;
        const RGA3_CORE1 = 1 << 1;
        const RGA2_CORE0 = 1 << 2;
        /// Both RGA3 cores
        const RGA3 = Self::RGA3_CORE0.bits() | Self::RGA3_CORE1.bits();
        /// Legacy name for the single RGA2 core
        const RGA2 = Self::RGA2_CORE0.bits();
    }
}

impl Default for CoreMask {
    fn default() -> Self {
        CoreMask::AUTO
    }
}

/// Accepted names, in display order
const MASK_NAMES: [(&str, CoreMask); 6] = [
    ("auto", CoreMask::empty()),
    ("rga3_core0", CoreMask::RGA3_CORE0),
    ("rga3_core1", CoreMask::RGA3_CORE1),
    ("rga2_core0", CoreMask::RGA2_CORE0),
    ("rga3", CoreMask::RGA3),
    ("rga2", CoreMask::RGA2),
];

impl CoreMask {
    /// Let the hardware scheduler decide
    pub const AUTO: CoreMask = CoreMask::empty();

    /// Validate a raw bit combination
    pub fn from_raw(bits: u32) -> Result<Self> {
        CoreMask::from_bits(bits).ok_or_else(|| {
            Error::Config(format!(
                "core mask {:#x} has undefined bits {:#x}",
                bits,
                bits & !CoreMask::all().bits()
            ))
        })
    }

    pub fn is_auto(&self) -> bool {
        self.is_empty()
    }

    /// Recognized names with their bit values
    pub fn names() -> impl Iterator<Item = (&'static str, CoreMask)> {
        MASK_NAMES.into_iter()
    }

    /// Look up a single name, case-insensitive, `-` or `_` separated
    fn from_alias(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        MASK_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, mask)| *mask)
    }
}

impl FromStr for CoreMask {
    type Err = Error;

    /// Parse a name, a `+`/`|` joined list of names, or raw bits
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let raw = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => s.parse::<u32>().ok(),
        };
        if let Some(bits) = raw {
            return CoreMask::from_raw(bits);
        }

        let mut mask = CoreMask::empty();
        for part in s.split(['+', '|']) {
            mask |= CoreMask::from_alias(part)
                .ok_or_else(|| Error::Config(format!("unknown core mask name {:?}", part.trim())))?;
        }
        Ok(mask)
    }
}

impl std::fmt::Display for CoreMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("auto");
        }
        let mut parts = Vec::new();
        if self.contains(CoreMask::RGA3) {
            parts.push("rga3");
        } else if self.contains(CoreMask::RGA3_CORE0) {
            parts.push("rga3_core0");
        } else if self.contains(CoreMask::RGA3_CORE1) {
            parts.push("rga3_core1");
        }
        if self.contains(CoreMask::RGA2_CORE0) {
            parts.push("rga2_core0");
        }
        f.write_str(&parts.join("+"))
    }
}

impl Serialize for CoreMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CoreMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u32),
            Name(String),
        }

        let mask = match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => CoreMask::from_raw(bits),
            Repr::Name(name) => name.parse(),
        };
        mask.map_err(serde::de::Error::custom)
    }
}

/// Holds the configured affinity and applies it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreScheduler {
    mask: CoreMask,
}

impl CoreScheduler {
    pub fn new(mask: CoreMask) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> CoreMask {
        self.mask
    }

    pub fn set_mask(&mut self, mask: CoreMask) {
        self.mask = mask;
    }

    /// Install the mask as the driver's default affinity
    ///
    /// An auto mask leaves the driver's scheduler untouched.
    pub fn configure<D: RgaDriver + ?Sized>(&self, driver: &D) -> Result<()> {
        if self.mask.is_auto() {
            return Ok(());
        }
        tracing::debug!(core_mask = %self.mask, "configuring RGA scheduler");
        driver.configure_scheduler(self.mask)
    }

    /// Pin both surfaces of one blit to the configured cores
    pub fn apply(&self, src: &mut RgaSurface, dst: &mut RgaSurface) {
        src.core = self.mask;
        dst.core = self.mask;
    }
}
