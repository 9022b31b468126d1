//! Configuration types for rgaconvert

use crate::engine::CoreMask;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Converter configuration
///
/// ```toml
/// core_mask = "rga3"           # or 3, "rga3_core0+rga2_core0", "auto"
/// passthrough_on_same_caps = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Cores the RGA may schedule work on
    pub core_mask: CoreMask,
    /// Skip the blit when input and output layouts are identical
    pub passthrough_on_same_caps: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            core_mask: CoreMask::AUTO,
            passthrough_on_same_caps: true,
        }
    }
}

impl ConvertConfig {
    pub fn with_core_mask(mut self, mask: CoreMask) -> Self {
        self.core_mask = mask;
        self
    }

    pub fn with_passthrough(mut self, enabled: bool) -> Self {
        self.passthrough_on_same_caps = enabled;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), core_mask = %config.core_mask, "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConvertConfig::default();
        assert!(config.core_mask.is_auto());
        assert!(config.passthrough_on_same_caps);
        assert_eq!(ConvertConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_mask_by_name_or_number() {
        let by_name = ConvertConfig::from_toml_str("core_mask = \"rga3\"").unwrap();
        let by_bits = ConvertConfig::from_toml_str("core_mask = 3").unwrap();
        assert_eq!(by_name.core_mask, CoreMask::RGA3);
        assert_eq!(by_name, by_bits);
    }

    #[test]
    fn test_undefined_mask_bits_rejected() {
        let err = ConvertConfig::from_toml_str("core_mask = 16").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
        assert!(ConvertConfig::from_toml_str("core_mask = \"rga9\"").is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = ConvertConfig::default()
            .with_core_mask(CoreMask::RGA3_CORE1 | CoreMask::RGA2_CORE0)
            .with_passthrough(false);
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("rga3_core1+rga2_core0"));
        assert_eq!(ConvertConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "core_mask = \"rga2\"").unwrap();
        let config = ConvertConfig::load(file.path()).unwrap();
        assert_eq!(config.core_mask, CoreMask::RGA2);

        assert!(matches!(
            ConvertConfig::load("/nonexistent/rgaconvert.toml"),
            Err(Error::Io(_))
        ));
    }
}
