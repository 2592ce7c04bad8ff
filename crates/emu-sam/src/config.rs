//! SAM Coupé machine configuration.

use serde::{Deserialize, Serialize};

use crate::error::SamError;

/// Largest external memory pack, in megabytes.
pub const MAX_EXTERNAL_MB: u8 = 4;

/// Internal RAM fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MainMemory {
    /// 16 pages of 16K.
    Kb256,
    /// 32 pages of 16K.
    #[default]
    Kb512,
}

impl MainMemory {
    /// Number of 16K internal RAM pages.
    #[must_use]
    pub fn pages(self) -> usize {
        match self {
            Self::Kb256 => 16,
            Self::Kb512 => 32,
        }
    }
}

/// Configuration for creating a [`Sam`](crate::Sam).
///
/// The ROM image is passed separately to [`Sam::new`](crate::Sam::new); the
/// frontend owns file loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamConfig {
    pub main_memory: MainMemory,
    /// External memory in 1 MB units (0-4).
    pub external_memory_mb: u8,
    /// Drive 1 fitted.
    pub drive1: bool,
    /// Drive 2 fitted.
    pub drive2: bool,
    /// Hold off palette writes for the ASIC's start-up period.
    pub asic_startup_delay: bool,
    /// Start in turbo mode.
    pub turbo: bool,
}

impl SamConfig {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), SamError> {
        if self.external_memory_mb > MAX_EXTERNAL_MB {
            return Err(SamError::ExternalMemory(self.external_memory_mb));
        }
        Ok(())
    }
}

impl Default for SamConfig {
    fn default() -> Self {
        Self {
            main_memory: MainMemory::Kb512,
            external_memory_mb: 0,
            drive1: true,
            drive2: false,
            asic_startup_delay: true,
            turbo: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SamConfig =
            serde_json::from_str(r#"{ "main_memory": "Kb256", "drive2": true }"#)
                .expect("valid config");
        assert_eq!(config.main_memory, MainMemory::Kb256);
        assert!(config.drive1);
        assert!(config.drive2);
        assert_eq!(config.external_memory_mb, 0);
    }

    #[test]
    fn too_much_external_memory() {
        let config = SamConfig {
            external_memory_mb: 5,
            ..SamConfig::default()
        };
        assert!(matches!(config.validate(), Err(SamError::ExternalMemory(5))));
        assert!(SamConfig::default().validate().is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let config = SamConfig {
            external_memory_mb: 2,
            turbo: true,
            ..SamConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialises");
        let back: SamConfig = serde_json::from_str(&json).expect("parses");
        assert_eq!(back, config);
    }
}
