use serde::{Deserialize, Serialize};

use crate::ctf::CtfSettings;
use crate::error::Result;
use crate::simulate::SimulationConfig;
use crate::validation::ValidationConfig;

/// Top-level settings, one section per concern.
///
/// ```toml
/// [ctf]
/// defoci = [-20.0, 0.0, 20.0]
/// wavelength = 0.5
///
/// [validation]
/// bin_size = { Width = 0.05 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HoloConfig {
    #[serde(default)]
    pub ctf: CtfSettings,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl HoloConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
