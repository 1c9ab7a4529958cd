/*
    scvx, successive convexification trajectory optimization
    Copyright (C) 2026 The scvx developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::fs::File;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use typed_builder::TypedBuilder;

use crate::propagators::IntegratorOptions;

/// Configuration of the outer SCvx loop.
///
/// The defaults reproduce a well-behaved free-final-time powered descent
/// setup: heavy virtual control penalty so the slack is only used when the
/// linearization cannot be honored, a unit flight-time trust region weight,
/// and a light state/control trust region that damps iterate oscillation
/// without slowing convergence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct ScvxConfig {
    /// Number of trajectory samples (so `k - 1` segments).
    #[builder(default = 50)]
    pub k: usize,
    /// Maximum number of outer iterations.
    #[builder(default = 15)]
    pub iterations: usize,
    /// Penalty on the norm of the virtual control slack.
    #[builder(default = 1e2)]
    pub weight_virtual_control: f64,
    /// Penalty on the flight-time trust region radius.
    #[builder(default = 1.0)]
    pub weight_trust_region_sigma: f64,
    /// Penalty on the per-sample state/control trust region radii.
    #[builder(default = 1e-3)]
    pub weight_trust_region_xu: f64,
    /// Convergence threshold on the virtual control norm.
    #[builder(default = 1e-4)]
    pub tol_virtual_control: f64,
    /// Convergence threshold on the flight-time trust region radius.
    #[builder(default = 1e-3)]
    pub tol_trust_region_sigma: f64,
    /// Options of the segment discretization integrator.
    #[builder(default)]
    pub integrator: IntegratorOptions,
}

impl Default for ScvxConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScvxConfig {
    /// Loads a configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).context(ReadSnafu {
            path: path.display().to_string(),
        })?;
        let config: Self = serde_yaml::from_reader(file).context(ParseSnafu {
            path: path.display().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k < 2 {
            return Err(ConfigError::Invalid {
                details: format!("at least 2 trajectory samples are needed, got {}", self.k),
            });
        }
        if self.iterations == 0 {
            return Err(ConfigError::Invalid {
                details: "at least one iteration is needed".to_string(),
            });
        }
        if self.weight_virtual_control <= 0.0 {
            return Err(ConfigError::Invalid {
                details: "the virtual control penalty must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("could not read configuration file {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("could not parse configuration file {path}: {source}"))]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[snafu(display("invalid configuration: {details}"))]
    Invalid { details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScvxConfig::default();
        assert_eq!(config.k, 50);
        assert_eq!(config.iterations, 15);
        config.validate().unwrap();
    }

    #[test]
    fn degenerate_sampling_rejected() {
        let config = ScvxConfig::builder().k(1).build();
        assert!(config.validate().is_err());
        let config = ScvxConfig::builder().iterations(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_roundtrip_with_partial_keys() {
        // Omitted keys fall back to the defaults.
        let yaml = "k: 30\nweight_virtual_control: 50.0\n";
        let config: ScvxConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.k, 30);
        assert_eq!(config.weight_virtual_control, 50.0);
        assert_eq!(config.iterations, 15);
    }
}
