//! Kernel configuration
//!
//! Every tunable of the location and tracking kernel lives here. All sections
//! are `serde` structs with defaults, so a TOML file only needs to name the
//! values it changes:
//!
//! ```toml
//! [locator]
//! hop_cap = 16
//!
//! [tracking]
//! stop_at_outer_boundary = true
//! domain_decomposition = true
//! rank = 1
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Uniform search grid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchMeshConfig {
    /// Buckets along x, y and z
    pub dims: [usize; 3],
    /// Probe points per bucket axis when a CSG universe mesh is sampled
    pub samples_per_axis: usize,
}

impl Default for SearchMeshConfig {
    fn default() -> Self {
        Self {
            dims: [16, 16, 16],
            samples_per_axis: 3,
        }
    }
}

/// Point-location tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Maximum number of neighbour hops before the tet walk gives up
    pub hop_cap: usize,
    /// Grid used for every tetrahedral mesh
    pub tet_search: SearchMeshConfig,
    /// Grid used for CSG universes that request a search mesh
    pub universe_search: SearchMeshConfig,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            hop_cap: 10,
            tet_search: SearchMeshConfig::default(),
            universe_search: SearchMeshConfig {
                dims: [8, 8, 8],
                samples_per_axis: 3,
            },
        }
    }
}

/// Delta-tracking tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Return a surface crossing at the outer boundary instead of applying
    /// repeated boundary conditions
    pub stop_at_outer_boundary: bool,
    /// Hand particles over to the rank owning the cell they land in
    pub domain_decomposition: bool,
    /// Rank of this compute domain
    pub rank: u32,
    /// Force collisions below the minimum cross section instead of rejecting them
    pub forced_collisions: bool,
    /// Double majorant and true cross sections (sensitivity runs)
    pub sensitivity: bool,
    /// Upper bound on consecutive boundary-condition applications in one step
    pub max_boundary_iterations: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stop_at_outer_boundary: false,
            domain_decomposition: false,
            rank: 0,
            forced_collisions: false,
            sensitivity: false,
            max_boundary_iterations: 1000,
        }
    }
}

/// Complete kernel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Seed shared by all task random streams
    pub seed: u64,
    pub locator: LocatorConfig,
    pub tracking: TrackingConfig,
}

impl KernelConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&contents)
        } else {
            Err(ConfigError::UnsupportedFormat(path.display().to_string()))
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if !path.extension().is_some_and(|ext| ext == "toml") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = KernelConfig::from_toml_str(
            "seed = 7\n[locator]\nhop_cap = 4\n[tracking]\nrank = 2\n",
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.locator.hop_cap, 4);
        assert_eq!(config.locator.tet_search, SearchMeshConfig::default());
        assert_eq!(config.tracking.rank, 2);
        assert!(!config.tracking.domain_decomposition);
        assert_eq!(config.tracking.max_boundary_iterations, 1000);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = KernelConfig::default();
        config.tracking.sensitivity = true;
        config.locator.universe_search.dims = [2, 3, 4];
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(KernelConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = KernelConfig::default().save_to_file("kernel.ron").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
