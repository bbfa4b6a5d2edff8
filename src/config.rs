//!
//! # Engine Configuration
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::{ErrorHelper, RouteError, RouteResult};
use crate::gauge::RoutingGauge;
use crate::units::{DbUnits, UnitConfig};
use crate::Ptr;

/// Tile-density aggregation modes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DensityMode {
    /// Worst single edge
    MaxDensity,
    /// Mean of the horizontal and vertical averages
    AverageHVDensity,
    /// Horizontal average only
    AverageHDensity,
    /// Vertical average only
    AverageVDensity,
    /// Worse of the horizontal and vertical averages
    MaxHVDensity,
}
impl Default for DensityMode {
    fn default() -> DensityMode {
        DensityMode::MaxDensity
    }
}

/// # Engine Configuration
///
/// Every option is read once at engine creation. The routing gauge is shared
/// read-only, the way the rest of the tool flow shares layer tables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Standard-cell row height; sets the mesh tile pitch
    pub slice_height: DbUnits,
    /// Density above which a tile is saturated
    pub saturate_ratio: f32,
    /// Wire length above which a net is considered global
    pub global_threshold: DbUnits,
    /// Default wire end-cap extension
    pub extension_cap: DbUnits,
    /// Maximum routing layer depth to consider
    pub allowed_depth: usize,
    /// Tile-density aggregation mode
    pub density_mode: DensityMode,
    /// Distance-unit system
    pub units: UnitConfig,
    /// Shared routing gauge
    pub gauge: Ptr<RoutingGauge>,
}
impl Config {
    /// Create a [Config] over `gauge` with defaults for everything else
    pub fn new(gauge: RoutingGauge, slice_height: impl Into<DbUnits>) -> Self {
        let units = UnitConfig::default();
        Self {
            slice_height: slice_height.into(),
            saturate_ratio: 0.8,
            global_threshold: units.from_lambda(29),
            extension_cap: units.from_lambda(1),
            allowed_depth: gauge.depth().saturating_sub(1),
            density_mode: DensityMode::default(),
            units,
            gauge: Ptr::new(gauge),
        }
    }
    /// Check the configuration over, returning the first offense found.
    pub fn validate(&self) -> RouteResult<()> {
        self.assert(
            self.slice_height.raw() > 0,
            format!("non-positive slice height {}", self.slice_height.raw()),
        )?;
        let gauge = self.gauge.read()?;
        self.assert(gauge.depth() > 0, "empty routing gauge")?;
        self.assert(
            self.allowed_depth < gauge.depth(),
            format!(
                "allowed depth {} exceeds gauge depth {}",
                self.allowed_depth,
                gauge.depth()
            ),
        )?;
        Ok(())
    }
}
impl ErrorHelper for Config {
    type Error = RouteError;
    /// Failures here are configuration errors
    fn err(&self, msg: impl Into<String>) -> Self::Error {
        RouteError::Config(format!("Config: {}", msg.into()))
    }
}
