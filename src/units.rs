//!
//! # Distance Units
//!
//! Fixed-point integer coordinates with configurable precision,
//! plus conversions to and from the symbolic (lambda) and grid unit systems.
//!

// Crates.io
use derive_more::{Add, AddAssign, DivAssign, From, MulAssign, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::{RouteError, RouteResult};

/// # Location Integer Type-Alias
///
/// Many internal fields are conceptually unsigned integers, but also undergo lots of math.
/// Rather than converting at each call-site, most are converted to [Int] and value-checked at creation time.
///
/// Unsigned integers ([usize]) are generally used for indices, such as where the [Index] trait accepts them.
pub type Int = i64;

/// A Scalar Value in Database Units
#[derive(
    From,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    MulAssign,
    DivAssign,
    Neg,
    Sum,
    Debug,
    Default,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub struct DbUnits(pub Int);
impl DbUnits {
    /// Every so often we need the raw number, fine. Use sparingly.
    #[inline(always)]
    pub fn raw(&self) -> Int {
        self.0
    }
}
impl std::ops::Div<DbUnits> for DbUnits {
    type Output = Int;
    fn div(self, rhs: DbUnits) -> Self::Output {
        self.raw() / rhs.raw()
    }
}
impl std::ops::Div<Int> for DbUnits {
    type Output = Self;
    fn div(self, rhs: Int) -> Self::Output {
        Self(self.raw() / rhs)
    }
}
impl std::ops::Rem<DbUnits> for DbUnits {
    type Output = Int;
    fn rem(self, rhs: DbUnits) -> Self::Output {
        self.raw().rem(rhs.raw())
    }
}
impl std::ops::Mul<Int> for DbUnits {
    type Output = Self;
    fn mul(self, rhs: Int) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Maximum supported decimal precision
pub const MAX_PRECISION: u32 = 3;

/// String rendering modes for unit-valued quantities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StringMode {
    /// Raw database units
    Db,
    /// Founder (grid) units
    Grid,
    /// Symbolic (lambda) units
    Symbolic,
}
impl Default for StringMode {
    fn default() -> StringMode {
        StringMode::Symbolic
    }
}

/// # Unit System Configuration
///
/// Ties the fixed-point [DbUnits] to the physical and symbolic unit systems.
/// `resolution` micrometers per unit (when `physicals_per_grid` is one) is derived
/// from `precision`; a lambda is `grids_per_lambda` grid steps.
///
/// Owned by the engine configuration rather than a process-wide singleton;
/// values must not change once unit-valued state has been built from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Decimal digits of sub-micrometer precision, at most [MAX_PRECISION]
    precision: u32,
    /// Grid steps per lambda; an even positive integer
    grids_per_lambda: Int,
    /// Physical micrometers per grid step
    physicals_per_grid: f64,
    /// Rendering mode for [UnitConfig::value_string]
    pub string_mode: StringMode,
}
impl Default for UnitConfig {
    fn default() -> UnitConfig {
        UnitConfig {
            precision: 1,
            grids_per_lambda: 10,
            physicals_per_grid: 1.0,
            string_mode: StringMode::default(),
        }
    }
}
impl UnitConfig {
    /// Create a new [UnitConfig], validating `precision` and `grids_per_lambda`
    pub fn new(precision: u32, grids_per_lambda: Int, physicals_per_grid: f64) -> RouteResult<Self> {
        if precision > MAX_PRECISION {
            return Err(RouteError::config(format!(
                "UnitConfig: precision {} exceeds maximal precision {}",
                precision, MAX_PRECISION
            )));
        }
        if grids_per_lambda <= 0 || grids_per_lambda % 2 != 0 {
            return Err(RouteError::config(format!(
                "UnitConfig: grids_per_lambda ({}) must be an even positive integer",
                grids_per_lambda
            )));
        }
        Ok(Self {
            precision,
            grids_per_lambda,
            physicals_per_grid,
            string_mode: StringMode::default(),
        })
    }
    pub fn precision(&self) -> u32 {
        self.precision
    }
    /// Physical micrometers per database unit, `10^-precision`
    pub fn resolution(&self) -> f64 {
        let mut res = 1.0;
        for _ in 0..self.precision {
            res /= 10.0;
        }
        res
    }
    pub fn grids_per_lambda(&self) -> Int {
        self.grids_per_lambda
    }
    pub fn physicals_per_grid(&self) -> f64 {
        self.physicals_per_grid
    }
    /// Database units per grid step
    fn units_per_grid(&self) -> Int {
        let mut scale = 1;
        for _ in 0..self.precision {
            scale *= 10;
        }
        scale
    }
    /// Convert a grid-unit count to [DbUnits]
    pub fn from_grid(&self, grid: Int) -> DbUnits {
        DbUnits(grid * self.units_per_grid())
    }
    /// Convert a lambda count to [DbUnits]
    pub fn from_lambda(&self, lambda: Int) -> DbUnits {
        self.from_grid(lambda * self.grids_per_lambda)
    }
    /// Express `u` in grid units
    pub fn to_grid(&self, u: DbUnits) -> f64 {
        u.raw() as f64 / self.units_per_grid() as f64
    }
    /// Express `u` in lambda
    pub fn to_lambda(&self, u: DbUnits) -> f64 {
        self.to_grid(u) / self.grids_per_lambda as f64
    }
    /// Express `u` in physical micrometers
    pub fn to_physical(&self, u: DbUnits) -> f64 {
        self.to_grid(u) * self.physicals_per_grid
    }
    /// Render `u` per the configured [StringMode], with a one-letter unit suffix.
    /// Trailing zeroes and periods are trimmed, so one lambda renders as `"1l"`, not `"1.0l"`.
    pub fn value_string(&self, u: DbUnits) -> String {
        let (body, suffix) = match self.string_mode {
            StringMode::Grid => {
                if u.raw() == 0 {
                    return "0g".to_string();
                }
                (format!("{:.1}", self.to_grid(u)), 'g')
            }
            StringMode::Symbolic => {
                if u.raw() == 0 {
                    return "0l".to_string();
                }
                (format!("{:.1}", self.to_lambda(u)), 'l')
            }
            StringMode::Db => {
                if u.raw() == 0 {
                    return "0u".to_string();
                }
                (format!("{}", u.raw()), 'u')
            }
        };
        let trimmed = body.trim_end_matches('0').trim_end_matches('.');
        format!("{}{}", trimmed, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions() -> RouteResult<()> {
        let units = UnitConfig::new(1, 10, 1.0)?;
        assert_eq!(units.from_grid(1), DbUnits(10));
        assert_eq!(units.from_lambda(1), DbUnits(100));
        assert_eq!(units.to_grid(DbUnits(25)), 2.5);
        assert_eq!(units.to_lambda(DbUnits(250)), 2.5);
        Ok(())
    }
    #[test]
    fn invalid_configs() {
        assert!(UnitConfig::new(4, 10, 1.0).is_err());
        assert!(UnitConfig::new(1, 5, 1.0).is_err());
        assert!(UnitConfig::new(1, -10, 1.0).is_err());
    }
    #[test]
    fn value_strings() -> RouteResult<()> {
        let mut units = UnitConfig::new(1, 10, 1.0)?;
        assert_eq!(units.value_string(DbUnits(0)), "0l");
        assert_eq!(units.value_string(DbUnits(250)), "2.5l");
        assert_eq!(units.value_string(DbUnits(100)), "1l");
        units.string_mode = StringMode::Grid;
        assert_eq!(units.value_string(DbUnits(25)), "2.5g");
        units.string_mode = StringMode::Db;
        assert_eq!(units.value_string(DbUnits(25)), "25u");
        Ok(())
    }
}
