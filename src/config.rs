//! Growth policy knobs for `ChainedHashMap`.

use crate::error::MapError;

pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.75;
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.0;
pub const DEFAULT_MIN_BUCKETS: usize = 16;

/// Load/growth settings. Construct with `MapConfig::default()` and adjust
/// with the chained setters; `ChainedHashMap::with_config` validates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapConfig {
    pub(crate) max_load_factor: f64,
    pub(crate) growth_factor: f64,
    pub(crate) min_buckets: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            min_buckets: DEFAULT_MIN_BUCKETS,
        }
    }
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_load_factor(mut self, factor: f64) -> Self {
        self.max_load_factor = factor;
        self
    }

    /// Multiplier applied to the current bucket count on automatic growth.
    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Bucket count used by the first automatic growth. Zero is bumped to one.
    pub fn min_buckets(mut self, buckets: usize) -> Self {
        self.min_buckets = buckets.max(1);
        self
    }

    pub fn get_max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    pub fn get_growth_factor(&self) -> f64 {
        self.growth_factor
    }

    pub fn get_min_buckets(&self) -> usize {
        self.min_buckets
    }

    pub fn validate(&self) -> Result<(), MapError> {
        check_load_factor(self.max_load_factor)?;
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(MapError::InvalidGrowthFactor(self.growth_factor));
        }
        Ok(())
    }
}

pub(crate) fn check_load_factor(factor: f64) -> Result<(), MapError> {
    if factor.is_finite() && factor > 0.0 {
        Ok(())
    } else {
        Err(MapError::InvalidLoadFactor(factor))
    }
}

/// Smallest bucket count that keeps `len / buckets <= max_load_factor`.
pub(crate) fn buckets_for(len: usize, max_load_factor: f64) -> usize {
    (len as f64 / max_load_factor).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let c = MapConfig::default();
        assert_eq!(c.get_max_load_factor(), 0.75);
        assert_eq!(c.get_growth_factor(), 2.0);
        assert_eq!(c.get_min_buckets(), 16);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_factors() {
        for f in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            assert!(
                MapConfig::new().max_load_factor(f).validate().is_err(),
                "load factor {f} must be rejected"
            );
        }
        assert!(matches!(
            MapConfig::new().growth_factor(1.0).validate(),
            Err(MapError::InvalidGrowthFactor(_))
        ));
    }

    #[test]
    fn min_buckets_never_zero() {
        assert_eq!(MapConfig::new().min_buckets(0).get_min_buckets(), 1);
    }

    #[test]
    fn buckets_for_rounds_up() {
        assert_eq!(buckets_for(0, 0.75), 0);
        assert_eq!(buckets_for(12, 0.75), 16);
        assert_eq!(buckets_for(13, 0.75), 18);
        assert_eq!(buckets_for(3, 2.0), 2);
    }
}
