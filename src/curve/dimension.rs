/// Maps a continuous range onto `2^precision` integer bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedDimension {
    min: f64,
    max: f64,
    max_index: u32,
    normalizer: f64,
    denormalizer: f64,
}

impl NormalizedDimension {
    pub fn new(min: f64, max: f64, precision: u32) -> Self {
        let bins = (1u64 << precision) as f64;
        Self {
            min,
            max,
            max_index: ((1u64 << precision) - 1) as u32,
            normalizer: bins / (max - min),
            denormalizer: (max - min) / bins,
        }
    }

    pub fn lon(precision: u32) -> Self {
        Self::new(-180.0, 180.0, precision)
    }

    pub fn lat(precision: u32) -> Self {
        Self::new(-90.0, 90.0, precision)
    }

    pub fn time(max_offset: i64, precision: u32) -> Self {
        Self::new(0.0, max_offset as f64, precision)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// Bin containing `x`; values outside the range clamp to the end bins.
    pub fn normalize(&self, x: f64) -> u32 {
        if x >= self.max {
            self.max_index
        } else if x <= self.min {
            0
        } else {
            (((x - self.min) * self.normalizer).floor() as u32).min(self.max_index)
        }
    }

    /// Centre of bin `i`.
    pub fn denormalize(&self, i: u32) -> f64 {
        let i = i.min(self.max_index);
        self.min + (i as f64 + 0.5) * self.denormalizer
    }

    /// Width of one bin.
    pub fn resolution(&self) -> f64 {
        self.denormalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ends() {
        let lon = NormalizedDimension::lon(21);
        assert_eq!(lon.normalize(-180.0), 0);
        assert_eq!(lon.normalize(180.0), lon.max_index());
        assert_eq!(lon.normalize(500.0), lon.max_index());
        assert_eq!(lon.normalize(0.0), 1 << 20);
    }

    #[test]
    fn test_denormalize_is_within_a_bin() {
        let lat = NormalizedDimension::lat(21);
        for x in [-90.0, -45.3, 0.0, 12.345678, 89.99999, 90.0] {
            let back = lat.denormalize(lat.normalize(x));
            assert!((back - x).abs() <= lat.resolution(), "{} -> {}", x, back);
        }
    }
}
