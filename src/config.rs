//! Planner configuration and per-query hints.
use crate::error::KeyspaceError;
use crate::time::TimePeriod;
use serde::{Deserialize, Serialize};

/// How the storage layer treats the upper key of a scan range.
///
/// Resolved once when the planner is configured; emitted ranges are shaped
/// for the selected capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RangeEnd {
    /// `[lower, upper)`; the planner increments the upper prefix itself.
    #[default]
    Exclusive,
    /// The store accepts an inclusive upper prefix and scans every key that
    /// starts with it.
    InclusivePrefix,
}

/// Query planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Width of the time bins used by the Z3 index
    #[serde(default)]
    pub time_period: TimePeriod,

    /// Rough upper bound on the number of ranges emitted per query
    #[serde(default = "PlannerConfig::default_target_ranges")]
    pub target_ranges: usize,

    /// Maximum number of curve levels refined during range decomposition
    #[serde(default = "PlannerConfig::default_max_recurse")]
    pub max_recurse: usize,

    /// Significant bits of the curve used when decomposing ranges
    #[serde(default = "PlannerConfig::default_precision_bits")]
    pub precision_bits: u32,

    /// Reject queries without spatial or temporal predicates unless the
    /// caller opts in
    #[serde(default = "PlannerConfig::default_block_full_table_scans")]
    pub block_full_table_scans: bool,

    /// Skip residual filtering for loose bounding-box queries
    #[serde(default)]
    pub allow_approximate: bool,

    #[serde(default)]
    pub range_end: RangeEnd,

    /// Bins enumerated per interval before falling back to a single coarse
    /// bin-span range
    #[serde(default = "PlannerConfig::default_max_bins")]
    pub max_bins: usize,
}

impl PlannerConfig {
    const fn default_target_ranges() -> usize {
        2000
    }

    const fn default_max_recurse() -> usize {
        7
    }

    const fn default_precision_bits() -> u32 {
        63
    }

    const fn default_block_full_table_scans() -> bool {
        true
    }

    const fn default_max_bins() -> usize {
        520
    }

    pub fn with_time_period(mut self, period: TimePeriod) -> Self {
        self.time_period = period;
        self
    }

    pub fn with_target_ranges(mut self, target: usize) -> Self {
        assert!(target > 0, "Target ranges must be greater than zero");
        self.target_ranges = target;
        self
    }

    pub fn with_max_recurse(mut self, max_recurse: usize) -> Self {
        assert!(max_recurse > 0, "Max recurse must be greater than zero");
        self.max_recurse = max_recurse;
        self
    }

    pub fn with_precision_bits(mut self, bits: u32) -> Self {
        self.precision_bits = bits;
        self
    }

    pub fn with_block_full_table_scans(mut self, block: bool) -> Self {
        self.block_full_table_scans = block;
        self
    }

    pub fn with_allow_approximate(mut self, allow: bool) -> Self {
        if allow {
            log::warn!(
                "Approximate results enabled: loose bounding-box queries will skip residual filtering"
            );
        }
        self.allow_approximate = allow;
        self
    }

    pub fn with_range_end(mut self, range_end: RangeEnd) -> Self {
        self.range_end = range_end;
        self
    }

    pub fn with_max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = max_bins;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.target_ranges == 0 {
            return Err("Target ranges must be greater than zero".to_string());
        }
        if self.max_recurse == 0 {
            return Err("Max recurse must be greater than zero".to_string());
        }
        if !(3..=63).contains(&self.precision_bits) {
            return Err(format!(
                "Precision bits must be between 3 and 63, got {}",
                self.precision_bits
            ));
        }
        if self.max_bins == 0 {
            return Err("Max bins must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Parse and validate. Malformed JSON is a `Serialization` error, a
    /// parsed but invalid config is a `Config` error.
    pub fn from_json(json: &str) -> Result<Self, KeyspaceError> {
        let config: PlannerConfig = serde_json::from_str(json)?;
        config.validate().map_err(KeyspaceError::Config)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, KeyspaceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, KeyspaceError> {
        let config: PlannerConfig =
            toml::from_str(toml_str).map_err(|e| KeyspaceError::Config(e.to_string()))?;
        config.validate().map_err(KeyspaceError::Config)?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, KeyspaceError> {
        toml::to_string_pretty(self).map_err(|e| KeyspaceError::Config(e.to_string()))
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            time_period: TimePeriod::default(),
            target_ranges: Self::default_target_ranges(),
            max_recurse: Self::default_max_recurse(),
            precision_bits: Self::default_precision_bits(),
            block_full_table_scans: Self::default_block_full_table_scans(),
            allow_approximate: false,
            range_end: RangeEnd::default(),
            max_bins: Self::default_max_bins(),
        }
    }
}

/// Index strategies a caller can ask for explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Z3,
    FullTable,
}

/// Per-query overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHints {
    /// Opt in to a full table scan when the filter has no indexable predicate
    #[serde(default)]
    pub allow_full_scan: bool,
    /// Force a strategy instead of choosing by cost
    #[serde(default)]
    pub requested_index: Option<IndexKind>,
    /// Overrides [`PlannerConfig::target_ranges`] for this query
    #[serde(default)]
    pub target_ranges: Option<usize>,
}

impl QueryHints {
    pub fn allow_full_scan() -> Self {
        Self {
            allow_full_scan: true,
            ..Self::default()
        }
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.requested_index = Some(index);
        self
    }

    pub fn with_target_ranges(mut self, target: usize) -> Self {
        self.target_ranges = Some(target);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.time_period, TimePeriod::Week);
        assert_eq!(config.max_recurse, 7);
        assert_eq!(config.precision_bits, 63);
        assert!(config.block_full_table_scans);
        assert!(!config.allow_approximate);
        assert_eq!(config.range_end, RangeEnd::Exclusive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = PlannerConfig::default()
            .with_time_period(TimePeriod::Day)
            .with_target_ranges(32)
            .with_range_end(RangeEnd::InclusivePrefix);

        let json = config.to_json().unwrap();
        let deserialized = PlannerConfig::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config = PlannerConfig::from_json(r#"{ "time_period": "month" }"#).unwrap();
        assert_eq!(config.time_period, TimePeriod::Month);
        assert_eq!(config.target_ranges, 2000);
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            PlannerConfig::from_json(r#"{ "target_ranges": 0 }"#),
            Err(KeyspaceError::Config(_))
        ));
        assert!(matches!(
            PlannerConfig::from_json(r#"{ "precision_bits": 64 }"#),
            Err(KeyspaceError::Config(_))
        ));
        assert!(matches!(
            PlannerConfig::from_json(r#"{ "unknown": 1 }"#),
            Err(KeyspaceError::Serialization(_))
        ));
        assert!(matches!(
            PlannerConfig::from_json("{ not json"),
            Err(KeyspaceError::Serialization(_))
        ));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let config = PlannerConfig::from_toml("time_period = \"year\"\nmax_bins = 4").unwrap();
        assert_eq!(config.time_period, TimePeriod::Year);
        assert_eq!(config.max_bins, 4);
    }

    #[test]
    fn test_hints() {
        let hints = QueryHints::allow_full_scan().with_index(IndexKind::Z3);
        assert!(hints.allow_full_scan);
        assert_eq!(hints.requested_index, Some(IndexKind::Z3));
        assert_eq!(QueryHints::default().target_ranges, None);
    }
}
