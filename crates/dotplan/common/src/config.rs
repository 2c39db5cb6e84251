// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Planner configuration.
//!
//! Configuration is plain serde data so it can live next to the rest of the
//! engine settings in a JSON file. Every field has a default, so a partial
//! document only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Run the restriction normalization pass before device determination.
    pub normalize_restrictions: bool,
    /// Upper bound on the number of disjuncts a DNF expansion may produce.
    /// Predicates that would exceed it are kept whole as residual restrictions.
    pub max_disjuncts: usize,
    pub cost: CostConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            normalize_restrictions: true,
            max_disjuncts: 32,
            cost: CostConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading planner configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_disjuncts == 0 {
            return Err(ConfigError::Invalid("max_disjuncts must be at least 1".to_string()));
        }
        self.cost.validate()
    }
}

/// Constants of the access path cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub cpu_cost_per_row: f64,
    pub io_cost_per_page: f64,
    pub rows_per_page: u64,
    /// Fraction of rows assumed to survive one equality term.
    pub equality_selectivity: f64,
    /// Fraction of rows assumed to survive one range term.
    pub range_selectivity: f64,
    /// Row count used for tables the catalog has no statistics for.
    pub default_row_count: u64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            cpu_cost_per_row: 0.01,
            io_cost_per_page: 1.0,
            rows_per_page: 100,
            equality_selectivity: 0.1,
            range_selectivity: 0.3,
            default_row_count: 1000,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows_per_page == 0 {
            return Err(ConfigError::Invalid("rows_per_page must be at least 1".to_string()));
        }
        for (name, selectivity) in [("equality_selectivity", self.equality_selectivity), ("range_selectivity", self.range_selectivity)] {
            if !(selectivity > 0.0 && selectivity <= 1.0) {
                return Err(ConfigError::Invalid(format!("{name} must be in (0, 1], got {selectivity}")));
            }
        }
        if self.cpu_cost_per_row < 0.0 || self.io_cost_per_page < 0.0 {
            return Err(ConfigError::Invalid("cost factors must not be negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_disjuncts, 32);
        assert!(config.normalize_restrictions);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlannerConfig::from_json_str(r#"{ "max_disjuncts": 4, "cost": { "rows_per_page": 50 } }"#).unwrap();
        assert_eq!(config.max_disjuncts, 4);
        assert_eq!(config.cost.rows_per_page, 50);
        assert_eq!(config.cost.equality_selectivity, 0.1);
        assert!(config.normalize_restrictions);
    }

    #[test]
    fn test_zero_disjunct_bound_is_rejected() {
        let result = PlannerConfig::from_json_str(r#"{ "max_disjuncts": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_selectivity_is_rejected() {
        let result = PlannerConfig::from_json_str(r#"{ "cost": { "range_selectivity": 1.5 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let result = PlannerConfig::from_json_str("{ max_disjuncts: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "normalize_restrictions": false }}"#).unwrap();

        let config = PlannerConfig::from_file(file.path()).unwrap();
        assert!(!config.normalize_restrictions);
        assert_eq!(config.max_disjuncts, 32);
    }
}
