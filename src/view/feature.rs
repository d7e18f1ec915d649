//! List-backed features and their schema-level conventions.

use super::errors::ViewResult;
use super::filters::{parse_filter_set, DeviceFilters, Filters, ReportFilters, SecurityFilters};
use super::schema::SortDirection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A list-backed feature of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKey {
    /// Network device inventory
    Devices,
    /// Findings produced by security checks
    SecurityIssues,
    /// Generated audit reports
    Reports,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 3] = [
        FeatureKey::Devices,
        FeatureKey::SecurityIssues,
        FeatureKey::Reports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Devices => "devices",
            FeatureKey::SecurityIssues => "security-issues",
            FeatureKey::Reports => "reports",
        }
    }

    /// Sort field applied when the view mounts
    pub fn default_sort(&self) -> &'static str {
        match self {
            FeatureKey::Devices => "name",
            FeatureKey::SecurityIssues => "detectedAt",
            FeatureKey::Reports => "createdAt",
        }
    }

    pub fn default_direction(&self) -> SortDirection {
        match self {
            FeatureKey::Devices => SortDirection::Asc,
            FeatureKey::SecurityIssues | FeatureKey::Reports => SortDirection::Desc,
        }
    }

    /// Fields the backing list can be ordered by
    pub fn sortable_fields(&self) -> &'static [&'static str] {
        match self {
            FeatureKey::Devices => &["name", "type", "vendor", "status", "ipAddress", "lastSeen"],
            FeatureKey::SecurityIssues => &["detectedAt", "severity", "status", "deviceId", "checkType"],
            FeatureKey::Reports => &["createdAt", "name", "reportType", "status"],
        }
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable_fields().contains(&field)
    }

    /// Empty filter object ("no filter applied")
    pub fn default_filters(&self) -> Filters {
        match self {
            FeatureKey::Devices => Filters::Devices(DeviceFilters::default()),
            FeatureKey::SecurityIssues => Filters::SecurityIssues(SecurityFilters::default()),
            FeatureKey::Reports => Filters::Reports(ReportFilters::default()),
        }
    }

    /// Validate an untrusted filter object against this feature's shape.
    pub fn parse_filters(&self, value: &Value) -> ViewResult<Filters> {
        match self {
            FeatureKey::Devices => parse_filter_set(value).map(Filters::Devices),
            FeatureKey::SecurityIssues => parse_filter_set(value).map(Filters::SecurityIssues),
            FeatureKey::Reports => parse_filter_set(value).map(Filters::Reports),
        }
    }

    // Transient flags each feature drives

    pub fn uses_form(&self) -> bool {
        matches!(self, FeatureKey::Devices)
    }

    pub fn uses_checks(&self) -> bool {
        matches!(self, FeatureKey::SecurityIssues)
    }

    pub fn uses_generation(&self) -> bool {
        matches!(self, FeatureKey::Reports)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown feature '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sort_is_sortable() {
        for key in FeatureKey::ALL {
            assert!(key.is_sortable(key.default_sort()), "{} default sort", key);
        }
    }

    #[test]
    fn test_from_str_round_trip() {
        for key in FeatureKey::ALL {
            assert_eq!(key.as_str().parse::<FeatureKey>().unwrap(), key);
        }
        assert!("firewalls".parse::<FeatureKey>().is_err());
    }

    #[test]
    fn test_each_feature_owns_one_flag_group() {
        assert!(FeatureKey::Devices.uses_form());
        assert!(!FeatureKey::Devices.uses_checks());
        assert!(FeatureKey::SecurityIssues.uses_checks());
        assert!(FeatureKey::Reports.uses_generation());
        assert!(!FeatureKey::Reports.uses_form());
    }
}
