//! Per-feature filter shapes.
//!
//! Every filter field is optional: an absent field means no filter is
//! applied on that column. Unknown fields are rejected so that a stale or
//! mistyped key never silently widens a query.

use super::errors::{FieldError, ValidationError, ViewResult};
use super::feature::FeatureKey;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed filter object paired with its own validation rules.
pub trait FilterSet: Serialize + DeserializeOwned + Default + Clone + PartialEq {
    /// JSON keys this filter set recognizes
    const FIELDS: &'static [&'static str];

    /// Semantic checks that go beyond the field types
    fn check(&self) -> Vec<FieldError> {
        Vec::new()
    }

    /// Collapse "all" selections (empty strings, empty lists) into "no filter"
    fn normalized(self) -> Self {
        self
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse and validate an untrusted filter object.
///
/// Field-level type errors are reported per key, so each key is
/// deserialized on its own before the whole object is assembled.
pub fn parse_filter_set<F: FilterSet>(value: &Value) -> ViewResult<F> {
    let map = match value {
        Value::Null => return Ok(F::default()),
        Value::Object(map) => map,
        _ => return Err(ValidationError::single("", "must be an object")),
    };

    let mut errors = Vec::new();
    for (key, field) in map {
        if !F::FIELDS.contains(&key.as_str()) {
            errors.push(FieldError::new(key.as_str(), "unknown filter field"));
            continue;
        }
        let mut single = Map::new();
        single.insert(key.clone(), field.clone());
        if let Err(e) = serde_json::from_value::<F>(Value::Object(single)) {
            errors.push(FieldError::new(key.as_str(), e.to_string()));
        }
    }
    if let Some(err) = ValidationError::from_errors(errors) {
        return Err(err);
    }

    let filters = serde_json::from_value::<F>(value.clone())
        .map_err(|e| ValidationError::single("", e.to_string()))?
        .normalized();

    match ValidationError::from_errors(filters.check()) {
        Some(err) => Err(err),
        None => Ok(filters),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Inclusive date range; both bounds are required once the range is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DateRange {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    fn check(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.start_date.is_none() {
            errors.push(FieldError::new("dateRange.startDate", "required when dateRange is set"));
        }
        if self.end_date.is_none() {
            errors.push(FieldError::new("dateRange.endDate", "required when dateRange is set"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                errors.push(FieldError::new(
                    "dateRange",
                    format!("startDate {} is after endDate {}", start, end),
                ));
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
}

/// Filters for the device inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceFilters {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl FilterSet for DeviceFilters {
    const FIELDS: &'static [&'static str] = &["type", "vendor", "status", "tags"];

    fn normalized(self) -> Self {
        let tags = self.tags.map(|tags| {
            let mut tags: Vec<String> = tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            tags.sort();
            tags.dedup();
            tags
        });
        Self {
            device_type: blank_to_none(self.device_type),
            vendor: blank_to_none(self.vendor),
            status: self.status,
            tags: tags.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Ignored,
}

/// Filters for security findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl FilterSet for SecurityFilters {
    const FIELDS: &'static [&'static str] = &["severity", "status", "deviceId", "checkType", "dateRange"];

    fn check(&self) -> Vec<FieldError> {
        self.date_range.as_ref().map(DateRange::check).unwrap_or_default()
    }

    fn normalized(self) -> Self {
        Self {
            device_id: blank_to_none(self.device_id),
            check_type: blank_to_none(self.check_type),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

/// Filters for generated reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl FilterSet for ReportFilters {
    const FIELDS: &'static [&'static str] = &["reportType", "status", "dateRange"];

    fn check(&self) -> Vec<FieldError> {
        self.date_range.as_ref().map(DateRange::check).unwrap_or_default()
    }

    fn normalized(self) -> Self {
        Self {
            report_type: blank_to_none(self.report_type),
            ..self
        }
    }
}

/// The filter object of one feature's view state.
///
/// Serialized as the plain inner object; the owning feature is known from
/// context, so deserialization always goes through [`FeatureKey::parse_filters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Filters {
    Devices(DeviceFilters),
    SecurityIssues(SecurityFilters),
    Reports(ReportFilters),
}

impl Filters {
    pub fn feature(&self) -> FeatureKey {
        match self {
            Filters::Devices(_) => FeatureKey::Devices,
            Filters::SecurityIssues(_) => FeatureKey::SecurityIssues,
            Filters::Reports(_) => FeatureKey::Reports,
        }
    }

    /// Whether no filter is applied at all
    pub fn is_empty(&self) -> bool {
        match self {
            Filters::Devices(f) => f.is_empty(),
            Filters::SecurityIssues(f) => f.is_empty(),
            Filters::Reports(f) => f.is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Copy of these filters with one key replaced (or removed, for `null`).
    pub fn with_field(&self, key: &str, value: Value) -> ViewResult<Filters> {
        let mut map = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if value.is_null() {
            map.remove(key);
        } else {
            map.insert(key.to_string(), value);
        }
        self.feature().parse_filters(&Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_absent_fields_mean_no_filter() {
        let filters = FeatureKey::Devices.parse_filters(&json!({})).unwrap();
        assert!(filters.is_empty());
        let filters = FeatureKey::SecurityIssues.parse_filters(&Value::Null).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = FeatureKey::Devices
            .parse_filters(&json!({"vendor": "cisco", "severity": "high"}))
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].path, "severity");
        assert_eq!(err.errors[0].reason, "unknown filter field");
    }

    #[test]
    fn test_type_errors_reported_per_field() {
        let err = FeatureKey::SecurityIssues
            .parse_filters(&json!({"severity": "apocalyptic", "deviceId": 7}))
            .unwrap_err();
        let paths: Vec<_> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"severity"));
        assert!(paths.contains(&"deviceId"));
    }

    #[test]
    fn test_device_filters_normalize_blank_values() {
        let filters = FeatureKey::Devices
            .parse_filters(&json!({"type": "  ", "vendor": "juniper", "tags": ["core", "", "edge", "core"]}))
            .unwrap();
        match filters {
            Filters::Devices(f) => {
                assert_eq!(f.device_type, None);
                assert_eq!(f.vendor.as_deref(), Some("juniper"));
                assert_eq!(f.tags, Some(vec!["core".to_string(), "edge".to_string()]));
            }
            other => panic!("unexpected filters {:?}", other),
        }
    }

    #[test]
    fn test_date_range_requires_both_bounds() {
        let err = FeatureKey::SecurityIssues
            .parse_filters(&json!({"dateRange": {"startDate": "2024-03-01"}}))
            .unwrap_err();
        assert_eq!(err.errors[0].path, "dateRange.endDate");
    }

    #[test]
    fn test_date_range_must_be_ordered() {
        let err = FeatureKey::Reports
            .parse_filters(&json!({"dateRange": {"startDate": "2024-03-02", "endDate": "2024-03-01"}}))
            .unwrap_err();
        assert_eq!(err.errors[0].path, "dateRange");

        let ok = FeatureKey::Reports
            .parse_filters(&json!({"dateRange": {"startDate": "2024-03-01", "endDate": "2024-03-01"}}))
            .unwrap();
        match ok {
            Filters::Reports(f) => {
                assert_eq!(f.date_range, Some(DateRange::new(date("2024-03-01"), date("2024-03-01"))));
            }
            other => panic!("unexpected filters {:?}", other),
        }
    }

    #[test]
    fn test_with_field_sets_and_removes() {
        let filters = FeatureKey::SecurityIssues.default_filters();
        let filters = filters.with_field("severity", json!("critical")).unwrap();
        assert_eq!(filters.to_value(), json!({"severity": "critical"}));

        let filters = filters.with_field("severity", Value::Null).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_with_field_rejects_unknown_key() {
        let filters = FeatureKey::Reports.default_filters();
        let err = filters.with_field("vendor", json!("cisco")).unwrap_err();
        assert!(err.touches("vendor"));
    }
}
