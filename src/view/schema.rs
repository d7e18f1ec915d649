//! View-state model, defaults and validation.
//!
//! A [`ViewState`] is built either from defaults when a feature view mounts
//! or from untrusted JSON (restored from storage or URL parameters) through
//! [`ViewStateSchema::parse`]. Omitted fields fall back to their defaults;
//! present fields that violate a type, range or enum constraint are
//! reported together in one [`ValidationError`].

use super::errors::{FieldError, ValidationError, ViewResult};
use super::feature::FeatureKey;
use super::filters::Filters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Default number of rows per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound for the page size (the `limit` sent downstream)
pub const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound for progress percentages
pub const MAX_PROGRESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("must be one of asc, desc (got '{}')", other)),
        }
    }
}

/// Short-lived UI flags. Each feature drives a subset of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransientFlags {
    /// Device create/edit form is open
    pub is_form_modal_open: bool,

    /// Id of the row being edited, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editing_id: Option<String>,

    /// Security checks are running
    pub is_running_checks: bool,

    /// Check progress, 0-100
    pub check_progress: u8,

    /// A report is being generated
    pub is_generating: bool,

    /// Generation progress, 0-100
    pub generation_progress: u8,
}

/// Parameters driving one list feature's displayed content.
///
/// Holds no reference to list items, only to the parameters that produce them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Feature this state belongs to; implied by the storage key, never serialized
    #[serde(skip)]
    #[schemars(skip)]
    pub feature: FeatureKey,

    /// 1-based current page
    pub current_page: u32,

    /// Rows per page, 1-100
    pub page_size: u32,

    /// Settled search query
    pub search_query: String,

    pub filters: Filters,

    pub sort_by: String,

    pub sort_direction: SortDirection,

    pub selected_ids: BTreeSet<String>,

    pub is_selection_mode: bool,

    #[serde(flatten)]
    pub flags: TransientFlags,
}

impl ViewState {
    /// All-defaults state for a freshly mounted feature view
    pub fn new(feature: FeatureKey, page_size: u32) -> Self {
        Self {
            feature,
            current_page: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            search_query: String::new(),
            filters: feature.default_filters(),
            sort_by: feature.default_sort().to_string(),
            sort_direction: feature.default_direction(),
            selected_ids: BTreeSet::new(),
            is_selection_mode: false,
            flags: TransientFlags::default(),
        }
    }
}

/// Schema for one feature: recognized shape, defaults and validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStateSchema {
    feature: FeatureKey,
    default_page_size: u32,
}

impl ViewStateSchema {
    pub fn new(feature: FeatureKey) -> Self {
        Self {
            feature,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size used when the input omits `pageSize`
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn feature(&self) -> FeatureKey {
        self.feature
    }

    pub fn defaults(&self) -> ViewState {
        ViewState::new(self.feature, self.default_page_size)
    }

    /// Build a validated state from partial, untrusted input.
    ///
    /// Missing and `null` fields take their defaults. Unknown top-level keys
    /// are treated as legacy fields and ignored. A `sortBy` the feature no
    /// longer supports falls back to the default sort.
    pub fn parse(&self, input: &Value) -> ViewResult<ViewState> {
        let map = match input {
            Value::Object(map) => map,
            Value::Null => return Ok(self.defaults()),
            _ => return Err(ValidationError::single("", "must be an object")),
        };

        let mut state = self.defaults();
        let mut fields = FieldReader::new(map);

        if let Some(page) = fields.integer("currentPage", 1, u32::MAX as i64) {
            state.current_page = page as u32;
        }
        if let Some(size) = fields.integer("pageSize", 1, MAX_PAGE_SIZE as i64) {
            state.page_size = size as u32;
        }
        if let Some(query) = fields.string("searchQuery") {
            state.search_query = query;
        }
        if let Some(value) = fields.present("filters") {
            match self.validate_filters(value) {
                Ok(filters) => state.filters = filters,
                Err(e) => fields.reject(e.nested("filters")),
            }
        }
        if let Some(sort_by) = fields.string("sortBy") {
            if self.feature.is_sortable(&sort_by) {
                state.sort_by = sort_by;
            } else {
                warn!(
                    feature = %self.feature,
                    sort_by = %sort_by,
                    "Unsupported sort field in stored state, using default"
                );
            }
        }
        if let Some(direction) = fields.string("sortDirection") {
            match direction.parse::<SortDirection>() {
                Ok(direction) => state.sort_direction = direction,
                Err(reason) => fields.error("sortDirection", reason),
            }
        }
        if let Some(ids) = fields.string_set("selectedIds") {
            state.selected_ids = ids;
        }
        if let Some(mode) = fields.boolean("isSelectionMode") {
            state.is_selection_mode = mode;
        }
        // selection mode is derived from a non-empty selection
        if !state.selected_ids.is_empty() {
            state.is_selection_mode = true;
        }

        if let Some(open) = fields.boolean("isFormModalOpen") {
            state.flags.is_form_modal_open = open;
        }
        if let Some(id) = fields.string("editingId") {
            state.flags.editing_id = Some(id);
        }
        if let Some(running) = fields.boolean("isRunningChecks") {
            state.flags.is_running_checks = running;
        }
        if let Some(progress) = fields.percent("checkProgress") {
            state.flags.check_progress = progress;
        }
        if let Some(generating) = fields.boolean("isGenerating") {
            state.flags.is_generating = generating;
        }
        if let Some(progress) = fields.percent("generationProgress") {
            state.flags.generation_progress = progress;
        }

        for key in fields.unknown_keys() {
            debug!(feature = %self.feature, key = %key, "Ignoring legacy view-state field");
        }

        match fields.finish() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    /// Check a filter object against this feature's declared fields.
    pub fn validate_filters(&self, filters: &Value) -> ViewResult<Filters> {
        self.feature.parse_filters(filters)
    }

    /// Parse, falling back to defaults when the input is invalid.
    pub fn restore(&self, input: &Value) -> ViewState {
        match self.parse(input) {
            Ok(state) => state,
            Err(e) => {
                warn!(feature = %self.feature, error = %e, "Discarding invalid stored view state");
                self.defaults()
            }
        }
    }

    pub fn serialize(&self, state: &ViewState) -> Value {
        serde_json::to_value(state).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "currentPage",
    "pageSize",
    "searchQuery",
    "filters",
    "sortBy",
    "sortDirection",
    "selectedIds",
    "isSelectionMode",
    "isFormModalOpen",
    "editingId",
    "isRunningChecks",
    "checkProgress",
    "isGenerating",
    "generationProgress",
];

/// Typed accessors over a JSON object that collect field errors.
///
/// Each accessor returns `None` both for absent fields and for fields that
/// failed validation; failures are recorded and surfaced by [`finish`].
///
/// [`finish`]: FieldReader::finish
struct FieldReader<'a> {
    map: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            errors: Vec::new(),
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn error(&mut self, key: &str, reason: impl Into<String>) {
        self.errors.push(FieldError::new(key, reason));
    }

    fn reject(&mut self, err: ValidationError) {
        self.errors.extend(err.errors);
    }

    fn integer(&mut self, key: &str, min: i64, max: i64) -> Option<i64> {
        let value = self.present(key)?;
        match value.as_i64() {
            Some(n) if n < min => {
                self.error(key, format!("must be >= {}", min));
                None
            }
            Some(n) if n > max => {
                self.error(key, format!("must be <= {}", max));
                None
            }
            Some(n) => Some(n),
            None => {
                self.error(key, "must be an integer");
                None
            }
        }
    }

    fn percent(&mut self, key: &str) -> Option<u8> {
        let value = self.present(key)?;
        match value.as_f64() {
            Some(p) if (0.0..=MAX_PROGRESS as f64).contains(&p) => Some(p.round() as u8),
            Some(_) => {
                self.error(key, format!("must be between 0 and {}", MAX_PROGRESS));
                None
            }
            None => {
                self.error(key, "must be a number");
                None
            }
        }
    }

    fn string(&mut self, key: &str) -> Option<String> {
        let value = self.present(key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.error(key, "must be a string");
                None
            }
        }
    }

    fn boolean(&mut self, key: &str) -> Option<bool> {
        let value = self.present(key)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.error(key, "must be a boolean");
                None
            }
        }
    }

    fn string_set(&mut self, key: &str) -> Option<BTreeSet<String>> {
        let value = self.present(key)?;
        let Some(items) = value.as_array() else {
            self.error(key, "must be an array of strings");
            return None;
        };

        let mut set = BTreeSet::new();
        let mut valid = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => {
                    set.insert(s.to_string());
                }
                None => {
                    self.error(&format!("{}[{}]", key, i), "must be a string");
                    valid = false;
                }
            }
        }
        valid.then_some(set)
    }

    fn unknown_keys(&self) -> impl Iterator<Item = &'a String> {
        self.map.keys().filter(|k| !KNOWN_FIELDS.contains(&k.as_str()))
    }

    fn finish(self) -> Option<ValidationError> {
        ValidationError::from_errors(self.errors)
    }
}
