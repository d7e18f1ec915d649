//! Paginated list view-state engine.
//!
//! Each list feature (devices, security issues, reports) keeps its page,
//! search query, filters, sort, selection and progress flags in a
//! [`ViewState`]. The pieces:
//!
//! - [`ViewStateSchema`] builds and validates states from untrusted input
//! - [`Debouncer`] coalesces keystrokes into settled search queries
//! - [`PageWindowPlanner`] decides which page numbers a pager shows
//! - [`ListViewController`] owns one feature's state and ties them together

pub mod controller;
pub mod debounce;
pub mod errors;
pub mod feature;
pub mod filters;
pub mod pagination;
pub mod schema;

pub use controller::{
    ListViewController, PagerSnapshot, ProgressKind, QueryParams, SubscriptionId, ViewCommand, ViewEvent,
};
pub use debounce::{spawn_debouncer, Clock, DebounceHandle, Debouncer, ManualClock, SystemClock, Timer, TokioClock};
pub use errors::{FieldError, ValidationError, ViewResult};
pub use feature::FeatureKey;
pub use filters::{
    DateRange, DeviceFilters, DeviceStatus, FilterSet, Filters, IssueStatus, ReportFilters, ReportStatus,
    SecurityFilters, Severity,
};
pub use pagination::{
    format_plan, plan_page_window, total_pages, PageEntry, PageWindowPlanner, PaginationResult,
    DEFAULT_MAX_PAGES_TO_SHOW,
};
pub use schema::{
    SortDirection, TransientFlags, ViewState, ViewStateSchema, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_PROGRESS,
};
