//! View-state engine for paginated, searchable, filterable list screens.

pub mod config;
pub mod view;

pub use config::{Config, ConfigError};
pub use view::{FeatureKey, ListViewController, ViewState, ViewStateSchema};
