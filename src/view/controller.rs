//! Stateful orchestration of one feature's list view.
//!
//! The [`ListViewController`] owns a feature's [`ViewState`] and is the only
//! writer to it. Presentation code feeds user events in (directly or as
//! [`ViewCommand`]s), the controller validates and applies them, keeps the
//! derived pagination metadata current, and notifies subscribers with a
//! [`ViewEvent`] after every successful mutation. Data fetching stays with
//! the caller: it reads [`QueryParams`] when an event asks for a refetch and
//! reports totals back through [`ListViewController::data_loaded`].

use super::debounce::{Clock, Debouncer, SystemClock};
use super::errors::{FieldError, ValidationError, ViewResult};
use super::feature::FeatureKey;
use super::filters::Filters;
use super::pagination::{PageEntry, PageWindowPlanner, PaginationResult};
use super::schema::{SortDirection, ViewState, ViewStateSchema, MAX_PAGE_SIZE, MAX_PROGRESS};
use crate::config::Config;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Handle returned by [`ListViewController::subscribe`]
pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&ViewEvent) + Send + Sync>;

/// Long-running operation whose progress is tracked in the view state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Checks,
    Generation,
}

/// Change notifications emitted after a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Current page moved; dependent data should be refetched
    PageChanged {
        old_page: u32,
        new_page: u32,
    },

    /// Rows per page changed
    PageSizeChanged {
        page_size: u32,
    },

    /// Raw search text changed (display only, not yet settled)
    SearchInputChanged {
        text: String,
    },

    /// A new query settled; the page was reset to 1
    QuerySettled {
        query: String,
    },

    FiltersChanged {
        filters: Value,
    },

    /// A filter change failed validation; previous filters remain in effect
    FilterRejected {
        errors: Vec<FieldError>,
    },

    SortChanged {
        sort_by: String,
        sort_direction: SortDirection,
    },

    SelectionChanged {
        selected: usize,
        is_selection_mode: bool,
    },

    PaginationUpdated {
        pagination: PaginationResult,
    },

    LoadingChanged {
        is_loading: bool,
    },

    FormChanged {
        is_open: bool,
        editing_id: Option<String>,
    },

    ProgressChanged {
        kind: ProgressKind,
        running: bool,
        progress: u8,
    },

    /// The whole state was replaced from persisted input
    StateRestored,
}

impl ViewEvent {
    /// Whether the request parameters changed and the list must be refetched
    pub fn needs_refetch(&self) -> bool {
        matches!(
            self,
            ViewEvent::PageChanged { .. }
                | ViewEvent::PageSizeChanged { .. }
                | ViewEvent::QuerySettled { .. }
                | ViewEvent::FiltersChanged { .. }
                | ViewEvent::SortChanged { .. }
                | ViewEvent::StateRestored
        )
    }
}

/// Inbound user and data events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewCommand {
    PageClicked {
        page: u32,
    },
    NextClicked,
    PrevClicked,
    PageSizeChanged {
        page_size: u32,
    },
    QueryChanged {
        text: String,
    },
    /// Settle the typed query without waiting for the quiet period
    QuerySubmitted,
    FilterChanged {
        key: String,
        #[serde(default)]
        value: Value,
    },
    FiltersCleared,
    SortChanged {
        field: String,
        direction: SortDirection,
    },
    RowSelected {
        id: String,
    },
    AllSelected {
        ids: Vec<String>,
    },
    SelectionCleared,
    DataLoaded {
        total_count: u64,
        #[serde(default)]
        ids: Option<Vec<String>>,
    },
    LoadingStarted,
    LoadingFinished,
}

/// Read-only parameters for building a list query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub current_page: u32,
    pub page_size: u32,
    pub search_query: String,
    pub filters: Filters,
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

impl QueryParams {
    /// Row offset for `offset`/`limit` style backends
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Read-only view of the pager control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerSnapshot {
    pub pages_to_show: Vec<PageEntry>,
    pub current_page: u32,
    pub total_pages: u32,
    pub can_go_next: bool,
    pub can_go_prev: bool,
    pub is_loading: bool,
}

/// Orchestrates one feature's view state
pub struct ListViewController {
    schema: ViewStateSchema,
    state: ViewState,

    /// Raw search text as typed, ahead of the settled query
    search_input: String,

    /// Derived metadata; `None` until the first total is known
    pagination: Option<PaginationResult>,

    /// Ids on the currently loaded page; `None` until data arrives
    loaded_ids: Option<BTreeSet<String>>,

    is_loading: bool,
    planner: PageWindowPlanner,
    debouncer: Debouncer<String>,
    persist_selection: bool,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    torn_down: bool,
}

impl fmt::Debug for ListViewController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListViewController")
            .field("state", &self.state)
            .field("search_input", &self.search_input)
            .field("pagination", &self.pagination)
            .field("is_loading", &self.is_loading)
            .field("listeners", &self.listeners.len())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl ListViewController {
    /// Create a controller on wall-clock time
    pub fn new(feature: FeatureKey, config: &Config) -> Self {
        Self::with_clock(feature, config, Arc::new(SystemClock::new()))
    }

    /// Create a controller whose debounce timer reads `clock`
    pub fn with_clock(feature: FeatureKey, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let schema = ViewStateSchema::new(feature).with_page_size(config.page_size);
        debug!(feature = %feature, "Mounting list view");
        Self {
            state: schema.defaults(),
            schema,
            search_input: String::new(),
            pagination: None,
            loaded_ids: None,
            is_loading: false,
            planner: PageWindowPlanner::new(config.max_pages_to_show),
            debouncer: Debouncer::new(config.search_debounce(), clock),
            persist_selection: config.persist_selection_across_pages,
            listeners: Vec::new(),
            next_subscription: 0,
            torn_down: false,
        }
    }

    pub fn feature(&self) -> FeatureKey {
        self.schema.feature()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn current_page(&self) -> u32 {
        self.state.current_page
    }

    /// Raw search text for the input field
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn pagination(&self) -> Option<&PaginationResult> {
        self.pagination.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn selected_ids(&self) -> &BTreeSet<String> {
        &self.state.selected_ids
    }

    pub fn is_selection_mode(&self) -> bool {
        self.state.is_selection_mode
    }

    // Subscriptions

    /// Register a listener invoked synchronously after each mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&ViewEvent) + Send + Sync + 'static,
    {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn emit(&self, event: ViewEvent) {
        trace!(?event, "View event");
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    /// Whether a mutation may proceed; logs and refuses after teardown
    fn live(&self, operation: &str) -> bool {
        if self.torn_down {
            trace!(operation, "Ignoring operation on torn-down controller");
        }
        !self.torn_down
    }

    // Pagination

    /// Navigate to page `n`.
    ///
    /// Ignored while a fetch is in flight and for pages outside
    /// `[1, total_pages]`; boundary clicks never surface an error.
    pub fn set_page(&mut self, n: u32) -> bool {
        if !self.live("set_page") {
            return false;
        }
        if self.is_loading {
            trace!(page = n, "Dropping page request while loading");
            return false;
        }
        let out_of_range = n < 1
            || self
                .pagination
                .as_ref()
                .is_some_and(|p| n > p.total_pages);
        if out_of_range {
            trace!(page = n, "Ignoring out-of-range page request");
            return false;
        }
        if n == self.state.current_page {
            return false;
        }

        let old_page = self.state.current_page;
        self.move_to_page(n);
        let selection_dropped = self.leave_loaded_page();
        debug!(feature = %self.feature(), old_page, new_page = n, "Page changed");
        self.emit(ViewEvent::PageChanged { old_page, new_page: n });
        if selection_dropped {
            self.emit_selection();
        }
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.state.current_page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.state.current_page.saturating_sub(1))
    }

    pub fn last_page(&mut self) -> bool {
        match self.pagination {
            Some(p) => self.set_page(p.max_page()),
            None => false,
        }
    }

    /// Change rows per page, keeping the first visible row on screen
    pub fn set_page_size(&mut self, page_size: u32) -> bool {
        if !self.live("set_page_size") {
            return false;
        }
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        if page_size == self.state.page_size {
            return false;
        }

        let first_row = u64::from(self.state.current_page - 1) * u64::from(self.state.page_size);
        let page = u32::try_from(first_row / u64::from(page_size)).unwrap_or(u32::MAX - 1) + 1;
        self.state.page_size = page_size;
        self.state.current_page = page;
        let selection_dropped = self.leave_loaded_page();
        if let Some(p) = self.pagination {
            self.recompute_pagination(p.total_count, page_size);
        }
        self.emit(ViewEvent::PageSizeChanged { page_size });
        if selection_dropped {
            self.emit_selection();
        }
        true
    }

    /// Recompute totals after the backing count or page size changed.
    ///
    /// A current page beyond the new last page is clamped to
    /// `max(1, total_pages)` and announced with `PageChanged`.
    pub fn recompute_pagination(&mut self, total_count: u64, page_size: u32) -> PaginationResult {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        if self.torn_down {
            return PaginationResult::compute(total_count, page_size, self.state.current_page);
        }
        self.state.page_size = page_size;

        let mut result = PaginationResult::compute(total_count, page_size, self.state.current_page);
        let mut selection_dropped = false;
        let clamped_from = if self.state.current_page > result.max_page() {
            let old_page = self.state.current_page;
            self.state.current_page = result.max_page();
            result = PaginationResult::compute(total_count, page_size, self.state.current_page);
            selection_dropped = self.leave_loaded_page();
            Some(old_page)
        } else {
            None
        };

        self.pagination = Some(result);
        self.emit(ViewEvent::PaginationUpdated { pagination: result });
        if let Some(old_page) = clamped_from {
            debug!(old_page, new_page = result.current_page, "Current page clamped to new total");
            self.emit(ViewEvent::PageChanged {
                old_page,
                new_page: result.current_page,
            });
        }
        if selection_dropped {
            self.emit_selection();
        }
        result
    }

    /// A page of data arrived: record its ids and the new total
    pub fn data_loaded(&mut self, total_count: u64, ids: Option<Vec<String>>) -> PaginationResult {
        if !self.live("data_loaded") {
            return PaginationResult::compute(total_count, self.state.page_size, self.state.current_page);
        }
        if let Some(ids) = ids {
            let ids: BTreeSet<String> = ids.into_iter().collect();
            if !self.persist_selection {
                let before = self.state.selected_ids.len();
                self.state.selected_ids.retain(|id| ids.contains(id));
                if self.state.selected_ids.len() != before {
                    self.sync_selection_mode();
                    self.emit_selection();
                }
            }
            self.loaded_ids = Some(ids);
        }
        self.recompute_pagination(total_count, self.state.page_size)
    }

    pub fn loading_started(&mut self) {
        self.set_loading(true);
    }

    pub fn loading_finished(&mut self) {
        self.set_loading(false);
    }

    fn set_loading(&mut self, is_loading: bool) {
        if !self.live("set_loading") || self.is_loading == is_loading {
            return;
        }
        self.is_loading = is_loading;
        self.emit(ViewEvent::LoadingChanged { is_loading });
    }

    fn move_to_page(&mut self, page: u32) {
        self.state.current_page = page;
        if let Some(p) = self.pagination {
            self.pagination = Some(PaginationResult::compute(p.total_count, p.page_size, page));
        }
    }

    // Search

    /// Record typed text; the query itself settles after the debounce delay
    pub fn set_query(&mut self, text: impl Into<String>) {
        if !self.live("set_query") {
            return;
        }
        let text = text.into();
        if text == self.search_input {
            return;
        }
        self.search_input = text.clone();
        self.emit(ViewEvent::SearchInputChanged { text: text.clone() });

        if let Some(settled) = self.debouncer.observe(text) {
            self.apply_settled_query(settled);
        }
    }

    /// Settle the pending query immediately (e.g. on Enter)
    pub fn submit_query(&mut self) -> bool {
        if !self.live("submit_query") {
            return false;
        }
        match self.debouncer.flush() {
            Some(query) => self.apply_settled_query(query),
            None => false,
        }
    }

    /// Drive the debounce timer; call when [`next_deadline`] has passed.
    ///
    /// Returns whether a new query settled.
    ///
    /// [`next_deadline`]: ListViewController::next_deadline
    pub fn tick(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        match self.debouncer.poll() {
            Some(query) => self.apply_settled_query(query),
            None => false,
        }
    }

    /// Clock reading at which the pending query settles
    pub fn next_deadline(&self) -> Option<Duration> {
        self.debouncer.next_deadline()
    }

    pub fn time_until_settled(&self) -> Option<Duration> {
        self.debouncer.time_until_settled()
    }

    pub fn has_pending_query(&self) -> bool {
        self.debouncer.is_pending()
    }

    fn apply_settled_query(&mut self, query: String) -> bool {
        if query == self.state.search_query {
            debug!("Settled query unchanged");
            return false;
        }
        debug!(feature = %self.feature(), query = %query, "Query settled");
        self.state.search_query = query.clone();
        self.move_to_page(1);
        let selection_dropped = self.leave_loaded_page();
        self.emit(ViewEvent::QuerySettled { query });
        if selection_dropped {
            self.emit_selection();
        }
        true
    }

    // Filters

    /// Set one filter field; `null` removes it.
    ///
    /// On validation failure the previous filters remain in effect and a
    /// `FilterRejected` event carries the field messages.
    pub fn set_filter(&mut self, key: &str, value: Value) -> ViewResult<bool> {
        if !self.live("set_filter") {
            return Ok(false);
        }
        match self.state.filters.with_field(key, value) {
            Ok(filters) => Ok(self.apply_filters(filters)),
            Err(e) => Err(self.reject_filters(e)),
        }
    }

    /// Replace the whole filter object
    pub fn set_filters(&mut self, filters: &Value) -> ViewResult<bool> {
        if !self.live("set_filters") {
            return Ok(false);
        }
        match self.schema.validate_filters(filters) {
            Ok(filters) => Ok(self.apply_filters(filters)),
            Err(e) => Err(self.reject_filters(e)),
        }
    }

    pub fn clear_filters(&mut self) -> bool {
        if !self.live("clear_filters") {
            return false;
        }
        self.apply_filters(self.feature().default_filters())
    }

    fn apply_filters(&mut self, filters: Filters) -> bool {
        if filters == self.state.filters {
            return false;
        }
        self.state.filters = filters;
        self.move_to_page(1);
        let selection_dropped = self.leave_loaded_page();
        let filters = self.state.filters.to_value();
        debug!(feature = %self.feature(), %filters, "Filters changed");
        self.emit(ViewEvent::FiltersChanged { filters });
        if selection_dropped {
            self.emit_selection();
        }
        true
    }

    fn reject_filters(&self, err: ValidationError) -> ValidationError {
        warn!(feature = %self.feature(), error = %err, "Rejected filter change");
        self.emit(ViewEvent::FilterRejected {
            errors: err.errors.clone(),
        });
        err
    }

    // Sort

    /// Change ordering. Unknown fields are ignored; the page is kept.
    pub fn set_sort(&mut self, field: &str, direction: SortDirection) -> bool {
        if !self.live("set_sort") {
            return false;
        }
        if !self.feature().is_sortable(field) {
            warn!(feature = %self.feature(), field, "Ignoring sort on unknown field");
            return false;
        }
        if self.state.sort_by == field && self.state.sort_direction == direction {
            return false;
        }
        self.state.sort_by = field.to_string();
        self.state.sort_direction = direction;
        self.emit(ViewEvent::SortChanged {
            sort_by: self.state.sort_by.clone(),
            sort_direction: direction,
        });
        true
    }

    /// Column-header behaviour: same field flips direction, a new field sorts ascending
    pub fn toggle_sort(&mut self, field: &str) -> bool {
        let direction = if self.state.sort_by == field {
            self.state.sort_direction.reversed()
        } else {
            SortDirection::Asc
        };
        self.set_sort(field, direction)
    }

    // Selection

    /// Add or remove a row. Ids outside the loaded page are ignored.
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if !self.live("toggle_selection") {
            return false;
        }
        if !self.is_loaded(id) {
            trace!(id, "Ignoring selection of row outside the loaded page");
            return false;
        }
        if !self.state.selected_ids.remove(id) {
            self.state.selected_ids.insert(id.to_string());
        }
        self.sync_selection_mode();
        self.emit_selection();
        true
    }

    /// Replace the selection with `ids` (restricted to the loaded page)
    pub fn select_all<I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        if !self.live("select_all") {
            return false;
        }
        let selected: BTreeSet<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| self.is_loaded(id))
            .collect();
        if selected == self.state.selected_ids {
            return false;
        }
        self.state.selected_ids = selected;
        self.sync_selection_mode();
        self.emit_selection();
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        if !self.live("clear_selection") {
            return false;
        }
        if self.state.selected_ids.is_empty() && !self.state.is_selection_mode {
            return false;
        }
        self.clear_selection_silently();
        self.emit_selection();
        true
    }

    /// Enter selection mode with nothing selected yet
    pub fn enter_selection_mode(&mut self) -> bool {
        if !self.live("enter_selection_mode") || self.state.is_selection_mode {
            return false;
        }
        self.state.is_selection_mode = true;
        self.emit_selection();
        true
    }

    /// Leave selection mode, dropping the selection
    pub fn exit_selection_mode(&mut self) -> bool {
        self.clear_selection()
    }

    fn is_loaded(&self, id: &str) -> bool {
        self.loaded_ids.as_ref().map_or(true, |ids| ids.contains(id))
    }

    fn sync_selection_mode(&mut self) {
        self.state.is_selection_mode = !self.state.selected_ids.is_empty();
    }

    fn clear_selection_silently(&mut self) {
        self.state.selected_ids.clear();
        self.state.is_selection_mode = false;
    }

    /// The visible rows are about to be replaced: forget the loaded ids and,
    /// unless selection persists across pages, drop the selection.
    ///
    /// Returns whether the selection changed; the caller emits
    /// `SelectionChanged` after its own event.
    fn leave_loaded_page(&mut self) -> bool {
        self.loaded_ids = None;
        if self.persist_selection {
            return false;
        }
        let had_selection = !self.state.selected_ids.is_empty() || self.state.is_selection_mode;
        self.clear_selection_silently();
        had_selection
    }

    fn emit_selection(&self) {
        self.emit(ViewEvent::SelectionChanged {
            selected: self.state.selected_ids.len(),
            is_selection_mode: self.state.is_selection_mode,
        });
    }

    // Form and progress flags

    /// Open the create (`None`) or edit form
    pub fn open_form(&mut self, editing_id: Option<String>) -> bool {
        if !self.live("open_form") || !self.supports(self.feature().uses_form(), "form") {
            return false;
        }
        self.state.flags.is_form_modal_open = true;
        self.state.flags.editing_id = editing_id;
        self.emit_form();
        true
    }

    pub fn close_form(&mut self) -> bool {
        if !self.live("close_form") || !self.state.flags.is_form_modal_open {
            return false;
        }
        self.state.flags.is_form_modal_open = false;
        self.state.flags.editing_id = None;
        self.emit_form();
        true
    }

    pub fn start_checks(&mut self) -> bool {
        self.update_progress(ProgressKind::Checks, Some(true), Some(0))
    }

    pub fn set_check_progress(&mut self, progress: u8) -> bool {
        self.update_progress(ProgressKind::Checks, None, Some(progress))
    }

    pub fn finish_checks(&mut self) -> bool {
        self.update_progress(ProgressKind::Checks, Some(false), Some(MAX_PROGRESS))
    }

    pub fn start_generation(&mut self) -> bool {
        self.update_progress(ProgressKind::Generation, Some(true), Some(0))
    }

    pub fn set_generation_progress(&mut self, progress: u8) -> bool {
        self.update_progress(ProgressKind::Generation, None, Some(progress))
    }

    pub fn finish_generation(&mut self) -> bool {
        self.update_progress(ProgressKind::Generation, Some(false), Some(MAX_PROGRESS))
    }

    fn update_progress(&mut self, kind: ProgressKind, running: Option<bool>, progress: Option<u8>) -> bool {
        let supported = match kind {
            ProgressKind::Checks => self.feature().uses_checks(),
            ProgressKind::Generation => self.feature().uses_generation(),
        };
        if !self.live("update_progress") || !self.supports(supported, "progress") {
            return false;
        }

        let flags = &mut self.state.flags;
        let (running_flag, progress_value) = match kind {
            ProgressKind::Checks => (&mut flags.is_running_checks, &mut flags.check_progress),
            ProgressKind::Generation => (&mut flags.is_generating, &mut flags.generation_progress),
        };
        if let Some(running) = running {
            *running_flag = running;
        }
        if let Some(progress) = progress {
            *progress_value = progress.min(MAX_PROGRESS);
        }
        let (running, progress) = (*running_flag, *progress_value);

        self.emit(ViewEvent::ProgressChanged { kind, running, progress });
        true
    }

    fn supports(&self, supported: bool, what: &str) -> bool {
        if !supported {
            warn!(feature = %self.feature(), what, "Feature does not track this flag");
        }
        supported
    }

    fn emit_form(&self) {
        self.emit(ViewEvent::FormChanged {
            is_open: self.state.flags.is_form_modal_open,
            editing_id: self.state.flags.editing_id.clone(),
        });
    }

    // Persistence

    /// Replace the state from persisted JSON.
    ///
    /// Invalid input leaves the current (last known good) state untouched.
    pub fn restore(&mut self, input: &Value) -> ViewResult<()> {
        if !self.live("restore") {
            return Ok(());
        }
        let state = match self.schema.parse(input) {
            Ok(state) => state,
            Err(e) => {
                warn!(feature = %self.feature(), error = %e, "Keeping last known good view state");
                return Err(e);
            }
        };

        let selection_changed = state.selected_ids != self.state.selected_ids
            || state.is_selection_mode != self.state.is_selection_mode;
        self.state = state;
        self.search_input = self.state.search_query.clone();
        self.debouncer.cancel();
        self.pagination = None;
        self.loaded_ids = None;
        debug!(feature = %self.feature(), "View state restored");
        self.emit(ViewEvent::StateRestored);
        if selection_changed {
            self.emit_selection();
        }
        Ok(())
    }

    pub fn serialize(&self) -> Value {
        self.schema.serialize(&self.state)
    }

    // Outbound snapshots

    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            current_page: self.state.current_page,
            page_size: self.state.page_size,
            search_query: self.state.search_query.clone(),
            filters: self.state.filters.clone(),
            sort_by: self.state.sort_by.clone(),
            sort_direction: self.state.sort_direction,
        }
    }

    pub fn pager(&self) -> PagerSnapshot {
        let total_pages = self.pagination.map_or(0, |p| p.total_pages);
        let current_page = self.state.current_page;
        PagerSnapshot {
            pages_to_show: self.planner.plan(current_page, total_pages),
            current_page,
            total_pages,
            can_go_next: !self.is_loading && current_page < total_pages,
            can_go_prev: !self.is_loading && current_page > 1,
            is_loading: self.is_loading,
        }
    }

    // Inbound events

    /// Apply an inbound event; returns whether anything changed
    pub fn dispatch(&mut self, command: ViewCommand) -> bool {
        match command {
            ViewCommand::PageClicked { page } => self.set_page(page),
            ViewCommand::NextClicked => self.next_page(),
            ViewCommand::PrevClicked => self.prev_page(),
            ViewCommand::PageSizeChanged { page_size } => self.set_page_size(page_size),
            ViewCommand::QueryChanged { text } => {
                let before = self.search_input.clone();
                self.set_query(text);
                before != self.search_input
            }
            ViewCommand::QuerySubmitted => self.submit_query(),
            ViewCommand::FilterChanged { key, value } => self.set_filter(&key, value).unwrap_or(false),
            ViewCommand::FiltersCleared => self.clear_filters(),
            ViewCommand::SortChanged { field, direction } => self.set_sort(&field, direction),
            ViewCommand::RowSelected { id } => self.toggle_selection(&id),
            ViewCommand::AllSelected { ids } => self.select_all(ids),
            ViewCommand::SelectionCleared => self.clear_selection(),
            ViewCommand::DataLoaded { total_count, ids } => {
                if self.torn_down {
                    return false;
                }
                let before = self.pagination;
                let after = self.data_loaded(total_count, ids);
                before != Some(after)
            }
            ViewCommand::LoadingStarted => {
                let before = self.is_loading;
                self.loading_started();
                before != self.is_loading
            }
            ViewCommand::LoadingFinished => {
                let before = self.is_loading;
                self.loading_finished();
                before != self.is_loading
            }
        }
    }

    // Lifecycle

    /// Unmount: cancel the pending debounce timer and drop all listeners.
    ///
    /// Every later operation is a no-op; a settlement that would have fired
    /// afterwards is discarded.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.debouncer.teardown();
        self.listeners.clear();
        self.torn_down = true;
        debug!(feature = %self.feature(), "List view torn down");
    }
}
