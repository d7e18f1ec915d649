//! Replay command: drives a controller through a timed script of view commands.
//!
//! A script is a JSON (or YAML) array of steps:
//!
//! ```json
//! [
//!   {"at_ms": 0,   "command": {"type": "data_loaded", "total_count": 240}},
//!   {"at_ms": 50,  "command": {"type": "query_changed", "text": "ssh"}},
//!   {"at_ms": 900, "command": {"type": "page_clicked", "page": 2}}
//! ]
//! ```
//!
//! Time is simulated, so debounce settlements land on exact deadlines.

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::state::read_document;
use auditview::config::Config;
use auditview::view::{
    Clock, FeatureKey, ListViewController, ManualClock, PagerSnapshot, QueryParams, ViewCommand, ViewEvent,
};

#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Feature whose controller runs the script
    pub feature: FeatureKey,

    /// Script file (JSON, or YAML by extension)
    pub script: PathBuf,

    /// Search debounce override, e.g. `300ms` or `1s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub debounce: Option<Duration>,

    /// Print the full outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// One scripted command and the simulated time it arrives at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    #[serde(default)]
    pub at_ms: u64,
    pub command: ViewCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub at_ms: u64,
    pub event: ViewEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub events: Vec<TimedEvent>,
    pub query: QueryParams,
    pub pager: PagerSnapshot,
    pub state: serde_json::Value,
}

impl ReplayCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let document = read_document(&self.script).await?;
        let steps: Vec<ReplayStep> = serde_json::from_value(document)
            .with_context(|| format!("Invalid replay script: {}", self.script.display()))?;

        let mut config = config.clone();
        if let Some(debounce) = self.debounce {
            config.search_debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        }

        let outcome = replay(self.feature, &config, steps);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        for timed in &outcome.events {
            let at = humantime::format_duration(Duration::from_millis(timed.at_ms));
            println!("{:>10}  {}", at.to_string(), serde_json::to_string(&timed.event)?);
        }
        println!();
        println!("query: {}", serde_json::to_string(&outcome.query)?);
        println!("pager: {}", serde_json::to_string(&outcome.pager)?);
        Ok(())
    }
}

/// Run `steps` against a fresh controller on a manual clock.
///
/// Debounce deadlines falling between two steps are fired at their exact
/// time; one still pending after the last step is fired as well.
pub fn replay(feature: FeatureKey, config: &Config, mut steps: Vec<ReplayStep>) -> ReplayOutcome {
    steps.sort_by_key(|step| step.at_ms);

    let clock = ManualClock::new();
    let mut controller = ListViewController::with_clock(feature, config, Arc::new(clock.clone()));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let event_clock = clock.clone();
    controller.subscribe(move |event| {
        let at_ms = u64::try_from(event_clock.now().as_millis()).unwrap_or(u64::MAX);
        match sink.lock() {
            Ok(mut log) => log.push(TimedEvent {
                at_ms,
                event: event.clone(),
            }),
            Err(_) => warn!("Replay event log poisoned, dropping event"),
        }
    });

    for step in steps {
        let at = Duration::from_millis(step.at_ms);
        fire_deadlines_until(&mut controller, &clock, at);
        clock.set(at);
        let changed = controller.dispatch(step.command.clone());
        debug!(at_ms = step.at_ms, changed, command = ?step.command, "Replayed command");
    }
    if let Some(deadline) = controller.next_deadline() {
        clock.set(deadline);
        controller.tick();
    }

    let outcome_events = match events.lock() {
        Ok(mut log) => std::mem::take(&mut *log),
        Err(_) => Vec::new(),
    };
    let outcome = ReplayOutcome {
        events: outcome_events,
        query: controller.query_params(),
        pager: controller.pager(),
        state: controller.serialize(),
    };
    controller.teardown();
    outcome
}

fn fire_deadlines_until(controller: &mut ListViewController, clock: &ManualClock, until: Duration) {
    while let Some(deadline) = controller.next_deadline() {
        if deadline > until {
            break;
        }
        clock.set(deadline);
        controller.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(script: serde_json::Value) -> Vec<ReplayStep> {
        serde_json::from_value(script).unwrap()
    }

    fn settled(outcome: &ReplayOutcome) -> Vec<(u64, String)> {
        outcome
            .events
            .iter()
            .filter_map(|timed| match &timed.event {
                ViewEvent::QuerySettled { query } => Some((timed.at_ms, query.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_keystroke_burst_settles_once() {
        let script = steps(json!([
            {"at_ms": 0, "command": {"type": "query_changed", "text": "f"}},
            {"at_ms": 50, "command": {"type": "query_changed", "text": "fi"}},
            {"at_ms": 120, "command": {"type": "query_changed", "text": "fir"}},
            {"at_ms": 400, "command": {"type": "query_changed", "text": "firm"}}
        ]));
        let outcome = replay(FeatureKey::Devices, &Config::default(), script);
        assert_eq!(settled(&outcome), vec![(700, "firm".to_string())]);
        assert_eq!(outcome.query.search_query, "firm");
    }

    #[test]
    fn test_deadline_between_steps_fires_on_time() {
        let script = steps(json!([
            {"at_ms": 0, "command": {"type": "data_loaded", "total_count": 200}},
            {"at_ms": 0, "command": {"type": "page_clicked", "page": 6}},
            {"at_ms": 10, "command": {"type": "query_changed", "text": "cve"}},
            {"at_ms": 2000, "command": {"type": "page_clicked", "page": 2}}
        ]));
        let outcome = replay(FeatureKey::SecurityIssues, &Config::default(), script);
        assert_eq!(settled(&outcome), vec![(310, "cve".to_string())]);
        assert_eq!(outcome.query.current_page, 2);
        assert_eq!(outcome.pager.total_pages, 10);
    }

    #[test]
    fn test_steps_sorted_by_time() {
        let script = steps(json!([
            {"at_ms": 100, "command": {"type": "page_clicked", "page": 3}},
            {"at_ms": 0, "command": {"type": "data_loaded", "total_count": 100}}
        ]));
        let outcome = replay(FeatureKey::Reports, &Config::default(), script);
        assert_eq!(outcome.query.current_page, 3);
        assert_eq!(outcome.state["currentPage"], 3);
    }

    #[test]
    fn test_loading_gates_page_clicks() {
        let script = steps(json!([
            {"command": {"type": "data_loaded", "total_count": 100}},
            {"command": {"type": "loading_started"}},
            {"command": {"type": "next_clicked"}},
            {"command": {"type": "loading_finished"}}
        ]));
        let outcome = replay(FeatureKey::Devices, &Config::default(), script);
        assert_eq!(outcome.query.current_page, 1);
        assert!(outcome.pager.can_go_next);
    }
}
