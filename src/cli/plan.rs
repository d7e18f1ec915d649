//! Plan command: prints the page window a pager would render

use anyhow::Result;
use clap::Args;
use serde_json::json;

use auditview::config::Config;
use auditview::view::{format_plan, PageWindowPlanner, PaginationResult};

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Current page (1-based)
    #[arg(long, default_value = "1")]
    pub current: u32,

    /// Total number of pages
    #[arg(long, conflicts_with = "rows")]
    pub total: Option<u32>,

    /// Total number of rows; pages are derived using the configured page size
    #[arg(long)]
    pub rows: Option<u64>,

    /// Page numbers in the sliding window (defaults to configuration)
    #[arg(long)]
    pub max: Option<u32>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        println!("{}", self.render(config)?);
        Ok(())
    }

    fn total_pages(&self, config: &Config) -> u32 {
        match (self.total, self.rows) {
            (Some(total), _) => total,
            (None, Some(rows)) => PaginationResult::compute(rows, config.page_size, self.current).total_pages,
            (None, None) => 1,
        }
    }

    fn render(&self, config: &Config) -> Result<String> {
        let total_pages = self.total_pages(config);
        let planner = PageWindowPlanner::new(self.max.unwrap_or(config.max_pages_to_show));
        let plan = planner.plan(self.current, total_pages);

        if self.json {
            let output = json!({
                "currentPage": self.current,
                "totalPages": total_pages,
                "maxPagesToShow": planner.max_pages_to_show(),
                "pagesToShow": plan,
            });
            return Ok(serde_json::to_string_pretty(&output)?);
        }

        if plan.is_empty() {
            return Ok("(no pages)".to_string());
        }
        Ok(format_plan(&plan, self.current))
    }
}
