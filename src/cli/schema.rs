//! Schema command: JSON schema generation for view states, filters and configuration

use anyhow::{Context, Result};
use clap::Args;
use schemars::schema_for;
use serde_json::Value;
use std::path::PathBuf;

use auditview::config::Config;
use auditview::view::{DeviceFilters, ReportFilters, SecurityFilters, ViewState};

/// Generate JSON schemas
#[derive(Debug, Args)]
pub struct SchemaCommand {
    /// Which shape to describe
    pub target: SchemaTarget,

    /// Output format for schema generation
    #[arg(short, long, default_value = "json")]
    pub format: SchemaFormat,

    /// Output file path (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty print the output
    #[arg(short, long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaTarget {
    ViewState,
    DeviceFilters,
    SecurityFilters,
    ReportFilters,
    Config,
}

impl SchemaTarget {
    fn title(&self) -> &'static str {
        match self {
            SchemaTarget::ViewState => "List View State",
            SchemaTarget::DeviceFilters => "Device Filters",
            SchemaTarget::SecurityFilters => "Security Issue Filters",
            SchemaTarget::ReportFilters => "Report Filters",
            SchemaTarget::Config => "auditview Configuration",
        }
    }
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaCommand {
    pub async fn execute(&self) -> Result<()> {
        let schema = generate_schema(self.target)?;

        let output = match self.format {
            SchemaFormat::Json => {
                if self.pretty {
                    serde_json::to_string_pretty(&schema)?
                } else {
                    serde_json::to_string(&schema)?
                }
            }
            SchemaFormat::Yaml => serde_yaml::to_string(&schema).context("Failed to convert schema to YAML")?,
        };

        if let Some(ref output_path) = self.output {
            tokio::fs::write(output_path, output)
                .await
                .with_context(|| format!("Failed to write schema to: {}", output_path.display()))?;
            println!("Schema written to: {}", output_path.display());
        } else {
            println!("{}", output);
        }

        Ok(())
    }
}

pub fn generate_schema(target: SchemaTarget) -> Result<Value> {
    let schema = match target {
        SchemaTarget::ViewState => schema_for!(ViewState),
        SchemaTarget::DeviceFilters => schema_for!(DeviceFilters),
        SchemaTarget::SecurityFilters => schema_for!(SecurityFilters),
        SchemaTarget::ReportFilters => schema_for!(ReportFilters),
        SchemaTarget::Config => schema_for!(Config),
    };
    let mut schema_value = serde_json::to_value(schema).context("Failed to convert schema to JSON value")?;

    if let Some(obj) = schema_value.as_object_mut() {
        obj.insert("title".to_string(), Value::String(target.title().to_string()));
    }

    Ok(schema_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn properties(target: SchemaTarget) -> Vec<String> {
        let schema = generate_schema(target).unwrap();
        schema["properties"].as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_view_state_schema_uses_wire_names() {
        let props = properties(SchemaTarget::ViewState);
        for key in ["currentPage", "pageSize", "searchQuery", "filters", "sortBy", "selectedIds"] {
            assert!(props.contains(&key.to_string()), "missing {}", key);
        }
        assert!(!props.contains(&"feature".to_string()));
    }

    #[test]
    fn test_filter_schemas() {
        assert!(properties(SchemaTarget::DeviceFilters).contains(&"type".to_string()));
        assert!(properties(SchemaTarget::SecurityFilters).contains(&"dateRange".to_string()));
        assert!(properties(SchemaTarget::ReportFilters).contains(&"reportType".to_string()));
    }

    #[test]
    fn test_title_is_set() {
        let schema = generate_schema(SchemaTarget::Config).unwrap();
        assert_eq!(schema["title"], "auditview Configuration");
    }

    #[tokio::test]
    async fn test_writes_yaml_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        let cmd = SchemaCommand {
            target: SchemaTarget::ReportFilters,
            format: SchemaFormat::Yaml,
            output: Some(path.clone()),
            pretty: false,
        };
        cmd.execute().await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("reportType"));
    }
}
