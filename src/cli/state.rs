//! State command: validates a persisted view state and prints it normalized

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};

use auditview::config::Config;
use auditview::view::{FeatureKey, ValidationError, ViewStateSchema};

#[derive(Debug, Args)]
pub struct StateCommand {
    /// Feature the state belongs to
    pub feature: FeatureKey,

    /// Persisted state (JSON, or YAML by extension)
    pub file: PathBuf,

    /// Fall back to defaults instead of failing on invalid input
    #[arg(long)]
    pub lenient: bool,

    /// Pretty print the output
    #[arg(short, long)]
    pub pretty: bool,
}

impl StateCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let input = read_document(&self.file).await?;
        let schema = ViewStateSchema::new(self.feature).with_page_size(config.page_size);

        match self.normalize(&schema, &input) {
            Ok(state) => {
                let output = if self.pretty {
                    serde_json::to_string_pretty(&state)?
                } else {
                    serde_json::to_string(&state)?
                };
                println!("{}", output);
                Ok(())
            }
            Err(err) => {
                println!("Invalid {} view state:", self.feature);
                for error in &err.errors {
                    let path = if error.path.is_empty() { "(root)" } else { error.path.as_str() };
                    println!("  - {}: {}", path, error.reason);
                }
                Err(anyhow!("{} field(s) failed validation", err.errors.len()))
            }
        }
    }

    fn normalize(&self, schema: &ViewStateSchema, input: &Value) -> Result<Value, ValidationError> {
        let state = if self.lenient {
            schema.restore(input)
        } else {
            schema.parse(input)?
        };
        Ok(schema.serialize(&state))
    }
}

/// Read a JSON or YAML document, chosen by file extension
pub(crate) async fn read_document(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read: {}", path.display()))?;

    let is_yaml = matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml" | "yml"));
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse YAML: {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn cmd(feature: FeatureKey, lenient: bool) -> StateCommand {
        StateCommand {
            feature,
            file: PathBuf::new(),
            lenient,
            pretty: false,
        }
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let schema = ViewStateSchema::new(FeatureKey::Reports);
        let value = cmd(FeatureKey::Reports, false)
            .normalize(&schema, &json!({"currentPage": 2, "legacyView": "table"}))
            .unwrap();
        assert_eq!(value["currentPage"], 2);
        assert_eq!(value["sortBy"], "createdAt");
        assert!(value.get("legacyView").is_none());
    }

    #[test]
    fn test_strict_and_lenient() {
        let schema = ViewStateSchema::new(FeatureKey::Devices);
        let input = json!({"currentPage": 0, "pageSize": 10});

        let err = cmd(FeatureKey::Devices, false).normalize(&schema, &input).unwrap_err();
        assert!(err.touches("currentPage"));

        let value = cmd(FeatureKey::Devices, true).normalize(&schema, &input).unwrap();
        assert_eq!(value["currentPage"], 1);
        assert_eq!(value["pageSize"], 20);
    }

    #[tokio::test]
    async fn test_read_document_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("state.yaml");
        tokio::fs::write(&yaml, "currentPage: 3\nsortDirection: desc\n").await.unwrap();
        let json_file = dir.path().join("state.json");
        tokio::fs::write(&json_file, r#"{"currentPage": 3, "sortDirection": "desc"}"#)
            .await
            .unwrap();

        assert_eq!(read_document(&yaml).await.unwrap(), read_document(&json_file).await.unwrap());
        assert!(read_document(&dir.path().join("missing.json")).await.is_err());
    }
}
