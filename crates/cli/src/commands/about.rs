//! About command - record what is needed to reproduce a run

use anyhow::{Context, Result};
use labkit_adapters::source_control::GitCommand;
use labkit_domain::usecases::{AboutConfig, RunInfoCollector};
use labkit_domain::{ProcessContext, SystemClock};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::args::AboutArgs;
use crate::config::AppConfig;

pub async fn execute(args: AboutArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let extra = parse_fields(&args.set)?;

    let source_control =
        GitCommand::new(Duration::from_secs(config.about.git_timeout_secs));
    let collector = RunInfoCollector::new(
        source_control,
        SystemClock,
        AboutConfig {
            root: args.root.unwrap_or_else(|| PathBuf::from(".")),
            git_excludes: config.about.git_excludes.clone(),
        },
    );

    let info = collector
        .collect(args.args, extra, ProcessContext::current())
        .await
        .context("Failed to read repository state")?;

    let json = serde_json::to_string_pretty(&info).context("Failed to serialize output")?;
    println!("{}", json);

    Ok(())
}

/// Parse `KEY=VALUE` pairs, reading VALUE as JSON and falling back to a string
fn parse_fields(fields: &[String]) -> Result<BTreeMap<String, serde_json::Value>> {
    fields
        .iter()
        .map(|field| {
            let (key, raw) = field
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", field))?;
            if key.is_empty() {
                anyhow::bail!("Empty key in '{}'", field);
            }
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}
