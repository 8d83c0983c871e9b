//! Size command - deep in-memory size of JSON documents

use anyhow::{Context, Result};
use labkit_domain::Value;
use labkit_domain::size::{deep_size_of, memory_report};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::args::SizeArgs;

#[derive(Debug, Serialize)]
struct SizeReport {
    /// Estimated bytes per input path
    sizes: BTreeMap<String, usize>,
    total: usize,
}

pub async fn execute(args: SizeArgs) -> Result<()> {
    let mut documents = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        documents.push((path.display().to_string(), Value::from(document)));
    }

    tracing::info!(documents = documents.len(), "Measuring documents");

    if args.json {
        let sizes: BTreeMap<String, usize> = documents
            .iter()
            .map(|(name, value)| (name.clone(), deep_size_of(value)))
            .collect();
        let report = SizeReport {
            total: sizes.values().sum(),
            sizes,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        let entries: Vec<(&str, &Value)> = documents
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        print!("{}", memory_report(&entries));
    }

    Ok(())
}
