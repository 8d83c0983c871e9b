//! Duration command - parse compact duration expressions

use anyhow::{Context, Result};
use labkit_domain::duration::{format_elapsed, parse_duration};
use serde::Serialize;

use crate::args::DurationArgs;

#[derive(Debug, Serialize)]
struct DurationReport {
    input: String,
    seconds: f64,
    formatted: String,
}

pub async fn execute(args: DurationArgs) -> Result<()> {
    let duration = parse_duration(&args.expr)
        .with_context(|| format!("Invalid duration: {}", args.expr))?;
    let seconds = duration.as_seconds_f64();

    let report = DurationReport {
        input: args.expr,
        seconds,
        formatted: format_elapsed(seconds),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        println!("{} ({} s)", report.formatted, report.seconds);
    }

    Ok(())
}
