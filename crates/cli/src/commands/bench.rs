//! Bench command - time an external command

use anyhow::{Context, Result, bail};
use labkit_adapters::progress::ProgressIteratorExt;
use labkit_domain::numfmt::general;
use labkit_domain::timing::{TimeitOptions, Timed, timeit_with};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::args::BenchArgs;
use crate::config::AppConfig;

pub async fn execute(args: BenchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let options = TimeitOptions {
        number: args.number.or(config.bench.number),
        repeat: args.repeat.unwrap_or(config.bench.repeat),
    };
    let show_progress = args.progress || config.bench.progress;
    let style = config.progress.style();
    let command = args.command;

    // Fail fast on a command that cannot run at all
    run_once(&command).with_context(|| format!("Command failed: {}", command.join(" ")))?;

    tracing::info!(
        command = %command.join(" "),
        number = ?options.number,
        repeat = options.repeat,
        "Benchmarking"
    );

    let timed = tokio::task::spawn_blocking(move || -> Result<Timed> {
        let mut failure = None;
        let stmt = || {
            if failure.is_some() {
                return;
            }
            if let Err(e) = run_once(&command) {
                failure = Some(e);
            }
        };

        let timed = if show_progress {
            timeit_with(stmt, || {}, options, |repeats| {
                repeats.progress(io::stderr(), style)
            })
        } else {
            timeit_with(stmt, || {}, options, |repeats| repeats)
        }
        .context("Invalid timing options")?;

        if let Some(e) = failure {
            return Err(e.context("Command failed during timing"));
        }
        Ok(timed)
    })
    .await
    .context("Benchmark task panicked")??;

    if args.json {
        let json = serde_json::to_string_pretty(&timed).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        println!("{}", describe(&timed));
    }

    Ok(())
}

fn run_once(command: &[String]) -> Result<()> {
    let Some((program, rest)) = command.split_first() else {
        bail!("No command given");
    };

    let status = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("Failed to spawn {}", program))?;

    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(())
}

fn describe(timed: &Timed) -> String {
    format!(
        "{} s per run (q16 {} s, q84 {} s, mean {} s ± {} s) over {} repeats of {} runs",
        general(timed.time, 4),
        general(timed.q16, 4),
        general(timed.q84, 4),
        general(timed.mean, 4),
        general(timed.std, 4),
        timed.repeat,
        timed.number
    )
}
