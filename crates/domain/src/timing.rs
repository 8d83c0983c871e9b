//! Microbenchmark timing with summary statistics

use std::ops::Range;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum batch duration that ends auto-ranging
pub const AUTORANGE_TARGET: Duration = Duration::from_millis(200);

/// Summary of repeated timing runs, all times in seconds per loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timed {
    /// Headline figure, equal to the median
    pub time: f64,
    /// Loops per repeat
    pub number: u64,
    pub repeat: usize,
    pub median: f64,
    /// 16th percentile
    pub q16: f64,
    /// 84th percentile
    pub q84: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

/// Statistics over per-loop samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub median: f64,
    pub q16: f64,
    pub q84: f64,
    pub mean: f64,
    pub std: f64,
}

impl TimingStats {
    /// Summarize samples; `None` when there are none
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            median: quantile(&sorted, 0.5),
            q16: quantile(&sorted, 0.16),
            q84: quantile(&sorted, 0.84),
            mean,
            std: variance.sqrt(),
        })
    }
}

/// Linear-interpolated quantile of sorted, non-empty samples
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Options for [`timeit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeitOptions {
    /// Loops per repeat; auto-ranged when `None`
    pub number: Option<u64>,
    pub repeat: usize,
}

impl Default for TimeitOptions {
    fn default() -> Self {
        Self {
            number: None,
            repeat: 7,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    #[error("repeat must be at least 1")]
    ZeroRepeat,
    #[error("number of loops must be at least 1")]
    ZeroNumber,
}

/// Time `number` back-to-back calls of `stmt`
pub fn time_batch<S: FnMut()>(stmt: &mut S, number: u64) -> Duration {
    let start = Instant::now();
    for _ in 0..number {
        stmt();
    }
    start.elapsed()
}

/// Find a loop count whose batch takes at least [`AUTORANGE_TARGET`]
///
/// Tries 1, 2, 5, 10, 20, 50, ... and returns the first count reaching the
/// target together with the time that batch took.
pub fn autorange<S: FnMut()>(stmt: &mut S) -> (u64, Duration) {
    let mut scale: u64 = 1;
    loop {
        for step in [1, 2, 5] {
            let number = scale.saturating_mul(step);
            let taken = time_batch(stmt, number);
            if taken >= AUTORANGE_TARGET || number == u64::MAX {
                return (number, taken);
            }
        }
        scale = scale.saturating_mul(10);
    }
}

/// Benchmark `stmt`, reporting seconds per loop over several repeats
///
/// `setup` runs once, after auto-ranging and before the timed repeats.
pub fn timeit<S, F>(stmt: S, setup: F, options: TimeitOptions) -> Result<Timed, TimingError>
where
    S: FnMut(),
    F: FnOnce(),
{
    timeit_with(stmt, setup, options, |repeats| repeats)
}

/// Like [`timeit`], driving the repeats through `wrap`
///
/// `wrap` receives the range of repeat indices and may decorate it, for
/// instance with a progress bar. Only the items it yields are timed.
pub fn timeit_with<S, F, W, R>(
    mut stmt: S,
    setup: F,
    options: TimeitOptions,
    wrap: W,
) -> Result<Timed, TimingError>
where
    S: FnMut(),
    F: FnOnce(),
    W: FnOnce(Range<usize>) -> R,
    R: Iterator<Item = usize>,
{
    if options.repeat == 0 {
        return Err(TimingError::ZeroRepeat);
    }
    let number = match options.number {
        Some(0) => return Err(TimingError::ZeroNumber),
        Some(number) => number,
        None => autorange(&mut stmt).0,
    };

    setup();

    let samples: Vec<f64> = wrap(0..options.repeat)
        .map(|_| time_batch(&mut stmt, number).as_secs_f64() / number as f64)
        .collect();

    tracing::debug!(number, repeat = samples.len(), "Timing complete");

    let stats = TimingStats::from_samples(&samples).ok_or(TimingError::ZeroRepeat)?;
    Ok(Timed {
        time: stats.median,
        number,
        repeat: samples.len(),
        median: stats.median,
        q16: stats.q16,
        q84: stats.q84,
        mean: stats.mean,
        std: stats.std,
    })
}
