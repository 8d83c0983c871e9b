//! Terminal progress line rendering and refresh scheduling

use serde::{Deserialize, Serialize};

use crate::duration::format_elapsed;
use crate::numfmt::general_compact;

/// Target number of redraws per second
pub const UPDATES_PER_SECOND: f64 = 10.0;

/// Appearance of a progress line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStyle {
    pub prefix: String,
    pub suffix: String,
    /// Decimals shown in the percentage
    pub decimals: usize,
    /// Width of the bar in characters
    pub width: usize,
    pub fill: char,
}

impl Default for ProgressStyle {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            decimals: 1,
            width: 20,
            fill: '█',
        }
    }
}

/// Measurements shown on one progress line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub iteration: u64,
    pub total: u64,
    /// Seconds since start
    pub elapsed: f64,
    /// Estimated seconds remaining
    pub eta: f64,
    /// Iterations per second
    pub rate: f64,
}

impl ProgressSnapshot {
    /// Snapshot after `iteration` items, estimating the remaining time
    pub fn measure(iteration: u64, total: u64, elapsed: f64) -> Self {
        let rate = if elapsed > 0.0 {
            iteration as f64 / elapsed
        } else {
            0.0
        };
        let eta = if rate > 0.0 {
            total.saturating_sub(iteration) as f64 / rate
        } else {
            0.0
        };
        Self {
            iteration,
            total,
            elapsed,
            eta,
            rate,
        }
    }
}

impl ProgressStyle {
    /// Render a line starting with a carriage return
    ///
    /// An unknown or zero total renders as complete.
    pub fn render(&self, snapshot: &ProgressSnapshot) -> String {
        let fraction = if snapshot.total == 0 {
            1.0
        } else {
            snapshot.iteration as f64 / snapshot.total as f64
        };
        let filled = if snapshot.total == 0 {
            self.width
        } else {
            ((self.width as u128 * snapshot.iteration as u128) / snapshot.total as u128) as usize
        }
        .min(self.width);

        let bar: String = std::iter::repeat_n(self.fill, filled)
            .chain(std::iter::repeat_n('-', self.width - filled))
            .collect();
        let percent = format!(
            "{:>width$.prec$}%",
            fraction * 100.0,
            width = self.decimals + 4,
            prec = self.decimals
        );

        format!(
            "\r{}|{}| {}{} [{}, ETA {}, {:>9} it/s]",
            self.prefix,
            bar,
            percent,
            self.suffix,
            format_elapsed(snapshot.elapsed),
            format_elapsed(snapshot.eta),
            general_compact(snapshot.rate),
        )
    }
}

/// Decides which iterations trigger a redraw
///
/// The interval between redraws adapts to the observed rate so that the
/// line refreshes about [`UPDATES_PER_SECOND`] times per second: each
/// redraw replaces the interval with the harmonic mean of the current
/// interval and the interval that would hit the target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSchedule {
    interval: u64,
    previous: Option<u64>,
}

impl Default for UpdateSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSchedule {
    pub fn new() -> Self {
        Self {
            interval: 1,
            previous: None,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    fn distance(&self, index: u64) -> u64 {
        match self.previous {
            Some(previous) => index.saturating_sub(previous),
            None => index + 1,
        }
    }

    /// Whether the item at zero-based `index` should trigger a redraw
    pub fn is_due(&self, index: u64) -> bool {
        self.distance(index) == self.interval
    }

    /// Record a redraw at `index`, `since_last` seconds after the previous one
    pub fn record(&mut self, index: u64, since_last: f64) {
        let steps = self.distance(index) as f64;
        let rate = if since_last > 0.0 {
            steps / since_last
        } else {
            f64::INFINITY
        };

        let next = 2.0 / (1.0 / self.interval as f64 + UPDATES_PER_SECOND / rate);
        self.interval = (next.round_ties_even() as u64).max(1);
        self.previous = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_half_way() {
        let style = ProgressStyle::default();
        let snapshot = ProgressSnapshot {
            iteration: 5,
            total: 10,
            elapsed: 1.0,
            eta: 1.0,
            rate: 5.0,
        };
        assert_eq!(
            style.render(&snapshot),
            "\r|██████████----------|  50.0% [0:00:01.00, ETA 0:00:01.00,     5.000 it/s]"
        );
    }

    #[test]
    fn test_render_with_prefix_and_decimals() {
        let style = ProgressStyle {
            prefix: "hashing ".to_string(),
            suffix: " done".to_string(),
            decimals: 0,
            width: 4,
            fill: '#',
        };
        let snapshot = ProgressSnapshot::measure(4, 4, 2.0);
        assert_eq!(
            style.render(&snapshot),
            "\rhashing |####|  100% done [0:00:02.00, ETA 0:00:00.00,     2.000 it/s]"
        );
    }

    #[test]
    fn test_render_zero_total_is_complete() {
        let style = ProgressStyle {
            width: 3,
            ..Default::default()
        };
        let line = style.render(&ProgressSnapshot::measure(0, 0, 0.0));
        assert!(line.contains("|███|"));
        assert!(line.contains("100.0%"));
    }

    #[test]
    fn test_measure_estimates_eta() {
        let snapshot = ProgressSnapshot::measure(25, 100, 5.0);
        assert_eq!(snapshot.rate, 5.0);
        assert_eq!(snapshot.eta, 15.0);

        let start = ProgressSnapshot::measure(0, 100, 0.0);
        assert_eq!(start.rate, 0.0);
        assert_eq!(start.eta, 0.0);
    }

    #[test]
    fn test_schedule_starts_with_every_item() {
        let schedule = UpdateSchedule::new();
        assert!(schedule.is_due(0));
        assert!(!schedule.is_due(1));
    }

    #[test]
    fn test_schedule_grows_for_fast_iteration() {
        let mut schedule = UpdateSchedule::new();
        // One item took a microsecond: far faster than ten redraws per second.
        schedule.record(0, 1e-6);
        assert_eq!(schedule.interval(), 2);
        assert!(schedule.is_due(2));

        schedule.record(2, 2e-6);
        assert_eq!(schedule.interval(), 4);
    }

    #[test]
    fn test_schedule_shrinks_for_slow_iteration() {
        let mut schedule = UpdateSchedule::new();
        schedule.record(0, 1e-6);
        schedule.record(2, 1e-6);
        assert_eq!(schedule.interval(), 4);

        // Four items took two seconds: redraw on every item again.
        schedule.record(6, 2.0);
        assert_eq!(schedule.interval(), 1);
    }
}
