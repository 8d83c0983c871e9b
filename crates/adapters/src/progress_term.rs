//! Terminal progress bar wrapping an iterator

use labkit_domain::progress::{ProgressSnapshot, ProgressStyle, UpdateSchedule};
use std::io::Write;
use std::time::Instant;
use thiserror::Error;

/// Error type for progress output
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Failed to write progress line: {0}")]
    Io(#[from] std::io::Error),
}

/// Iterator adaptor that redraws a progress line while items are consumed
///
/// The initial line is drawn before the first item is handed out, refreshes
/// follow the adaptive [`UpdateSchedule`], and the final line is terminated
/// with a newline once the inner iterator is exhausted. After a failed write
/// the bar stops drawing and the error is kept for [`ProgressBar::take_error`].
pub struct ProgressBar<I, W: Write> {
    inner: I,
    writer: W,
    style: ProgressStyle,
    schedule: UpdateSchedule,
    total: u64,
    started: Option<Instant>,
    last_draw: Option<Instant>,
    /// Index of the item handed out by the previous `next` call
    pending: Option<u64>,
    yielded: u64,
    finished: bool,
    error: Option<ProgressError>,
}

impl<I: Iterator, W: Write> ProgressBar<I, W> {
    /// Wrap `iter`, taking the total from its exact size hint when it has one
    pub fn new<T>(iter: T, writer: W, style: ProgressStyle) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        let inner = iter.into_iter();
        let total = match inner.size_hint() {
            (lower, Some(upper)) if lower == upper => lower as u64,
            _ => 0,
        };
        Self {
            inner,
            writer,
            style,
            schedule: UpdateSchedule::new(),
            total,
            started: None,
            last_draw: None,
            pending: None,
            yielded: 0,
            finished: false,
            error: None,
        }
    }

    /// Override the number of items the bar counts towards
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// First write error, if any occurred
    pub fn take_error(&mut self) -> Option<ProgressError> {
        self.error.take()
    }

    /// Give back the writer
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn draw(&mut self, snapshot: &ProgressSnapshot, newline: bool) {
        if self.error.is_some() {
            return;
        }
        let line = self.style.render(snapshot);
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| {
                if newline {
                    self.writer.write_all(b"\n")
                } else {
                    Ok(())
                }
            })
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, "Progress output failed, disabling progress bar");
            self.error = Some(e.into());
        }
    }

    /// Redraw if the previously handed-out item is due
    fn check_pending(&mut self, now: Instant) {
        let (Some(index), Some(started), Some(last_draw)) =
            (self.pending.take(), self.started, self.last_draw)
        else {
            return;
        };
        if !self.schedule.is_due(index) {
            return;
        }

        let since_last = now.duration_since(last_draw).as_secs_f64();
        self.schedule.record(index, since_last);
        self.last_draw = Some(now);

        let elapsed = now.duration_since(started).as_secs_f64();
        let snapshot = ProgressSnapshot::measure(index + 1, self.total, elapsed);
        self.draw(&snapshot, false);
    }

    fn finish(&mut self, now: Instant) {
        self.finished = true;
        let elapsed = self
            .started
            .map(|started| now.duration_since(started).as_secs_f64())
            .unwrap_or(0.0);
        let total = self.total.max(self.yielded);
        let mut snapshot = ProgressSnapshot::measure(total, total, elapsed);
        snapshot.eta = 0.0;
        self.draw(&snapshot, true);
    }
}

impl<I: Iterator, W: Write> Iterator for ProgressBar<I, W> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let now = Instant::now();
        if self.started.is_none() {
            self.started = Some(now);
            self.last_draw = Some(now);
            let snapshot = ProgressSnapshot {
                iteration: 0,
                total: self.total,
                elapsed: 0.0,
                eta: 0.0,
                rate: 0.0,
            };
            self.draw(&snapshot, false);
        } else {
            self.check_pending(now);
        }

        match self.inner.next() {
            Some(item) => {
                self.pending = Some(self.yielded);
                self.yielded += 1;
                Some(item)
            }
            None => {
                self.finish(Instant::now());
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            self.inner.size_hint()
        }
    }
}

/// Extension trait to attach a progress bar to any iterator
pub trait ProgressIteratorExt: Iterator + Sized {
    fn progress<W: Write>(self, writer: W, style: ProgressStyle) -> ProgressBar<Self, W> {
        ProgressBar::new(self, writer, style)
    }
}

impl<I: Iterator> ProgressIteratorExt for I {}
