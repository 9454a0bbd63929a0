//! Per-pipeline run statistics.
//!
//! A [`LoadStatistic`] is created with its pipeline, stamped with wall-clock
//! start and end times around the run, and merged into downstream pipelines
//! when a child (sort, group-by, exchange, inject) finishes.
//!
//! # Example
//!
//! ```
//! use rowflow::*;
//!
//! # fn main() -> rowflow::Result<()> {
//! let stats = from_rows(vec![
//!     row! { "age" => "30" },
//!     row! { "age" => "abc" },
//! ])
//! .as_int("age")
//! .go()?;
//!
//! assert_eq!(stats.loaded(), 1);
//! assert_eq!(stats.rejections_in(RejectionCategory::InvalidFormat), 1);
//! # Ok(())
//! # }
//! ```

use crate::row::{Rejection, RejectionCategory};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Timing bucket that holds the time spent in completion callbacks.
pub const DONE_CALLBACKS: &str = "Done Callbacks";

#[derive(Clone, Debug, Serialize)]
pub struct LoadStatistic {
    name: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    loaded: u64,
    rejections: BTreeMap<RejectionCategory, BTreeMap<String, u64>>,
    #[serde(serialize_with = "timings_as_millis")]
    step_timings: BTreeMap<String, Duration>,
    #[serde(skip)]
    marker: Option<Instant>,
}

impl LoadStatistic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            end: None,
            loaded: 0,
            rejections: BTreeMap::new(),
            step_timings: BTreeMap::new(),
            marker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Stamp the start of a run and reset the elapsed-time marker.
    pub fn mark_start(&mut self) {
        self.start = Some(Utc::now());
        self.mark();
    }

    pub fn mark_end(&mut self) {
        self.end = Some(Utc::now());
    }

    pub fn mark(&mut self) {
        self.marker = Some(Instant::now());
    }

    /// Time since the last [`mark`](Self::mark), zero if never marked.
    pub fn elapsed(&self) -> Duration {
        self.marker.map(|m| m.elapsed()).unwrap_or_default()
    }

    /// Wall-clock duration between start and end, if both were stamped.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    pub fn increment_loaded(&mut self) {
        self.loaded += 1;
    }

    /// Count a routed rejection under its category and step.
    pub fn reject(&mut self, rejection: &Rejection) {
        let step = rejection.step.clone().unwrap_or_default();
        *self
            .rejections
            .entry(rejection.category)
            .or_default()
            .entry(step)
            .or_insert(0) += 1;
    }

    /// Total rejections across every category and step.
    pub fn rejections(&self) -> u64 {
        self.rejections.values().flat_map(|steps| steps.values()).sum()
    }

    pub fn rejections_in(&self, category: RejectionCategory) -> u64 {
        self.rejections
            .get(&category)
            .map(|steps| steps.values().sum())
            .unwrap_or(0)
    }

    pub fn rejections_at(&self, category: RejectionCategory, step: &str) -> u64 {
        self.rejections
            .get(&category)
            .and_then(|steps| steps.get(step))
            .copied()
            .unwrap_or(0)
    }

    pub fn rejections_by_category(&self) -> &BTreeMap<RejectionCategory, BTreeMap<String, u64>> {
        &self.rejections
    }

    pub fn step_timings(&self) -> &BTreeMap<String, Duration> {
        &self.step_timings
    }

    /// Add `elapsed` to the running total for `name`.
    pub fn record_timing(&mut self, name: &str, elapsed: Duration) {
        match self.step_timings.get_mut(name) {
            Some(total) => *total += elapsed,
            None => {
                self.step_timings.insert(name.to_string(), elapsed);
            }
        }
    }

    /// Run `f`, charging its wall time to `name`.
    pub fn timed<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        self.step_timings.entry(name.to_string()).or_default();
        let started = Instant::now();
        let out = f();
        self.record_timing(name, started.elapsed());
        out
    }

    /// Average time per processed row for `name`.
    ///
    /// `None` when the step is unknown or no row has been processed yet;
    /// reports render that as `n/a`.
    pub fn avg(&self, name: &str) -> Option<Duration> {
        let total = self.step_timings.get(name)?;
        let processed = self.loaded + self.rejections();
        if processed == 0 {
            return None;
        }
        let processed = u32::try_from(processed).unwrap_or(u32::MAX);
        Some(*total / processed)
    }

    /// Merge `other` into this statistic.
    ///
    /// - `start` is taken from `other`.
    /// - Rejection counts are added per category and step.
    /// - Timings only fill in steps this statistic has not seen; existing
    ///   entries are left untouched.
    pub fn copy(&mut self, other: &LoadStatistic) {
        self.start = other.start;
        for (category, steps) in &other.rejections {
            let mine = self.rejections.entry(*category).or_default();
            for (step, count) in steps {
                *mine.entry(step.clone()).or_insert(0) += count;
            }
        }
        for (step, elapsed) in &other.step_timings {
            self.step_timings.entry(step.clone()).or_insert(*elapsed);
        }
    }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}

fn timings_as_millis<S: Serializer>(
    timings: &BTreeMap<String, Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        timings
            .iter()
            .map(|(step, d)| (step, d.as_secs_f64() * 1000.0)),
    )
}

impl fmt::Display for LoadStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.step_timings.is_empty() {
            writeln!(f, "----")?;
            writeln!(f, "Step Timings")?;
            for step in self.step_timings.keys() {
                match self.avg(step) {
                    Some(avg) => writeln!(f, "{step}: {:.2} ms", avg.as_secs_f64() * 1000.0)?,
                    None => writeln!(f, "{step}: n/a")?,
                }
            }
        }
        if self.rejections() > 0 {
            writeln!(f, "----")?;
            writeln!(f, "Rejections by category")?;
            for (category, steps) in &self.rejections {
                writeln!(f, "{category}: {}", steps.values().sum::<u64>())?;
                for (step, count) in steps {
                    writeln!(f, "\t{step}: {count}")?;
                }
            }
        }
        writeln!(f, "----")?;
        writeln!(f, "==> {}", self.name)?;
        writeln!(f, "loaded {}", self.loaded)?;
        writeln!(f, "rejected {}", self.rejections())?;
        match self.duration() {
            Some(d) => write!(f, "took {} ms", d.as_millis()),
            None => write!(f, "took n/a"),
        }
    }
}
