//! Time dimensions of published layers.
//!
//! A layer's time axis is either an explicit list of timestamps ([`StepTimeDimension`])
//! or a set of regular `start/end/resolution` intervals ([`IntervalTimeDimension`]).
//! Forecast layers carry one such dimension per model run; [`TimeDimensions`]
//! aggregates them keyed by reference time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use crate::time::{format_duration, format_timestamp, TimeParseError};

/// Minimum number of evenly spaced timesteps published as an interval.
const MIN_INTERVAL_STEPS: usize = 3;

/// One `start/end/resolution` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    resolution_minutes: i64,
}

impl TimeInterval {
    /// Requires `start <= end` and a positive resolution.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resolution_minutes: i64,
    ) -> Result<Self, TimeParseError> {
        if end < start {
            return Err(TimeParseError::InvalidInterval(format!(
                "{}/{}",
                format_timestamp(&start),
                format_timestamp(&end)
            )));
        }
        if resolution_minutes <= 0 {
            return Err(TimeParseError::MalformedDuration(format_duration(
                resolution_minutes,
            )));
        }
        Ok(Self {
            start,
            end,
            resolution_minutes,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn resolution_minutes(&self) -> i64 {
        self.resolution_minutes
    }

    fn resolution_seconds(&self) -> i64 {
        self.resolution_minutes * 60
    }

    /// Aligned membership, with the end optionally clamped to `limit`.
    fn contains(&self, t: DateTime<Utc>, limit: Option<DateTime<Utc>>) -> bool {
        let end = limit.map_or(self.end, |l| l.min(self.end));
        if t < self.start || t > end {
            return false;
        }
        let offset = t - self.start;
        offset.subsec_nanos() == 0 && offset.num_seconds() % self.resolution_seconds() == 0
    }

    /// Last aligned step not after `limit`.
    fn last_step_before(&self, limit: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let end = limit.min(self.end);
        if end < self.start {
            return None;
        }
        let steps = (end - self.start).num_seconds() / self.resolution_seconds();
        Duration::try_seconds(steps * self.resolution_seconds())
            .and_then(|d| self.start.checked_add_signed(d))
    }

    /// `start/end/PTnM` as published in capabilities.
    pub fn extent(&self) -> String {
        format!(
            "{}/{}/{}",
            format_timestamp(&self.start),
            format_timestamp(&self.end),
            format_duration(self.resolution_minutes)
        )
    }
}

/// An explicit, strictly increasing set of timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTimeDimension {
    timesteps: Vec<DateTime<Utc>>,
}

impl StepTimeDimension {
    /// Sorts and deduplicates the input. Returns `None` when empty.
    pub fn new(timesteps: impl IntoIterator<Item = DateTime<Utc>>) -> Option<Self> {
        let timesteps: Vec<_> = timesteps
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        (!timesteps.is_empty()).then_some(Self { timesteps })
    }

    pub fn timesteps(&self) -> &[DateTime<Utc>] {
        &self.timesteps
    }
}

/// One or more regular intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTimeDimension {
    intervals: Vec<TimeInterval>,
}

impl IntervalTimeDimension {
    /// Returns `None` when no intervals are given.
    pub fn new(intervals: Vec<TimeInterval>) -> Option<Self> {
        (!intervals.is_empty()).then_some(Self { intervals })
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }
}

/// Time axis of a single generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeDimension {
    Step(StepTimeDimension),
    Interval(IntervalTimeDimension),
}

impl TimeDimension {
    /// Build from backend timesteps, publishing evenly spaced series as an interval.
    pub fn from_timesteps(timesteps: impl IntoIterator<Item = DateTime<Utc>>) -> Option<Self> {
        let steps = StepTimeDimension::new(timesteps)?;
        Some(match even_interval(steps.timesteps()) {
            Some(interval) => TimeDimension::Interval(IntervalTimeDimension {
                intervals: vec![interval],
            }),
            None => TimeDimension::Step(steps),
        })
    }

    pub fn interval(interval: TimeInterval) -> Self {
        TimeDimension::Interval(IntervalTimeDimension {
            intervals: vec![interval],
        })
    }

    /// Validity of `t`. When `limit` is given, nothing after it is valid.
    pub fn is_valid_time(&self, t: DateTime<Utc>, limit: Option<DateTime<Utc>>) -> bool {
        if limit.is_some_and(|l| t > l) {
            return false;
        }
        match self {
            TimeDimension::Step(s) => s.timesteps.binary_search(&t).is_ok(),
            TimeDimension::Interval(i) => i.intervals.iter().any(|iv| iv.contains(t, limit)),
        }
    }

    /// Last valid timestamp, not after `limit` when given.
    pub fn most_current_time(&self, limit: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match (self, limit) {
            (TimeDimension::Step(s), None) => s.timesteps.last().copied(),
            (TimeDimension::Step(s), Some(l)) => {
                s.timesteps.iter().rev().find(|t| **t <= l).copied()
            }
            (TimeDimension::Interval(i), None) => i.intervals.iter().map(|iv| iv.end).max(),
            (TimeDimension::Interval(i), Some(l)) => i
                .intervals
                .iter()
                .filter_map(|iv| iv.last_step_before(l))
                .max(),
        }
    }

    /// Dimension extent as published in capabilities.
    pub fn extent(&self) -> String {
        match self {
            TimeDimension::Step(s) => s
                .timesteps
                .iter()
                .map(format_timestamp)
                .collect::<Vec<_>>()
                .join(","),
            TimeDimension::Interval(i) => i
                .intervals
                .iter()
                .map(TimeInterval::extent)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

fn even_interval(timesteps: &[DateTime<Utc>]) -> Option<TimeInterval> {
    if timesteps.len() < MIN_INTERVAL_STEPS {
        return None;
    }
    let step = timesteps[1] - timesteps[0];
    let even = timesteps.windows(2).all(|w| w[1] - w[0] == step);
    if !even || step.num_seconds() % 60 != 0 || step.subsec_nanos() != 0 {
        return None;
    }
    TimeInterval::new(timesteps[0], timesteps[timesteps.len() - 1], step.num_minutes()).ok()
}

/// Key of a generation: the model run's reference time, when the backend has one.
pub type GenerationKey = Option<DateTime<Utc>>;

/// All generations of a layer's time axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDimensions {
    generations: BTreeMap<GenerationKey, TimeDimension>,
    wall_clock_end: bool,
}

impl TimeDimensions {
    /// A single generation without a reference time.
    pub fn single(dimension: TimeDimension) -> Self {
        Self {
            generations: BTreeMap::from([(None, dimension)]),
            wall_clock_end: false,
        }
    }

    /// One dimension per reference time. Returns `None` when empty.
    pub fn from_generations(
        generations: impl IntoIterator<Item = (DateTime<Utc>, TimeDimension)>,
    ) -> Option<Self> {
        let generations: BTreeMap<_, _> = generations
            .into_iter()
            .map(|(reference, dim)| (Some(reference), dim))
            .collect();
        (!generations.is_empty()).then_some(Self {
            generations,
            wall_clock_end: false,
        })
    }

    /// Observation periods end at the present, not at their nominal end.
    pub fn with_wall_clock_end(mut self) -> Self {
        self.wall_clock_end = true;
        self
    }

    pub fn uses_wall_clock_end(&self) -> bool {
        self.wall_clock_end
    }

    fn limit(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.wall_clock_end.then_some(now)
    }

    /// The latest generation by reference time.
    pub fn default_generation(&self) -> Option<&TimeDimension> {
        self.generations.values().next_back()
    }

    fn select(&self, reference: Option<DateTime<Utc>>) -> Option<&TimeDimension> {
        match reference {
            Some(r) => self.generations.get(&Some(r)),
            None => self.default_generation(),
        }
    }

    pub fn is_valid_reference_time(&self, reference: DateTime<Utc>) -> bool {
        self.generations.contains_key(&Some(reference))
    }

    /// Reference times of all generations, oldest first.
    pub fn reference_times(&self) -> Vec<DateTime<Utc>> {
        self.generations.keys().flatten().copied().collect()
    }

    pub fn is_valid_time(&self, t: DateTime<Utc>, reference: Option<DateTime<Utc>>) -> bool {
        self.is_valid_time_at(t, reference, Utc::now())
    }

    pub fn is_valid_time_at(
        &self,
        t: DateTime<Utc>,
        reference: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.select(reference)
            .is_some_and(|dim| dim.is_valid_time(t, self.limit(now)))
    }

    /// True when `current` can be resolved to a timestamp.
    pub fn current_value(&self) -> bool {
        !self.generations.is_empty()
    }

    pub fn most_current_time(&self, reference: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        self.most_current_time_at(reference, Utc::now())
    }

    /// Most current time of the referenced generation, or of the latest one.
    pub fn most_current_time_at(
        &self,
        reference: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.select(reference)?.most_current_time(self.limit(now))
    }

    /// Extent of the default generation.
    pub fn extent(&self) -> Option<String> {
        self.default_generation().map(TimeDimension::extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_step_membership() {
        let times = [utc(1, 0, 0), utc(1, 3, 0), utc(1, 4, 0), utc(2, 0, 0)];
        let dim = TimeDimension::Step(StepTimeDimension::new(times).unwrap());

        for t in times {
            assert!(dim.is_valid_time(t, None));
        }
        assert!(!dim.is_valid_time(utc(1, 1, 0), None));
        assert!(!dim.is_valid_time(utc(1, 3, 30), None));
        assert_eq!(dim.most_current_time(None), Some(utc(2, 0, 0)));
    }

    #[test]
    fn test_step_deduplicates() {
        let dim = StepTimeDimension::new([utc(1, 2, 0), utc(1, 1, 0), utc(1, 2, 0)]).unwrap();
        assert_eq!(dim.timesteps(), &[utc(1, 1, 0), utc(1, 2, 0)]);
        assert!(StepTimeDimension::new([]).is_none());
    }

    #[test]
    fn test_interval_alignment() {
        let iv = TimeInterval::new(utc(1, 0, 0), utc(1, 6, 0), 60).unwrap();
        let dim = TimeDimension::interval(iv);

        assert!(dim.is_valid_time(utc(1, 0, 0), None));
        assert!(dim.is_valid_time(utc(1, 6, 0), None));
        assert!(dim.is_valid_time(utc(1, 3, 0), None));
        assert!(!dim.is_valid_time(utc(1, 3, 30), None));
        assert!(!dim.is_valid_time(utc(1, 7, 0), None));
        assert!(!dim.is_valid_time(utc(1, 0, 0) - Duration::hours(1), None));
        assert_eq!(dim.most_current_time(None), Some(utc(1, 6, 0)));
    }

    #[test]
    fn test_interval_invariants() {
        assert!(TimeInterval::new(utc(2, 0, 0), utc(1, 0, 0), 60).is_err());
        assert!(TimeInterval::new(utc(1, 0, 0), utc(2, 0, 0), 0).is_err());
    }

    #[test]
    fn test_interval_detection() {
        let even = TimeDimension::from_timesteps([utc(1, 0, 0), utc(1, 1, 0), utc(1, 2, 0)]);
        assert_eq!(even.unwrap().extent(), "2024-01-01T00:00:00Z/2024-01-01T02:00:00Z/PT1H");

        let uneven = TimeDimension::from_timesteps([utc(1, 0, 0), utc(1, 1, 0), utc(1, 3, 0)]);
        assert!(matches!(uneven, Some(TimeDimension::Step(_))));

        let short = TimeDimension::from_timesteps([utc(1, 0, 0), utc(1, 1, 0)]);
        assert!(matches!(short, Some(TimeDimension::Step(_))));
    }

    #[test]
    fn test_latest_generation_wins() {
        // The older run reaches further into the future.
        let old_run = TimeDimension::interval(
            TimeInterval::new(utc(1, 0, 0), utc(5, 0, 0), 60).unwrap(),
        );
        let new_run = TimeDimension::interval(
            TimeInterval::new(utc(1, 12, 0), utc(3, 0, 0), 60).unwrap(),
        );
        let dims =
            TimeDimensions::from_generations([(utc(1, 0, 0), old_run), (utc(1, 12, 0), new_run)])
                .unwrap();

        assert_eq!(dims.most_current_time(None), Some(utc(3, 0, 0)));
        assert_eq!(dims.most_current_time(Some(utc(1, 0, 0))), Some(utc(5, 0, 0)));
        assert_eq!(dims.most_current_time(Some(utc(1, 6, 0))), None);

        assert!(dims.is_valid_reference_time(utc(1, 12, 0)));
        assert!(!dims.is_valid_reference_time(utc(1, 6, 0)));

        assert!(dims.is_valid_time(utc(4, 0, 0), Some(utc(1, 0, 0))));
        assert!(!dims.is_valid_time(utc(4, 0, 0), None));
    }

    #[test]
    fn test_wall_clock_end() {
        let period = TimeInterval::new(utc(1, 0, 0), utc(10, 0, 0), 10).unwrap();
        let dims = TimeDimensions::single(TimeDimension::interval(period)).with_wall_clock_end();
        let now = utc(2, 12, 34);

        assert_eq!(dims.most_current_time_at(None, now), Some(utc(2, 12, 30)));
        assert!(dims.is_valid_time_at(utc(2, 12, 30), None, now));
        assert!(!dims.is_valid_time_at(utc(2, 12, 40), None, now));
    }
}
