//! Parsing of WMS TIME values and ISO 8601 durations.
//!
//! The TIME grammar is selected by the presence of `,` and `/`:
//! - `2024-01-15T12:00:00Z` or `current`: a single value
//! - `t1,t2,current`: a list of values
//! - `start/end/PT1H`: one interval, where start and end may be `current`
//! - `s1/e1/PT1H,s2/e2/PT30M`: several intervals

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Upper bound for the number of timestamps a TIME expression may expand to.
pub const MAX_TIME_VALUES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Malformed duration: '{0}'")]
    MalformedDuration(String),

    #[error("Invalid interval '{0}': end time is before start time")]
    InvalidInterval(String),

    #[error("Time expression expands to more than {limit} values")]
    TooManyValues { limit: usize },
}

/// Parse a single timestamp.
///
/// A sub-second fraction before a trailing `Z` is discarded, so
/// `2024-01-15T12:00:00.250Z` parses as `2024-01-15T12:00:00Z`.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = strip_fraction(s.trim());

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = s.strip_suffix('Z').unwrap_or(&s);
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y%m%dT%H%M%S", "%Y%m%d%H%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.into_owned()))
}

fn strip_fraction(s: &str) -> std::borrow::Cow<'_, str> {
    if let (Some(dot), Some(z)) = (s.find('.'), s.rfind('Z')) {
        if dot < z {
            return format!("{}{}", &s[..dot], &s[z..]).into();
        }
    }
    s.into()
}

/// Format a timestamp the way it is published in dimension extents.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Durations
// ============================================================================

/// Parse an ISO 8601 duration of the form `P[n]D[T[n]H[n]M[n]S]` into minutes.
///
/// Seconds are floor-divided into minutes. Years, months and weeks are not
/// supported. An absent designator contributes nothing, so `P` alone is 0.
pub fn parse_duration(text: &str) -> Result<i64, TimeParseError> {
    let malformed = || TimeParseError::MalformedDuration(text.to_string());

    if !text.starts_with('P') {
        return Err(malformed());
    }
    if text
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, 'P' | 'D' | 'T' | 'H' | 'M' | 'S')))
    {
        return Err(malformed());
    }

    let t_pos = text.find('T');

    // Time designators must follow T, the day designator must precede it.
    let after_t = |pos: usize| t_pos.is_some_and(|t| pos > t);

    // An M before T is a month.
    if text
        .char_indices()
        .any(|(pos, c)| c == 'M' && !after_t(pos))
    {
        return Err(malformed());
    }

    let days = match text.find('D') {
        Some(pos) if after_t(pos) => return Err(malformed()),
        Some(pos) => designator_value(text, pos).ok_or_else(malformed)?,
        None => 0,
    };

    let time_field = |designator: char| -> Result<i64, TimeParseError> {
        match text.rfind(designator) {
            Some(pos) if !after_t(pos) => Err(malformed()),
            Some(pos) => designator_value(text, pos).ok_or_else(malformed),
            None => Ok(0),
        }
    };

    let hours = time_field('H')?;
    let minutes = time_field('M')?;
    let seconds = time_field('S')?;

    days.checked_mul(1440)
        .and_then(|d| hours.checked_mul(60).and_then(|h| d.checked_add(h)))
        .and_then(|v| v.checked_add(minutes))
        .and_then(|v| v.checked_add(seconds / 60))
        .ok_or_else(malformed)
}

/// Read the run of digits immediately preceding `pos`.
fn designator_value(text: &str, pos: usize) -> Option<i64> {
    if pos == 0 {
        return None;
    }
    let digits_start = text[..pos]
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    if digits_start == pos {
        return None;
    }
    text[digits_start..pos].parse().ok()
}

/// Format a step length in minutes as a duration string (`PT30M`, `PT1H`, `PT1H30M`).
pub fn format_duration(minutes: i64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("PT{}M", m),
        (h, 0) => format!("PT{}H", h),
        (h, m) => format!("PT{}H{}M", h, m),
    }
}

// ============================================================================
// TIME lists
// ============================================================================

/// One endpoint of a TIME interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePoint {
    Current,
    At(DateTime<Utc>),
}

impl TimePoint {
    fn parse(s: &str) -> Result<Self, TimeParseError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") {
            Ok(TimePoint::Current)
        } else {
            parse_timestamp(s).map(TimePoint::At)
        }
    }

    fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimePoint::Current => now,
            TimePoint::At(t) => *t,
        }
    }
}

/// Parsed element of a WMS TIME parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    /// The `current` keyword
    Current,
    /// A literal timestamp
    Single(DateTime<Utc>),
    /// `start/end/resolution`
    Interval {
        start: TimePoint,
        end: TimePoint,
        resolution_minutes: i64,
    },
}

/// Parse a WMS TIME parameter into its elements.
///
/// Intervals whose literal end precedes their start fail with
/// [`TimeParseError::InvalidInterval`]. A zero resolution is accepted and
/// expands to no timestamps at all.
pub fn parse_time_list(text: &str) -> Result<Vec<TimeSpec>, TimeParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimeParseError::InvalidFormat(text.to_string()));
    }

    match (text.contains(','), text.contains('/')) {
        (false, false) => Ok(vec![parse_single(text)?]),
        (true, false) => text.split(',').map(parse_single).collect(),
        (false, true) => Ok(vec![parse_interval(text)?]),
        (true, true) => text.split(',').map(parse_interval).collect(),
    }
}

fn parse_single(s: &str) -> Result<TimeSpec, TimeParseError> {
    Ok(match TimePoint::parse(s)? {
        TimePoint::Current => TimeSpec::Current,
        TimePoint::At(t) => TimeSpec::Single(t),
    })
}

fn parse_interval(s: &str) -> Result<TimeSpec, TimeParseError> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 {
        return Err(TimeParseError::InvalidFormat(s.to_string()));
    }

    let start = TimePoint::parse(parts[0])?;
    let end = TimePoint::parse(parts[1])?;
    let resolution_minutes = parse_duration(parts[2].trim())?;

    if let (TimePoint::At(s_t), TimePoint::At(e_t)) = (start, end) {
        if e_t < s_t {
            return Err(TimeParseError::InvalidInterval(s.to_string()));
        }
    }

    Ok(TimeSpec::Interval {
        start,
        end,
        resolution_minutes,
    })
}

impl TimeSpec {
    /// True for the bare `current` keyword.
    pub fn is_current(&self) -> bool {
        matches!(self, TimeSpec::Current)
    }

    /// Expand into concrete timestamps, resolving `current` to `now`.
    pub fn expand(&self, now: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, TimeParseError> {
        let mut out = Vec::new();
        self.expand_into(now, &mut out)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        now: DateTime<Utc>,
        out: &mut Vec<DateTime<Utc>>,
    ) -> Result<(), TimeParseError> {
        match self {
            TimeSpec::Current => push_limited(out, now),
            TimeSpec::Single(t) => push_limited(out, *t),
            TimeSpec::Interval {
                start,
                end,
                resolution_minutes,
            } => {
                let start = start.resolve(now);
                let end = end.resolve(now);
                if end < start {
                    return Err(TimeParseError::InvalidInterval(format!(
                        "{}/{}",
                        format_timestamp(&start),
                        format_timestamp(&end)
                    )));
                }
                if *resolution_minutes <= 0 {
                    return Ok(());
                }
                let step = Duration::try_minutes(*resolution_minutes).ok_or_else(|| {
                    TimeParseError::MalformedDuration(format_duration(*resolution_minutes))
                })?;
                let mut t = Some(start);
                while let Some(current) = t.filter(|t| *t <= end) {
                    push_limited(out, current)?;
                    t = current.checked_add_signed(step);
                }
                Ok(())
            }
        }
    }
}

fn push_limited(out: &mut Vec<DateTime<Utc>>, t: DateTime<Utc>) -> Result<(), TimeParseError> {
    if out.len() >= MAX_TIME_VALUES {
        return Err(TimeParseError::TooManyValues {
            limit: MAX_TIME_VALUES,
        });
    }
    out.push(t);
    Ok(())
}

/// Expand a parsed TIME list into timestamps, in request order.
pub fn expand_time_specs(
    specs: &[TimeSpec],
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, TimeParseError> {
    let mut out = Vec::new();
    for spec in specs {
        spec.expand_into(now, &mut out)?;
    }
    Ok(out)
}
