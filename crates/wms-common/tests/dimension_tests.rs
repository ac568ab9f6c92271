//! Tests for TIME parsing together with the time dimension model.

use chrono::{DateTime, Duration, TimeZone, Utc};
use wms_common::time::{expand_time_specs, parse_duration, parse_time_list, TimeParseError};
use wms_common::time_dimension::StepTimeDimension;
use wms_common::{TimeDimension, TimeDimensions, TimeInterval, WmsError};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

// ============================================================================
// Durations
// ============================================================================

#[test]
fn test_duration_examples() {
    assert_eq!(parse_duration("PT1H30M"), Ok(90));
    assert_eq!(parse_duration("P1DT6H"), Ok(1800));
    assert!(matches!(
        parse_duration(""),
        Err(TimeParseError::MalformedDuration(_))
    ));
}

#[test]
fn test_duration_error_is_dimension_value_error() {
    let err: WmsError = parse_duration("P1Y").unwrap_err().into();
    assert_eq!(err.wms_exception_code(), "InvalidDimensionValue");
}

// ============================================================================
// TIME lists
// ============================================================================

#[test]
fn test_hourly_interval_has_three_values() {
    let specs = parse_time_list("2024-01-01T00:00:00Z/2024-01-01T02:00:00Z/PT1H").unwrap();
    let times = expand_time_specs(&specs, Utc::now()).unwrap();

    assert_eq!(times, vec![at(0, 0), at(1, 0), at(2, 0)]);
}

#[test]
fn test_zero_step_interval_is_empty_not_error() {
    let specs = parse_time_list("2024-01-01T00:00:00Z/2024-01-01T02:00:00Z/PT0M").unwrap();
    assert_eq!(expand_time_specs(&specs, Utc::now()), Ok(vec![]));
}

#[test]
fn test_reversed_interval_is_rejected() {
    assert!(matches!(
        parse_time_list("2024-01-01T03:00:00Z/2024-01-01T01:00:00Z/PT1H"),
        Err(TimeParseError::InvalidInterval(_))
    ));
}

#[test]
fn test_fractional_seconds_in_list() {
    let specs = parse_time_list("2024-01-01T00:00:00.000Z,2024-01-01T01:00:00.5Z").unwrap();
    let times = expand_time_specs(&specs, Utc::now()).unwrap();
    assert_eq!(times, vec![at(0, 0), at(1, 0)]);
}

// ============================================================================
// Requested times against dimensions
// ============================================================================

#[test]
fn test_expanded_times_validate_against_interval() {
    let dims = TimeDimensions::single(TimeDimension::interval(
        TimeInterval::new(at(0, 0), at(6, 0), 60).unwrap(),
    ));
    let specs = parse_time_list("2024-01-01T01:00:00Z/2024-01-01T06:00:00Z/PT1H").unwrap();

    for t in expand_time_specs(&specs, Utc::now()).unwrap() {
        assert!(dims.is_valid_time(t, None), "{t}");
    }
    assert!(!dims.is_valid_time(at(6, 0) + Duration::hours(1), None));
    assert!(!dims.is_valid_time(at(0, 30), None));
}

#[test]
fn test_step_dimension_rejects_in_between_times() {
    let members = [at(0, 0), at(0, 10), at(1, 0), at(5, 0)];
    let dims = TimeDimensions::single(TimeDimension::Step(
        StepTimeDimension::new(members).unwrap(),
    ));

    for pair in members.windows(2) {
        let between = pair[0] + (pair[1] - pair[0]) / 2;
        assert!(dims.is_valid_time(pair[0], None));
        assert!(!dims.is_valid_time(between, None));
    }
}

#[test]
fn test_reference_time_selects_generation() {
    let run_00 = TimeDimension::from_timesteps((0..=12).map(|h| at(h, 0))).unwrap();
    let run_06 = TimeDimension::from_timesteps((6..=9).map(|h| at(h, 0))).unwrap();
    let dims = TimeDimensions::from_generations([(at(0, 0), run_00), (at(6, 0), run_06)]).unwrap();

    assert_eq!(dims.reference_times(), vec![at(0, 0), at(6, 0)]);
    assert_eq!(dims.most_current_time(None), Some(at(9, 0)));
    assert!(dims.is_valid_time(at(12, 0), Some(at(0, 0))));
    assert!(!dims.is_valid_time(at(12, 0), Some(at(6, 0))));
    assert_eq!(
        dims.extent().as_deref(),
        Some("2024-01-01T06:00:00Z/2024-01-01T09:00:00Z/PT1H")
    );
}
