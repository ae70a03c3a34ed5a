//! Aggregate views over segmented trips.
//!
//! These never feed the fare math. They exist so an operator can check that
//! the loaded data adds up: door counters against trip totals, trips
//! against the whole dataset, and which stations carry the movement.

use crate::config::ExcludedStations;
use crate::events::{parse_time_of_day, DOOR_COUNT, MISSING_TEXT};
use crate::trips::{Segmentation, Trip};
use crate::{DoorCounts, StopEvent};

/// Boarding and alighting per door over a trip's stops.
pub fn door_totals(trip: &Trip, events: &[StopEvent]) -> [DoorCounts; DOOR_COUNT] {
    let mut totals = [DoorCounts::default(); DOOR_COUNT];
    for event in trip.events(events) {
        for (total, door) in totals.iter_mut().zip(event.doors.iter()) {
            *total += *door;
        }
    }
    totals
}

// ============================================================================
// Trips Summary
// ============================================================================

/// Totals across a set of trips.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripsSummary {
    pub trip_count: usize,
    pub total_stops: usize,
    pub total_boarding: u64,
    pub total_alighting: u64,
    /// Distinct vehicle plates, in first-seen order, blanks and placeholders left out
    pub plates: Vec<String>,
    pub earliest_start: Option<String>,
    pub latest_end: Option<String>,
    /// Boarding per stop, rounded to the nearest whole passenger
    pub average_boarding_per_stop: u64,
    pub door_totals: [DoorCounts; DOOR_COUNT],
    /// Door boarding sum minus trip boarding total
    pub door_boarding_difference: i64,
    /// Door alighting sum minus trip alighting total
    pub door_alighting_difference: i64,
}

impl TripsSummary {
    /// True when the door counters agree with the stop totals.
    pub fn doors_consistent(&self) -> bool {
        self.door_boarding_difference == 0 && self.door_alighting_difference == 0
    }
}

/// Summarize `trips`.
///
/// # Example
/// ```
/// use apc_fare_zones::{segment_trips, summarize_trips, FareConfig, GpsPoint, SegmentationStrategy, StopEvent};
///
/// let p = GpsPoint::new(-30.05, -51.15);
/// let events = vec![
///     StopEvent::new(1, p, "06:00:00", 3, 0).with_plate("IXX1A23"),
///     StopEvent::new(2, p, "09:00:00", 2, 3).with_plate("IXX1A23"),
/// ];
/// let segmentation = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
///
/// let summary = summarize_trips(&segmentation.trips, &events);
/// assert_eq!(summary.trip_count, 2);
/// assert_eq!(summary.plates, vec!["IXX1A23".to_string()]);
/// assert_eq!(summary.average_boarding_per_stop, 3);
/// ```
pub fn summarize_trips(trips: &[Trip], events: &[StopEvent]) -> TripsSummary {
    let mut summary = TripsSummary {
        trip_count: trips.len(),
        ..Default::default()
    };

    for trip in trips {
        summary.total_stops += trip.stop_count();
        summary.total_boarding += trip.total_boarding;
        summary.total_alighting += trip.total_alighting;

        for event in trip.events(events) {
            let plate = event.plate.trim();
            if plate.is_empty() || plate == MISSING_TEXT {
                continue;
            }
            if !summary.plates.iter().any(|p| p == plate) {
                summary.plates.push(plate.to_string());
            }
        }

        for (total, door) in summary.door_totals.iter_mut().zip(door_totals(trip, events)) {
            *total += door;
        }

        if let Some(start) = &trip.actual_start_time {
            if is_before(start, summary.earliest_start.as_deref()) {
                summary.earliest_start = Some(start.clone());
            }
        }
        if let Some(end) = &trip.actual_end_time {
            if is_after(end, summary.latest_end.as_deref()) {
                summary.latest_end = Some(end.clone());
            }
        }
    }

    if summary.total_stops > 0 {
        summary.average_boarding_per_stop =
            (summary.total_boarding as f64 / summary.total_stops as f64).round() as u64;
    }

    let door_boarding: u64 = summary.door_totals.iter().map(|d| u64::from(d.boarding)).sum();
    let door_alighting: u64 = summary.door_totals.iter().map(|d| u64::from(d.alighting)).sum();
    summary.door_boarding_difference = door_boarding as i64 - summary.total_boarding as i64;
    summary.door_alighting_difference = door_alighting as i64 - summary.total_alighting as i64;

    summary
}

// Timestamps without a parseable time of day never replace a known one
fn is_before(candidate: &str, current: Option<&str>) -> bool {
    match (parse_time_of_day(candidate), current.and_then(parse_time_of_day)) {
        (Some(c), Some(cur)) => c < cur,
        (_, None) => current.is_none() || parse_time_of_day(candidate).is_some(),
        (None, Some(_)) => false,
    }
}

fn is_after(candidate: &str, current: Option<&str>) -> bool {
    match (parse_time_of_day(candidate), current.and_then(parse_time_of_day)) {
        (Some(c), Some(cur)) => c > cur,
        (_, None) => current.is_none() || parse_time_of_day(candidate).is_some(),
        (None, Some(_)) => false,
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Dataset totals compared with what the trips account for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadReconciliation {
    pub dataset_stops: usize,
    pub trip_stops: usize,
    pub unassigned_stops: usize,
    pub dataset_boarding: u64,
    pub trip_boarding: u64,
    pub dataset_alighting: u64,
    pub trip_alighting: u64,
    /// Exempt-door alighting over the whole dataset
    pub dataset_exempt_alighting: u64,
}

impl LoadReconciliation {
    pub fn boarding_difference(&self) -> i64 {
        self.dataset_boarding as i64 - self.trip_boarding as i64
    }

    pub fn alighting_difference(&self) -> i64 {
        self.dataset_alighting as i64 - self.trip_alighting as i64
    }

    /// True when every stop and passenger landed in some trip.
    pub fn is_complete(&self) -> bool {
        self.unassigned_stops == 0 && self.boarding_difference() == 0 && self.alighting_difference() == 0
    }
}

/// Compare the loaded events with the trips built from them.
pub fn reconcile(events: &[StopEvent], segmentation: &Segmentation) -> LoadReconciliation {
    let mut rec = LoadReconciliation {
        dataset_stops: events.len(),
        trip_stops: segmentation.assigned_count(),
        unassigned_stops: segmentation.unassigned.len(),
        ..Default::default()
    };

    for event in events {
        rec.dataset_boarding += u64::from(event.boarding);
        rec.dataset_alighting += u64::from(event.alighting);
        rec.dataset_exempt_alighting += u64::from(event.door_exempt_alighting);
    }
    for trip in &segmentation.trips {
        rec.trip_boarding += trip.total_boarding;
        rec.trip_alighting += trip.total_alighting;
    }

    rec
}

// ============================================================================
// Station Rankings
// ============================================================================

/// One stop in a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationRank {
    /// Index into the event sequence
    pub index: usize,
    pub station_number: u32,
    pub boarding: u32,
    pub alighting: u32,
    pub carried: u32,
}

impl StationRank {
    fn of(index: usize, event: &StopEvent) -> Self {
        Self {
            index,
            station_number: event.station_number,
            boarding: event.boarding,
            alighting: event.alighting,
            carried: event.carried,
        }
    }
}

/// Busiest and idle stops over a set of trips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationRankings {
    /// Most boardings first; stops with none are left out
    pub top_boarding: Vec<StationRank>,
    /// Most alightings first; stops with none are left out
    pub top_alighting: Vec<StationRank>,
    /// Stops where nobody boarded or alighted, in event order
    pub no_movement: Vec<StationRank>,
}

/// Rank the stops visited by `trips`, keeping `n` entries in each top list.
///
/// Each stop counts once even if two trips share it. Excluded stations never
/// appear. Ties keep event order.
///
/// # Example
/// ```
/// use apc_fare_zones::{segment_trips, station_rankings, ExcludedStations, FareConfig, GpsPoint, SegmentationStrategy, StopEvent};
///
/// let p = GpsPoint::new(-30.05, -51.15);
/// let events = vec![
///     StopEvent::new(1, p, "06:00:00", 3, 0),
///     StopEvent::new(2, p, "06:10:00", 8, 1),
///     StopEvent::new(3, p, "06:20:00", 0, 0),
/// ];
/// let segmentation = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
///
/// let rankings = station_rankings(&segmentation.trips, &events, &ExcludedStations::default(), 5);
/// assert_eq!(rankings.top_boarding.iter().map(|r| r.station_number).collect::<Vec<_>>(), vec![2, 1]);
/// assert_eq!(rankings.no_movement[0].station_number, 3);
/// ```
pub fn station_rankings(
    trips: &[Trip],
    events: &[StopEvent],
    excluded: &ExcludedStations,
    n: usize,
) -> StationRankings {
    let mut indices: Vec<usize> = trips.iter().flat_map(|t| t.stop_indices.iter().copied()).collect();
    indices.sort_unstable();
    indices.dedup();

    let visible: Vec<StationRank> = indices
        .into_iter()
        .filter_map(|i| events.get(i).map(|e| StationRank::of(i, e)))
        .filter(|rank| !excluded.contains(rank.station_number))
        .collect();

    StationRankings {
        top_boarding: top_by(&visible, n, |r| r.boarding),
        top_alighting: top_by(&visible, n, |r| r.alighting),
        no_movement: visible
            .iter()
            .copied()
            .filter(|r| r.boarding == 0 && r.alighting == 0)
            .collect(),
    }
}

// Stable sort, so equal counts keep event order
fn top_by(ranks: &[StationRank], n: usize, key: impl Fn(&StationRank) -> u32) -> Vec<StationRank> {
    let mut ranked: Vec<StationRank> = ranks.iter().copied().filter(|r| key(r) > 0).collect();
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

// ============================================================================
// Tests
// ============================================================================
