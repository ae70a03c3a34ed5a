//! # Trip Segmentation
//!
//! Groups a day's time-ordered stop events into vehicle trips.
//!
//! ## Strategies
//!
//! | Strategy | Rule |
//! |----------|------|
//! | [`SegmentationStrategy::TimeWindows`] | First trip slot whose window holds the event's time of day |
//! | [`SegmentationStrategy::TimeWindowsWithGeoCheck`] | Same, but a slot is skipped when the event sits on a Boundary reference of the other direction |
//! | [`SegmentationStrategy::Sequential`] | A trip closes at the restart station once it holds enough stops |
//!
//! Only the time of day decides membership under the window strategies; the
//! station number is irrelevant and the same station may appear in several
//! trips. A trip's `stop_indices` need not be contiguous.

use log::{info, warn};

use crate::config::{FareConfig, ReferencePoints, TripSlot};
use crate::geo_utils::is_within;
use crate::{Direction, StopEvent};

// ============================================================================
// Types
// ============================================================================

/// A vehicle run and the stop events assigned to it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    pub id: String,
    pub name: String,
    pub expected_line: String,
    pub direction: Direction,
    /// Indices into the event sequence, in the order encountered
    pub stop_indices: Vec<usize>,
    /// Sum over all assigned stops, with no exclusion filter
    pub total_boarding: u64,
    pub total_alighting: u64,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    /// Plate and driver of the first assigned event
    pub plate: Option<String>,
    pub driver: Option<String>,
}

impl Trip {
    fn new(id: String, name: String, expected_line: String, direction: Direction) -> Self {
        Self {
            id,
            name,
            expected_line,
            direction,
            stop_indices: Vec::new(),
            total_boarding: 0,
            total_alighting: 0,
            actual_start_time: None,
            actual_end_time: None,
            plate: None,
            driver: None,
        }
    }

    fn from_slot(slot: &TripSlot) -> Self {
        Self::new(slot.id.clone(), slot.name.clone(), slot.expected_line.clone(), slot.direction)
    }

    fn push(&mut self, index: usize, event: &StopEvent) {
        if self.stop_indices.is_empty() {
            self.actual_start_time = Some(event.timestamp.clone());
            self.plate = Some(event.plate.clone());
            self.driver = Some(event.driver.clone());
        }
        self.stop_indices.push(index);
        self.total_boarding += u64::from(event.boarding);
        self.total_alighting += u64::from(event.alighting);
        self.actual_end_time = Some(event.timestamp.clone());
    }

    pub fn stop_count(&self) -> usize {
        self.stop_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stop_indices.is_empty()
    }

    /// Events of this trip in trip order. Indices outside `events` are skipped.
    pub fn events<'a>(&'a self, events: &'a [StopEvent]) -> impl Iterator<Item = &'a StopEvent> + 'a {
        self.stop_indices.iter().filter_map(move |&i| events.get(i))
    }
}

/// How events are grouped into trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SegmentationStrategy {
    #[default]
    TimeWindows,
    TimeWindowsWithGeoCheck,
    Sequential,
}

/// An event whose window match was vetoed by the geo direction check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectionMismatch {
    pub index: usize,
    pub station_number: u32,
    pub slot_id: String,
    pub slot_direction: Direction,
    pub inferred: Direction,
}

/// Output of one segmentation pass.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segmentation {
    /// Non-empty trips, in slot order
    pub trips: Vec<Trip>,
    /// Events that landed in no trip, in sequence order
    pub unassigned: Vec<usize>,
    /// Vetoed window matches (geo check only)
    pub mismatches: Vec<DirectionMismatch>,
}

impl Segmentation {
    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == id)
    }

    /// Number of events assigned to some trip.
    pub fn assigned_count(&self) -> usize {
        self.trips.iter().map(Trip::stop_count).sum()
    }
}

// ============================================================================
// Segmentation
// ============================================================================

/// Partition `events` into trips.
///
/// No event is ever rejected: events that fit no trip are reported in
/// [`Segmentation::unassigned`], and slots that receive no events are dropped
/// from the output with a warning.
///
/// # Example
/// ```
/// use apc_fare_zones::{segment_trips, FareConfig, GpsPoint, SegmentationStrategy, StopEvent};
///
/// let p = GpsPoint::new(-30.05, -51.15);
/// let events = vec![
///     StopEvent::new(1, p, "01/02/2024 06:00:00", 3, 0),
///     StopEvent::new(2, p, "01/02/2024 09:30:00", 1, 2),
///     StopEvent::new(3, p, "01/02/2024 09:45:00", 0, 1),
/// ];
///
/// let segmentation = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
/// assert_eq!(segmentation.trips.len(), 2);
/// assert_eq!(segmentation.trips[1].stop_indices, vec![1, 2]);
/// ```
pub fn segment_trips(
    events: &[StopEvent],
    config: &FareConfig,
    strategy: SegmentationStrategy,
) -> Segmentation {
    let segmentation = match strategy {
        SegmentationStrategy::TimeWindows => segment_by_windows(events, config, false),
        SegmentationStrategy::TimeWindowsWithGeoCheck => segment_by_windows(events, config, true),
        SegmentationStrategy::Sequential => segment_sequential(events, config),
    };

    info!("[Segmenter] {} trips identified ({:?})", segmentation.trips.len(), strategy);
    for trip in &segmentation.trips {
        info!(
            "[Segmenter]   {} {}: {} -> {} ({} stops)",
            trip.name,
            trip.direction,
            trip.actual_start_time.as_deref().unwrap_or("N/A"),
            trip.actual_end_time.as_deref().unwrap_or("N/A"),
            trip.stop_count()
        );
    }
    if !segmentation.unassigned.is_empty() {
        warn!("[Segmenter] {} events not assigned to any trip", segmentation.unassigned.len());
        for &index in &segmentation.unassigned {
            if let Some(event) = events.get(index) {
                warn!(
                    "[Segmenter]   station {} at {} ({} boarding, {} alighting)",
                    event.station_number, event.timestamp, event.boarding, event.alighting
                );
            }
        }
    }

    segmentation
}

fn segment_by_windows(events: &[StopEvent], config: &FareConfig, geo_check: bool) -> Segmentation {
    let mut trips: Vec<Trip> = config.schedule.iter().map(Trip::from_slot).collect();
    let mut unassigned = Vec::new();
    let mut mismatches = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let Some(time) = event.time_of_day() else {
            unassigned.push(index);
            continue;
        };

        let inferred = if geo_check && event.station_number == config.geo_check_station {
            infer_direction(event, &config.reference_points, config.match_tolerance_meters)
        } else {
            None
        };

        let mut assigned = false;
        for (slot, trip) in config.schedule.iter().zip(trips.iter_mut()) {
            if !slot.contains(time) {
                continue;
            }
            if let Some(direction) = inferred {
                if direction != slot.direction {
                    warn!(
                        "[Segmenter] Station {} falls in {} but its position says {}",
                        event.station_number, slot.name, direction
                    );
                    mismatches.push(DirectionMismatch {
                        index,
                        station_number: event.station_number,
                        slot_id: slot.id.clone(),
                        slot_direction: slot.direction,
                        inferred: direction,
                    });
                    continue;
                }
            }
            trip.push(index, event);
            assigned = true;
            break;
        }

        if !assigned {
            unassigned.push(index);
        }
    }

    for trip in trips.iter().filter(|t| t.is_empty()) {
        warn!("[Segmenter] No stops fell in {} ({})", trip.name, trip.id);
    }
    trips.retain(|t| !t.is_empty());

    Segmentation { trips, unassigned, mismatches }
}

fn segment_sequential(events: &[StopEvent], config: &FareConfig) -> Segmentation {
    let mut trips: Vec<Trip> = Vec::new();
    let mut current: Option<Trip> = None;

    for (index, event) in events.iter().enumerate() {
        let trip = current.get_or_insert_with(|| {
            let number = trips.len() + 1;
            let direction = if trips.len() % 2 == 0 { Direction::Outbound } else { Direction::Inbound };
            Trip::new(format!("trip-{number}"), format!("Trip {number}"), event.line.clone(), direction)
        });
        trip.push(index, event);

        if event.station_number == config.sequential_restart_station
            && trip.stop_count() > config.sequential_min_stops
        {
            trips.extend(current.take());
        }
    }
    trips.extend(current);

    Segmentation { trips, unassigned: Vec::new(), mismatches: Vec::new() }
}

/// Direction implied by an event sitting on a Boundary reference point.
///
/// The outbound reference is tried first; `None` when neither is within tolerance.
pub fn infer_direction(
    event: &StopEvent,
    references: &ReferencePoints,
    tolerance_m: f64,
) -> Option<Direction> {
    [Direction::Outbound, Direction::Inbound]
        .into_iter()
        .find(|&d| is_within(&event.position, &references.boundary(d), tolerance_m))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::offset_meters;
    use crate::GpsPoint;
    use chrono::NaiveTime;
    use std::collections::HashSet;

    fn far() -> GpsPoint {
        GpsPoint::new(-30.0100, -51.2000)
    }

    fn at(station: u32, time: &str) -> StopEvent {
        StopEvent::new(station, far(), format!("01/02/2024 {time}"), 1, 1)
    }

    #[test]
    fn test_events_land_in_matching_windows() {
        let events = vec![
            at(1, "05:00:00"),
            at(2, "07:59:59"),
            at(3, "08:00:00"),
            at(4, "14:00:00"),
            at(5, "14:00:01"),
            at(6, "23:59:59"),
        ];
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
        let ids: Vec<&str> = seg.trips.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["trip-1", "trip-2", "trip-3", "trip-4"]);
        assert_eq!(seg.trips[0].stop_indices, vec![0, 1]);
        assert_eq!(seg.trips[1].stop_indices, vec![2, 3]);
        assert_eq!(seg.trips[2].stop_indices, vec![4]);
        assert_eq!(seg.trips[3].stop_indices, vec![5]);
        assert!(seg.unassigned.is_empty());
    }

    #[test]
    fn test_each_event_in_at_most_one_trip() {
        let events: Vec<StopEvent> = (0..24)
            .flat_map(|h| [at(h, &format!("{h:02}:00:00")), at(h, &format!("{h:02}:59:59"))])
            .collect();
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);

        let mut seen = HashSet::new();
        for trip in &seg.trips {
            for &i in &trip.stop_indices {
                assert!(seen.insert(i), "index {i} assigned twice");
            }
        }
        assert_eq!(seen.len() + seg.unassigned.len(), events.len());
    }

    #[test]
    fn test_station_number_irrelevant_and_non_contiguous() {
        // Same station in two trips; trip-1 events interleaved with a later one
        let events = vec![at(31, "07:00:00"), at(31, "09:00:00"), at(12, "07:30:00")];
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
        assert_eq!(seg.trip("trip-1").unwrap().stop_indices, vec![0, 2]);
        assert_eq!(seg.trip("trip-2").unwrap().stop_indices, vec![1]);
    }

    #[test]
    fn test_totals_and_actual_times() {
        let mut events = vec![at(1, "06:00:00"), at(2, "06:30:00"), at(3, "07:10:00")];
        events[1].boarding = 5;
        events[2].alighting = 4;
        events[0].plate = "IXX1A23".into();
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
        let trip = &seg.trips[0];
        assert_eq!(trip.total_boarding, 7);
        assert_eq!(trip.total_alighting, 6);
        assert_eq!(trip.actual_start_time.as_deref(), Some("01/02/2024 06:00:00"));
        assert_eq!(trip.actual_end_time.as_deref(), Some("01/02/2024 07:10:00"));
        assert_eq!(trip.plate.as_deref(), Some("IXX1A23"));
    }

    #[test]
    fn test_empty_slots_dropped() {
        let events = vec![at(1, "17:00:00")];
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
        assert_eq!(seg.trips.len(), 1);
        assert_eq!(seg.trips[0].id, "trip-4");
        assert_eq!(seg.trips[0].direction, Direction::Inbound);
    }

    #[test]
    fn test_no_events_no_trips() {
        let seg = segment_trips(&[], &FareConfig::default(), SegmentationStrategy::TimeWindows);
        assert!(seg.trips.is_empty());
        assert_eq!(seg.assigned_count(), 0);
    }

    #[test]
    fn test_unparseable_time_unassigned() {
        let events = vec![at(1, "06:00:00"), StopEvent::new(2, far(), "N/A", 3, 0)];
        let seg = segment_trips(&events, &FareConfig::default(), SegmentationStrategy::TimeWindows);
        assert_eq!(seg.unassigned, vec![1]);
        assert_eq!(seg.assigned_count(), 1);
    }

    #[test]
    fn test_gap_in_schedule_leaves_events_unassigned() {
        let mut config = FareConfig::default();
        config.schedule[1].end = NaiveTime::from_hms_opt(13, 59, 59).unwrap();
        config.schedule[2].start = NaiveTime::from_hms_opt(14, 10, 0).unwrap();
        let events = vec![at(1, "14:05:00")];
        let seg = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
        assert!(seg.trips.is_empty());
        assert_eq!(seg.unassigned, vec![0]);
    }

    #[test]
    fn test_overlapping_windows_first_match_wins() {
        let mut config = FareConfig::default();
        config.schedule[2].start = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let events = vec![at(1, "13:00:00")];
        let seg = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
        assert_eq!(seg.trips.len(), 1);
        assert_eq!(seg.trips[0].id, "trip-2");
    }

    #[test]
    fn test_geo_check_vetoes_wrong_direction() {
        let config = FareConfig::default();
        // Station 31 sitting on the inbound Boundary during an outbound slot
        let mut on_inbound = at(31, "07:00:00");
        on_inbound.position = offset_meters(&config.reference_points.boundary_inbound, 5.0, 0.0);
        // Station 31 on the outbound Boundary during the same slot
        let mut on_outbound = at(31, "07:05:00");
        on_outbound.position = config.reference_points.boundary_outbound;

        let events = vec![at(30, "06:55:00"), on_inbound, on_outbound];
        let seg = segment_trips(&events, &config, SegmentationStrategy::TimeWindowsWithGeoCheck);

        assert_eq!(seg.trips[0].stop_indices, vec![0, 2]);
        assert_eq!(seg.unassigned, vec![1]);
        assert_eq!(seg.mismatches.len(), 1);
        assert_eq!(seg.mismatches[0].slot_id, "trip-1");
        assert_eq!(seg.mismatches[0].inferred, Direction::Inbound);

        // Plain windows ignore position entirely
        let plain = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
        assert_eq!(plain.trips[0].stop_indices, vec![0, 1, 2]);
        assert!(plain.mismatches.is_empty());
    }

    #[test]
    fn test_infer_direction() {
        let refs = ReferencePoints::default();
        let mut event = at(31, "07:00:00");
        assert_eq!(infer_direction(&event, &refs, 50.0), None);
        event.position = offset_meters(&refs.boundary_outbound, 10.0, 0.0);
        assert_eq!(infer_direction(&event, &refs, 50.0), Some(Direction::Outbound));
    }

    #[test]
    fn test_sequential_restarts_after_station_one() {
        let config = FareConfig::default();
        // 11 stops ending at station 1 close the first trip; station 1 early on does not
        let mut events: Vec<StopEvent> = vec![at(1, "06:00:00")];
        events.extend((2..=10).map(|s| at(s, "06:10:00")));
        events.push(at(1, "06:50:00"));
        events.extend((2..=4).map(|s| at(s, "07:10:00")));

        let seg = segment_trips(&events, &config, SegmentationStrategy::Sequential);
        assert_eq!(seg.trips.len(), 2);
        assert_eq!(seg.trips[0].stop_count(), 11);
        assert_eq!(seg.trips[0].direction, Direction::Outbound);
        assert_eq!(seg.trips[1].stop_indices, vec![11, 12, 13]);
        assert_eq!(seg.trips[1].direction, Direction::Inbound);
        assert_eq!(seg.trips[1].id, "trip-2");
        assert!(seg.unassigned.is_empty());
    }
}
