//! Merge near-duplicate stop events.
//!
//! The GPS log sometimes records one physical stop as several rows a few
//! centimeters apart. [`consolidate`] folds such runs into one synthetic event
//! and returns a new sequence; the input is left untouched.
//!
//! Only *adjacent* events merge, so the output keeps the input's time order and
//! a later pass through the same stop stays a separate event. A merge never
//! crosses a trip-slot boundary and never involves an excluded station, so the
//! merged sequence segments and attributes exactly like the raw one.

use log::debug;

use crate::config::{FareConfig, TripSlot};
use crate::geo_utils::{compute_center, haversine_distance};
use crate::{GpsPoint, StopEvent};

/// Merge adjacent events that are the same physical stop.
///
/// Two events merge when they share `line`, sit closer than
/// `config.consolidation_tolerance_meters`, fall in the same trip slot of
/// `config.schedule`, and neither station is excluded. The distance test runs
/// against the first member of the run, so a slow drift cannot chain distinct
/// stops together.
///
/// Each merged event keeps the identifiers and timestamps of the first member,
/// sums boarding, alighting, exempt-door alighting and every door pair, keeps the
/// largest `carried` and `occupancy_percent`, and sits at the mean position of all
/// members.
///
/// A non-positive tolerance returns the input unchanged.
///
/// # Example
/// ```
/// use apc_fare_zones::{consolidate, FareConfig, GpsPoint, StopEvent};
///
/// let p = GpsPoint::new(-30.05, -51.15);
/// let events = vec![
///     StopEvent::new(7, p, "06:00:00", 2, 0).with_line("6IP"),
///     StopEvent::new(7, p, "06:00:05", 1, 1).with_line("6IP"),
/// ];
///
/// let merged = consolidate(&events, &FareConfig::default());
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].boarding, 3);
/// ```
pub fn consolidate(events: &[StopEvent], config: &FareConfig) -> Vec<StopEvent> {
    let tolerance_m = config.consolidation_tolerance_meters;
    if !(tolerance_m > 0.0) {
        return events.to_vec();
    }

    let excluded = &config.excluded_stations;
    let mut output: Vec<StopEvent> = Vec::with_capacity(events.len());
    // Positions of the members of the run currently at the end of `output`
    let mut run: Vec<GpsPoint> = Vec::new();

    for event in events {
        let merge = match (output.last(), run.first()) {
            (Some(last), Some(anchor)) => {
                last.line == event.line
                    && !excluded.contains(last.station_number)
                    && !excluded.contains(event.station_number)
                    && slot_of(last, &config.schedule) == slot_of(event, &config.schedule)
                    && haversine_distance(anchor, &event.position) < tolerance_m
            }
            _ => false,
        };

        if merge {
            run.push(event.position);
            if let Some(last) = output.last_mut() {
                merge_into(last, event);
                if let Some(center) = compute_center(&run) {
                    last.position = center;
                }
            }
        } else {
            output.push(event.clone());
            run.clear();
            run.push(event.position);
        }
    }

    if output.len() < events.len() {
        debug!(
            "[Consolidate] Merged {} events into {} ({}m tolerance)",
            events.len(),
            output.len(),
            tolerance_m
        );
    }

    output
}

/// First slot whose window holds the event's time of day, as the segmenter resolves it.
fn slot_of(event: &StopEvent, schedule: &[TripSlot]) -> Option<usize> {
    let time = event.time_of_day()?;
    schedule.iter().position(|slot| slot.contains(time))
}

fn merge_into(target: &mut StopEvent, other: &StopEvent) {
    target.boarding += other.boarding;
    target.alighting += other.alighting;
    target.door_exempt_alighting += other.door_exempt_alighting;
    target.carried = target.carried.max(other.carried);
    target.occupancy_percent = target.occupancy_percent.max(other.occupancy_percent);
    for (door, extra) in target.doors.iter_mut().zip(other.doors.iter()) {
        *door += *extra;
    }
}
