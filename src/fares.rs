//! # Fare Attribution
//!
//! Splits a trip's boardings into five fare categories using two geographic
//! cut points on the route.
//!
//! ## Algorithm
//!
//! 1. **Locate cut points**: scan the trip's stops in order and record the
//!    first trip-relative position strictly within the match tolerance of the
//!    Boundary reference, and independently of the Landmark reference, for the
//!    trip's direction.
//! 2. **Partition**: sum boarding, alighting and exempt-door alighting before
//!    (inclusive) and after the Boundary position.
//! 3. **Derive categories** with the direction's rule set:
//!
//! | Category | Outbound | Inbound |
//! |----------|----------|---------|
//! | exempt | exempt before + boarding after | exempt before + exempt after |
//! | minimum | alighting before − exempt before | boarding after − exempt after |
//! | boundary | 0 | alighting before − exempt before |
//! | landmark | boarding in (landmark, boundary] | alighting in (boundary, landmark] |
//! | maximum | boarding before − landmark − minimum − exempt before | boarding before − alighting before − landmark |
//!
//! Stops whose station number is excluded keep their position in the trip but
//! contribute nothing to any sum and can never be a cut point, so excluding a
//! stop in place gives the same figures as removing it.
//!
//! ## Degraded results
//!
//! Nothing here fails. A trip that never reaches the Boundary reference yields
//! all-zero metrics, a missing Landmark zeroes the landmark tier, and negative
//! categories or a broken conservation law are reported as [`FareIssue`]s
//! rather than clamped.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, RangeInclusive};

use log::{debug, info, warn};

use crate::config::{ExcludedStations, FareConfig, FareTable};
use crate::geo_utils::haversine_distance;
use crate::trips::Trip;
use crate::{Direction, StopEvent};

// ============================================================================
// Metrics
// ============================================================================

/// The five fare tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FareCategory {
    Minimum,
    Maximum,
    Boundary,
    Landmark,
    Exempt,
}

impl FareCategory {
    pub const ALL: [FareCategory; 5] = [
        FareCategory::Boundary,
        FareCategory::Maximum,
        FareCategory::Landmark,
        FareCategory::Minimum,
        FareCategory::Exempt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FareCategory::Minimum => "minimum",
            FareCategory::Maximum => "maximum",
            FareCategory::Boundary => "boundary",
            FareCategory::Landmark => "landmark",
            FareCategory::Exempt => "exempt",
        }
    }

    /// Price of this category in cents.
    pub fn price_cents(&self, table: &FareTable) -> i64 {
        match self {
            FareCategory::Minimum => table.minimum_cents,
            FareCategory::Maximum => table.maximum_cents,
            FareCategory::Boundary => table.boundary_cents,
            FareCategory::Landmark => table.landmark_cents,
            FareCategory::Exempt => table.exempt_cents,
        }
    }
}

impl fmt::Display for FareCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passenger counts per fare category.
///
/// Signed so that inconsistent source counts show up as negative values
/// instead of being hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FareMetrics {
    pub minimum: i64,
    pub maximum: i64,
    pub boundary: i64,
    pub landmark: i64,
    pub exempt: i64,
}

impl FareMetrics {
    /// Sum of all five categories.
    pub fn total(&self) -> i64 {
        self.minimum + self.maximum + self.boundary + self.landmark + self.exempt
    }

    pub fn get(&self, category: FareCategory) -> i64 {
        match category {
            FareCategory::Minimum => self.minimum,
            FareCategory::Maximum => self.maximum,
            FareCategory::Boundary => self.boundary,
            FareCategory::Landmark => self.landmark,
            FareCategory::Exempt => self.exempt,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Categories holding a negative count.
    pub fn negative_categories(&self) -> Vec<(FareCategory, i64)> {
        FareCategory::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .filter(|&(_, v)| v < 0)
            .collect()
    }

    /// Estimated revenue in cents at the given prices.
    ///
    /// # Example
    /// ```
    /// use apc_fare_zones::{FareMetrics, FareTable};
    ///
    /// let metrics = FareMetrics { minimum: 2, maximum: 1, exempt: 4, ..Default::default() };
    /// assert_eq!(metrics.revenue_cents(&FareTable::default()), 2 * 480 + 1030);
    /// ```
    pub fn revenue_cents(&self, table: &FareTable) -> i64 {
        FareCategory::ALL
            .into_iter()
            .map(|c| self.get(c) * c.price_cents(table))
            .sum()
    }
}

impl Add for FareMetrics {
    type Output = FareMetrics;

    fn add(mut self, rhs: FareMetrics) -> FareMetrics {
        self += rhs;
        self
    }
}

impl AddAssign for FareMetrics {
    fn add_assign(&mut self, rhs: FareMetrics) {
        self.minimum += rhs.minimum;
        self.maximum += rhs.maximum;
        self.boundary += rhs.boundary;
        self.landmark += rhs.landmark;
        self.exempt += rhs.exempt;
    }
}

impl Sum for FareMetrics {
    fn sum<I: Iterator<Item = FareMetrics>>(iter: I) -> Self {
        iter.fold(FareMetrics::default(), |acc, m| acc + m)
    }
}

// ============================================================================
// Cut Points
// ============================================================================

/// Trip-relative positions of the Boundary and Landmark stops.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CutPoints {
    pub boundary: Option<usize>,
    pub landmark: Option<usize>,
    /// Closest approach to the Boundary reference over eligible stops
    pub closest_boundary_m: Option<f64>,
    /// Closest approach to the Landmark reference over eligible stops
    pub closest_landmark_m: Option<f64>,
}

/// Find the first stop of `trip` within tolerance of each reference point.
///
/// Positions count every stop in `stop_indices`, excluded or not; excluded
/// stops are simply never eligible to match.
pub fn locate_cut_points(trip: &Trip, events: &[StopEvent], config: &FareConfig) -> CutPoints {
    let boundary_ref = config.reference_points.boundary(trip.direction);
    let landmark_ref = config.reference_points.landmark(trip.direction);
    let tolerance = config.match_tolerance_meters;

    let mut cut = CutPoints::default();
    for (pos, event) in eligible_stops(trip, events, &config.excluded_stations) {
        let to_boundary = haversine_distance(&event.position, &boundary_ref);
        let to_landmark = haversine_distance(&event.position, &landmark_ref);

        cut.closest_boundary_m = Some(cut.closest_boundary_m.map_or(to_boundary, |d| d.min(to_boundary)));
        cut.closest_landmark_m = Some(cut.closest_landmark_m.map_or(to_landmark, |d| d.min(to_landmark)));

        if cut.boundary.is_none() && to_boundary < tolerance {
            cut.boundary = Some(pos);
        }
        if cut.landmark.is_none() && to_landmark < tolerance {
            cut.landmark = Some(pos);
        }
    }
    cut
}

/// `(position, event)` for every stop of the trip that counts toward the sums.
fn eligible_stops<'a>(
    trip: &'a Trip,
    events: &'a [StopEvent],
    excluded: &'a ExcludedStations,
) -> impl Iterator<Item = (usize, &'a StopEvent)> + 'a {
    trip.stop_indices
        .iter()
        .enumerate()
        .filter_map(move |(pos, &index)| events.get(index).map(|e| (pos, e)))
        .filter(move |(_, e)| !excluded.contains(e.station_number))
}

#[derive(Debug, Clone, Copy, Default)]
struct ZoneSums {
    boarding: i64,
    alighting: i64,
    exempt: i64,
}

fn sum_positions(
    trip: &Trip,
    events: &[StopEvent],
    excluded: &ExcludedStations,
    positions: RangeInclusive<usize>,
) -> ZoneSums {
    eligible_stops(trip, events, excluded)
        .filter(|(pos, _)| positions.contains(pos))
        .fold(ZoneSums::default(), |mut acc, (_, e)| {
            acc.boarding += i64::from(e.boarding);
            acc.alighting += i64::from(e.alighting);
            acc.exempt += i64::from(e.door_exempt_alighting);
            acc
        })
}

// ============================================================================
// Attribution
// ============================================================================

/// A data-quality finding attached to a trip's fare figures.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FareIssue {
    /// No stop came within tolerance of the Boundary reference; metrics are all zero
    BoundaryNotFound { closest_m: Option<f64> },
    /// No stop came within tolerance of the Landmark reference; landmark is zero
    LandmarkNotFound,
    NegativeCategory { category: FareCategory, value: i64 },
    /// Category sum differs from the trip's boarding total
    ConservationMismatch { expected: i64, actual: i64 },
}

impl fmt::Display for FareIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FareIssue::BoundaryNotFound { closest_m: Some(d) } => {
                write!(f, "boundary stop not found (closest {d:.1}m)")
            }
            FareIssue::BoundaryNotFound { closest_m: None } => write!(f, "boundary stop not found"),
            FareIssue::LandmarkNotFound => write!(f, "landmark stop not found"),
            FareIssue::NegativeCategory { category, value } => write!(f, "{category} is negative ({value})"),
            FareIssue::ConservationMismatch { expected, actual } => {
                write!(f, "categories sum to {actual}, trip boarded {expected}")
            }
        }
    }
}

/// Fare figures of one trip together with how they were derived.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripFareReport {
    pub trip_id: String,
    pub trip_name: String,
    pub direction: Direction,
    pub cut_points: CutPoints,
    pub metrics: FareMetrics,
    /// Boarding over non-excluded stops
    pub total_boarding: i64,
    pub issues: Vec<FareIssue>,
}

impl TripFareReport {
    /// True when the metrics are complete and consistent.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Attribute one trip and keep the cut points and issues found on the way.
pub fn attribute_trip(trip: &Trip, events: &[StopEvent], config: &FareConfig) -> TripFareReport {
    let excluded = &config.excluded_stations;
    let cut = locate_cut_points(trip, events, config);
    let total_boarding = sum_positions(trip, events, excluded, 0..=usize::MAX).boarding;

    let mut report = TripFareReport {
        trip_id: trip.id.clone(),
        trip_name: trip.name.clone(),
        direction: trip.direction,
        cut_points: cut,
        metrics: FareMetrics::default(),
        total_boarding,
        issues: Vec::new(),
    };

    let Some(boundary) = cut.boundary else {
        match cut.closest_boundary_m {
            Some(d) => warn!("[Fares] {}: boundary stop not found (closest {:.1}m)", trip.name, d),
            None => warn!("[Fares] {}: boundary stop not found (no eligible stops)", trip.name),
        }
        report.issues.push(FareIssue::BoundaryNotFound { closest_m: cut.closest_boundary_m });
        return report;
    };

    if cut.landmark.is_none() {
        debug!("[Fares] {}: landmark stop not found, landmark tier is 0", trip.name);
        report.issues.push(FareIssue::LandmarkNotFound);
    }

    let before = sum_positions(trip, events, excluded, 0..=boundary);
    let after = sum_positions(trip, events, excluded, boundary + 1..=usize::MAX);

    let metrics = match trip.direction {
        Direction::Outbound => {
            let landmark = match cut.landmark {
                Some(l) if l < boundary => sum_positions(trip, events, excluded, l + 1..=boundary).boarding,
                _ => 0,
            };
            let minimum = before.alighting - before.exempt;
            FareMetrics {
                minimum,
                maximum: before.boarding - landmark - minimum - before.exempt,
                boundary: 0,
                landmark,
                exempt: before.exempt + after.boarding,
            }
        }
        Direction::Inbound => {
            let landmark = match cut.landmark {
                Some(l) if l > boundary => sum_positions(trip, events, excluded, boundary + 1..=l).alighting,
                _ => 0,
            };
            FareMetrics {
                minimum: after.boarding - after.exempt,
                maximum: before.boarding - before.alighting - landmark,
                boundary: before.alighting - before.exempt,
                landmark,
                exempt: before.exempt + after.exempt,
            }
        }
    };

    debug!(
        "[Fares] {} ({}): boundary at {}, landmark at {:?} | min={} max={} boundary={} landmark={} exempt={}",
        trip.name,
        trip.direction,
        boundary,
        cut.landmark,
        metrics.minimum,
        metrics.maximum,
        metrics.boundary,
        metrics.landmark,
        metrics.exempt
    );

    for (category, value) in metrics.negative_categories() {
        warn!("[Fares] {}: {} is negative ({})", trip.name, category, value);
        report.issues.push(FareIssue::NegativeCategory { category, value });
    }

    let actual = metrics.total();
    if actual == total_boarding {
        debug!("[Fares] {}: categories sum to trip boarding ({})", trip.name, actual);
    } else {
        warn!(
            "[Fares] {}: categories sum to {} but trip boarded {}",
            trip.name, actual, total_boarding
        );
        report.issues.push(FareIssue::ConservationMismatch { expected: total_boarding, actual });
    }

    report.metrics = metrics;
    report
}

/// Fare metrics of one trip.
///
/// # Example
/// ```
/// use apc_fare_zones::{attribute_fares, segment_trips, FareConfig, GpsPoint, SegmentationStrategy, StopEvent};
///
/// let config = FareConfig::default();
/// let elsewhere = GpsPoint::new(-30.06, -51.13);
/// let events = vec![
///     StopEvent::new(1, elsewhere, "06:00:00", 5, 0),
///     StopEvent::new(2, config.reference_points.boundary_outbound, "06:10:00", 3, 2),
///     StopEvent::new(3, elsewhere, "06:20:00", 4, 0),
/// ];
///
/// let segmentation = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
/// let metrics = attribute_fares(&segmentation.trips[0], &events, &config);
/// assert_eq!((metrics.minimum, metrics.maximum, metrics.exempt), (2, 6, 4));
/// assert_eq!(metrics.total(), 12);
/// ```
pub fn attribute_fares(trip: &Trip, events: &[StopEvent], config: &FareConfig) -> FareMetrics {
    attribute_trip(trip, events, config).metrics
}

/// Field-wise sum of [`attribute_fares`] over every trip.
pub fn attribute_all_trips(trips: &[Trip], events: &[StopEvent], config: &FareConfig) -> FareMetrics {
    let total: FareMetrics = trips.iter().map(|t| attribute_fares(t, events, config)).sum();
    info!(
        "[Fares] {} trips: min={} max={} boundary={} landmark={} exempt={} (total {})",
        trips.len(),
        total.minimum,
        total.maximum,
        total.boundary,
        total.landmark,
        total.exempt,
        total.total()
    );
    total
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::offset_meters;
    use crate::trips::{segment_trips, SegmentationStrategy};
    use crate::GpsPoint;

    // Outbound trips fall in trip-1, inbound trips in trip-2
    fn time_for(direction: Direction) -> &'static str {
        match direction {
            Direction::Outbound => "06:00:00",
            Direction::Inbound => "09:00:00",
        }
    }

    struct Stop {
        at: Place,
        boarding: u32,
        alighting: u32,
        exempt: u32,
    }

    #[derive(Clone, Copy)]
    enum Place {
        Elsewhere,
        Boundary,
        Landmark,
        NearBoundary(f64),
    }

    fn stop(at: Place, boarding: u32, alighting: u32, exempt: u32) -> Stop {
        Stop { at, boarding, alighting, exempt }
    }

    fn build(direction: Direction, stops: &[Stop], config: &FareConfig) -> Vec<StopEvent> {
        let refs = &config.reference_points;
        stops
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let position = match s.at {
                    Place::Elsewhere => offset_meters(&refs.boundary(direction), 1000.0, 0.0),
                    Place::Boundary => refs.boundary(direction),
                    Place::Landmark => refs.landmark(direction),
                    Place::NearBoundary(m) => offset_meters(&refs.boundary(direction), m, 0.0),
                };
                StopEvent::new(i as u32 + 1, position, time_for(direction), s.boarding, s.alighting)
                    .with_exempt_alighting(s.exempt)
            })
            .collect()
    }

    fn run(direction: Direction, stops: &[Stop], config: &FareConfig) -> TripFareReport {
        let events = build(direction, stops, config);
        let seg = segment_trips(&events, config, SegmentationStrategy::TimeWindows);
        assert_eq!(seg.trips.len(), 1);
        assert_eq!(seg.trips[0].direction, direction);
        attribute_trip(&seg.trips[0], &events, config)
    }

    fn five_stops() -> Vec<Stop> {
        use Place::*;
        vec![
            stop(Elsewhere, 6, 0, 0),
            stop(Elsewhere, 4, 2, 1),
            stop(Boundary, 3, 1, 0),
            stop(Elsewhere, 2, 5, 1),
            stop(Elsewhere, 0, 7, 0),
        ]
    }

    #[test]
    fn test_conservation_outbound() {
        let report = run(Direction::Outbound, &five_stops(), &FareConfig::default());
        assert_eq!(report.cut_points.boundary, Some(2));
        assert_eq!(
            report.metrics,
            FareMetrics { minimum: 2, maximum: 10, boundary: 0, landmark: 0, exempt: 3 }
        );
        assert_eq!(report.metrics.total(), 15);
        assert_eq!(report.total_boarding, 15);
        assert_eq!(report.issues, vec![FareIssue::LandmarkNotFound]);
    }

    #[test]
    fn test_conservation_inbound() {
        let report = run(Direction::Inbound, &five_stops(), &FareConfig::default());
        assert_eq!(report.cut_points.boundary, Some(2));
        assert_eq!(
            report.metrics,
            FareMetrics { minimum: 1, maximum: 10, boundary: 2, landmark: 0, exempt: 2 }
        );
        assert_eq!(report.metrics.total(), report.total_boarding);
    }

    #[test]
    fn test_end_to_end_outbound_scenario() {
        use Place::*;
        let stops = [
            stop(Elsewhere, 5, 0, 0),
            stop(NearBoundary(10.0), 3, 2, 0),
            stop(Elsewhere, 4, 0, 0),
        ];
        let metrics = run(Direction::Outbound, &stops, &FareConfig::default()).metrics;
        assert_eq!(metrics.minimum, 2);
        assert_eq!(metrics.exempt, 4);
        assert_eq!(metrics.landmark, 0);
        assert_eq!(metrics.boundary, 0);
        assert_eq!(metrics.maximum, 6);
        assert_eq!(metrics.total(), 12);
    }

    #[test]
    fn test_match_tolerance_is_strict() {
        use Place::*;
        let config = FareConfig::default();

        let inside = run(Direction::Outbound, &[stop(Elsewhere, 1, 0, 0), stop(NearBoundary(49.9), 1, 0, 0)], &config);
        assert_eq!(inside.cut_points.boundary, Some(1));

        let outside = run(Direction::Outbound, &[stop(Elsewhere, 1, 0, 0), stop(NearBoundary(50.1), 1, 0, 0)], &config);
        assert_eq!(outside.cut_points.boundary, None);
        let closest = outside.cut_points.closest_boundary_m.unwrap();
        assert!((closest - 50.1).abs() < 0.01, "closest was {closest}");
    }

    #[test]
    fn test_first_boundary_match_wins() {
        use Place::*;
        let stops = [stop(NearBoundary(30.0), 2, 0, 0), stop(Boundary, 2, 0, 0), stop(Elsewhere, 1, 0, 0)];
        let report = run(Direction::Outbound, &stops, &FareConfig::default());
        assert_eq!(report.cut_points.boundary, Some(0));
    }

    #[test]
    fn test_missing_boundary_yields_zeros() {
        use Place::*;
        let stops = [stop(Elsewhere, 4, 1, 0), stop(NearBoundary(200.0), 2, 2, 1)];
        let report = run(Direction::Inbound, &stops, &FareConfig::default());
        assert!(report.metrics.is_zero());
        assert_eq!(report.total_boarding, 6);
        assert!(matches!(report.issues.as_slice(), [FareIssue::BoundaryNotFound { closest_m: Some(_) }]));
    }

    #[test]
    fn test_outbound_landmark_sums_boarding() {
        use Place::*;
        let stops = [
            stop(Elsewhere, 4, 0, 0),
            stop(Landmark, 3, 0, 0),
            stop(Elsewhere, 2, 0, 0),
            stop(Boundary, 1, 2, 0),
            stop(Elsewhere, 5, 0, 0),
        ];
        let report = run(Direction::Outbound, &stops, &FareConfig::default());
        assert_eq!(report.cut_points.landmark, Some(1));
        assert_eq!(
            report.metrics,
            FareMetrics { minimum: 2, maximum: 5, boundary: 0, landmark: 3, exempt: 5 }
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_outbound_landmark_after_boundary_ignored() {
        use Place::*;
        let stops = [stop(Boundary, 4, 0, 0), stop(Landmark, 3, 1, 0)];
        let report = run(Direction::Outbound, &stops, &FareConfig::default());
        assert_eq!(report.cut_points.landmark, Some(1));
        assert_eq!(report.metrics.landmark, 0);
    }

    #[test]
    fn test_inbound_landmark_sums_alighting() {
        use Place::*;
        let stops = [
            stop(Elsewhere, 12, 0, 0),
            stop(Boundary, 2, 1, 0),
            stop(Elsewhere, 0, 3, 0),
            stop(Landmark, 1, 4, 0),
            stop(Elsewhere, 0, 0, 0),
        ];
        let report = run(Direction::Inbound, &stops, &FareConfig::default());
        assert_eq!(
            report.metrics,
            FareMetrics { minimum: 1, maximum: 6, boundary: 1, landmark: 7, exempt: 0 }
        );
        assert_eq!(report.metrics.total(), 15);
        assert!(report.is_clean());
    }

    #[test]
    fn test_negative_category_reported_not_clamped() {
        use Place::*;
        let stops = [stop(Boundary, 0, 5, 0), stop(Elsewhere, 3, 0, 0)];
        let report = run(Direction::Outbound, &stops, &FareConfig::default());
        assert_eq!(report.metrics.maximum, -5);
        assert_eq!(report.metrics.total(), 3);
        assert!(report
            .issues
            .contains(&FareIssue::NegativeCategory { category: FareCategory::Maximum, value: -5 }));
    }

    #[test]
    fn test_exclusion_in_place_equals_removal() {
        use Place::*;
        let mut config = FareConfig::default();
        config.excluded_stations.insert(99);

        for direction in [Direction::Outbound, Direction::Inbound] {
            let kept = build(direction, &five_stops(), &config);

            // Artifact rows: one sitting on the Boundary before the real one, one after it
            let mut with_artifacts = kept.clone();
            let mut fake_boundary = build(direction, &[stop(Boundary, 7, 3, 1)], &config).remove(0);
            fake_boundary.station_number = 99;
            let mut fake_after = build(direction, &[stop(Elsewhere, 9, 9, 2)], &config).remove(0);
            fake_after.station_number = 99;
            with_artifacts.insert(1, fake_boundary);
            with_artifacts.insert(5, fake_after);

            let seg_kept = segment_trips(&kept, &config, SegmentationStrategy::TimeWindows);
            let seg_all = segment_trips(&with_artifacts, &config, SegmentationStrategy::TimeWindows);

            let removed = attribute_trip(&seg_kept.trips[0], &kept, &config);
            let in_place = attribute_trip(&seg_all.trips[0], &with_artifacts, &config);

            assert_eq!(in_place.cut_points.boundary, Some(3));
            assert_eq!(removed.cut_points.boundary, Some(2));
            assert_eq!(in_place.metrics, removed.metrics);
            assert_eq!(in_place.total_boarding, removed.total_boarding);
        }
    }

    #[test]
    fn test_all_trips_is_field_wise_sum() {
        let config = FareConfig::default();
        let mut events = build(Direction::Outbound, &five_stops(), &config);
        events.extend(build(Direction::Inbound, &five_stops(), &config));
        let seg = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
        assert_eq!(seg.trips.len(), 2);

        let total = attribute_all_trips(&seg.trips, &events, &config);
        let expected = attribute_fares(&seg.trips[0], &events, &config) + attribute_fares(&seg.trips[1], &events, &config);
        assert_eq!(total, expected);
        assert_eq!(total.total(), 30);

        assert!(attribute_all_trips(&[], &events, &config).is_zero());
    }

    #[test]
    fn test_custom_reference_points() {
        let mut config = FareConfig::default();
        let moved = GpsPoint::new(-30.0500, -51.1500);
        config.reference_points.boundary_outbound = moved;
        let events = vec![
            StopEvent::new(1, moved, "06:00:00", 2, 1),
            StopEvent::new(2, GpsPoint::new(-30.06, -51.16), "06:05:00", 3, 0),
        ];
        let seg = segment_trips(&events, &config, SegmentationStrategy::TimeWindows);
        let report = attribute_trip(&seg.trips[0], &events, &config);
        assert_eq!(report.cut_points.boundary, Some(0));
        assert_eq!(report.metrics.exempt, 3);
    }

    #[test]
    fn test_issue_display() {
        let issue = FareIssue::ConservationMismatch { expected: 12, actual: 11 };
        assert_eq!(issue.to_string(), "categories sum to 11, trip boarded 12");
        let issue = FareIssue::NegativeCategory { category: FareCategory::Maximum, value: -2 };
        assert_eq!(issue.to_string(), "maximum is negative (-2)");
    }
}
