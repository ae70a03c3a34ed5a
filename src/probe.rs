//! Reference-point probe.
//!
//! Answers "which recorded stops came close to this coordinate?" when a trip
//! reports its Boundary or Landmark as not found. An R-tree over the event
//! positions narrows candidates with a degree envelope, then the exact
//! haversine distance decides. Diagnostics only; fare attribution does its
//! own linear scan in trip order.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees, EARTH_RADIUS_M};
use crate::{GpsPoint, StopEvent};

/// A stop position with its event index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedStop {
    idx: usize,
    station_number: u32,
    lat: f64,
    lng: f64,
}

impl IndexedStop {
    fn position(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lng)
    }
}

impl RTreeObject for IndexedStop {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedStop {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// A stop found near a probed coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeHit {
    /// Index into the event sequence
    pub index: usize,
    pub station_number: u32,
    pub distance_m: f64,
}

/// Spatial index over the positions of a loaded event sequence.
pub struct ReferenceProbe {
    tree: RTree<IndexedStop>,
}

impl ReferenceProbe {
    pub fn new(events: &[StopEvent]) -> Self {
        let indexed: Vec<IndexedStop> = events
            .iter()
            .enumerate()
            .map(|(i, e)| IndexedStop {
                idx: i,
                station_number: e.station_number,
                lat: e.position.latitude,
                lng: e.position.longitude,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Stops strictly closer than `radius_m` to `reference`, nearest first.
    ///
    /// # Example
    /// ```
    /// use apc_fare_zones::{GpsPoint, ReferenceProbe, StopEvent};
    ///
    /// let landmark = GpsPoint::new(-30.094485, -51.079701);
    /// let events = vec![
    ///     StopEvent::new(41, GpsPoint::new(-30.0950, -51.0790), "09:10:00", 1, 0),
    ///     StopEvent::new(42, GpsPoint::new(-30.0945, -51.0797), "09:12:00", 0, 2),
    ///     StopEvent::new(43, GpsPoint::new(-30.1100, -51.0600), "09:20:00", 0, 1),
    /// ];
    ///
    /// let probe = ReferenceProbe::new(&events);
    /// let hits = probe.near(&landmark, 150.0);
    /// assert_eq!(hits.iter().map(|h| h.station_number).collect::<Vec<_>>(), vec![42, 41]);
    /// ```
    pub fn near(&self, reference: &GpsPoint, radius_m: f64) -> Vec<ProbeHit> {
        if !(radius_m > 0.0) {
            return Vec::new();
        }

        // Envelope slightly wider than the radius; haversine makes the final cut
        let radius_deg = meters_to_degrees(radius_m * 1.01, reference.latitude);
        let query = [reference.latitude, reference.longitude];

        let mut hits: Vec<ProbeHit> = self
            .tree
            .locate_within_distance(query, radius_deg * radius_deg)
            .filter_map(|stop| {
                let distance_m = haversine_distance(&stop.position(), reference);
                (distance_m < radius_m).then_some(ProbeHit {
                    index: stop.idx,
                    station_number: stop.station_number,
                    distance_m,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m).then(a.index.cmp(&b.index)));
        hits
    }

    /// The stop closest to `reference`, however far.
    ///
    /// The tree orders candidates by degree distance, which undercounts
    /// longitude away from the equator, so candidates are re-ranked by
    /// haversine until no farther one can still win.
    pub fn nearest(&self, reference: &GpsPoint) -> Option<ProbeHit> {
        let query = [reference.latitude, reference.longitude];
        let mut best: Option<ProbeHit> = None;

        for stop in self.tree.nearest_neighbor_iter(&query) {
            if let Some(hit) = &best {
                let degrees = stop.distance_2(&query).sqrt();
                if min_meters_for_degrees(degrees, reference.latitude) > hit.distance_m {
                    break;
                }
            }
            let distance_m = haversine_distance(&stop.position(), reference);
            if best.map_or(true, |hit| distance_m < hit.distance_m) {
                best = Some(ProbeHit {
                    index: stop.idx,
                    station_number: stop.station_number,
                    distance_m,
                });
            }
        }
        best
    }
}

/// Lower bound in meters for a point `degrees` away (Euclidean, in degrees) from `latitude`.
fn min_meters_for_degrees(degrees: f64, latitude: f64) -> f64 {
    // Longitude shrinks by cos(latitude); the farthest latitude reachable is |lat| + degrees
    let worst_lat = (latitude.abs() + degrees).min(90.0);
    EARTH_RADIUS_M * degrees.to_radians() * worst_lat.to_radians().cos()
}
