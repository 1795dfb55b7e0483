//! The table set the summarizer derives from, as defined by the static GTFS
//! reference at [https://developers.google.com/transit/gtfs/reference].
//! Only the columns the summaries need are modelled; everything else in the
//! feed is ignored by the loader.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies a route. GTFS ids are opaque text, so they are kept verbatim;
/// `Ord` is the feed's own lexicographic id order.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct RouteId(String);

/// Identifies a stop, station, or station entrance.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct StopId(String);

/// Identifies a trip. Lexicographic `Ord` is load-bearing: the timetable
/// sampler picks the smallest trip id of a direction group, which has to
/// agree with `MIN(trip_id)` over a text column in a relational source.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct TripId(String);

macro_rules! string_id {
    ($id:ident) => {
        impl $id {
            pub fn new(id: impl Into<String>) -> $id {
                $id(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(RouteId);
string_id!(StopId);
string_id!(TripId);

/// The `direction_id` column of trips.txt as it appears in the feed.
/// 0 - outbound travel, 1 - inbound travel. Feeds are allowed to put other
/// values there; those are carried as `Other` rather than rejected, because
/// a junk direction still tells us the column exists.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum DirectionId {
    Outbound,
    Inbound,
    Other,
}

/// Travel direction of a trip or stop-time row as the summaries report it.
/// Variant order is the display rank: Forward sorts before Backward sorts
/// before Unknown.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum DirectionLabel {
    Forward,
    Backward,
    Unknown,
}

impl fmt::Display for DirectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "Forward [F]",
            Self::Backward => "Backward [B]",
            Self::Unknown => "Unknown",
        })
    }
}

/// GTFS record from routes.txt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteId,
    pub route_short_name: String,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
}

/// GTFS record from stops.txt. Coordinates are conditionally required by the
/// reference and really are absent in some feeds, so the location is kept
/// optional rather than defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,
    pub stop_name: String,
    pub location: Option<geo::Point<f64>>,
}

/// GTFS record from trips.txt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub direction_id: Option<DirectionId>,
}

/// GTFS record from stop_times.txt. Arrival and departure stay free-form
/// text: GTFS times run past 24:00:00 for trips continuing after midnight,
/// so they must not be forced into a bounded clock type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: TripId,
    pub stop_id: StopId,
    pub stop_sequence: u32,
    pub arrival_time: String,
    pub departure_time: String,
}

/// One loaded snapshot of the four flat tables, read-only once built.
/// Summaries take this as an explicit parameter; there is no ambient global
/// table state. Refreshing a feed means building a new `ScheduleTables` and
/// swapping the whole snapshot, never mutating one in place under readers.
#[derive(Debug)]
pub struct ScheduleTables {
    routes: HashMap<RouteId, Route>,
    stops: HashMap<StopId, Stop>,
    trips: HashMap<TripId, Trip>,
    /// Rows grouped per trip, sorted by `stop_sequence`
    stop_times: HashMap<TripId, Vec<StopTime>>,
}

impl ScheduleTables {
    pub fn builder() -> Builder {
        Builder {
            data: ScheduleTables {
                routes: HashMap::new(),
                stops: HashMap::new(),
                trips: HashMap::new(),
                stop_times: HashMap::new(),
            },
        }
    }

    pub fn get_route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn get_stop(&self, id: &StopId) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.values()
    }

    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    /// All trips operating the route, in no particular order
    pub fn trips_of_route<'t>(&'t self, route_id: &'t RouteId) -> impl Iterator<Item = &'t Trip> {
        self.trips
            .values()
            .filter(move |trip| &trip.route_id == route_id)
    }

    /// The trip's visitation sequence, sorted by `stop_sequence`, empty for
    /// an unknown trip
    pub fn stop_times_of(&self, trip_id: &TripId) -> &[StopTime] {
        self.stop_times
            .get(trip_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn stop_time_count(&self) -> usize {
        self.stop_times.values().map(Vec::len).sum()
    }
}

pub struct Builder {
    data: ScheduleTables,
}

impl Builder {
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        self.data.routes.insert(route.route_id.clone(), route);
        self
    }

    pub fn add_stop(&mut self, stop: Stop) -> &mut Self {
        self.data.stops.insert(stop.stop_id.clone(), stop);
        self
    }

    pub fn add_trip(&mut self, trip: Trip) -> &mut Self {
        self.data.trips.insert(trip.trip_id.clone(), trip);
        self
    }

    pub fn add_stop_time(&mut self, stop_time: StopTime) -> &mut Self {
        self.data
            .stop_times
            .entry(stop_time.trip_id.clone())
            .or_insert_with(Vec::new)
            .push(stop_time);
        self
    }

    /// Sorts each trip's rows into visitation order. `(trip_id,
    /// stop_sequence)` is unique within a feed; should a broken feed repeat
    /// a sequence number, the first row wins.
    pub fn build(mut self) -> ScheduleTables {
        for rows in self.data.stop_times.values_mut() {
            rows.sort_by_key(|stop_time| stop_time.stop_sequence);
            rows.dedup_by(|a, b| a.stop_sequence == b.stop_sequence);
        }
        self.data
    }
}

#[cfg(test)]
mod test_tables {
    use super::*;

    fn stop_time(trip: &str, stop: &str, sequence: u32) -> StopTime {
        StopTime {
            trip_id: TripId::new(trip),
            stop_id: StopId::new(stop),
            stop_sequence: sequence,
            arrival_time: "08:00:00".to_string(),
            departure_time: "08:01:00".to_string(),
        }
    }

    #[test]
    fn sorts_rows_into_visitation_order() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_stop_time(stop_time("T1", "C", 3))
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 2));
        let tables = builder.build();

        let sequences: Vec<u32> = tables
            .stop_times_of(&TripId::new("T1"))
            .iter()
            .map(|stop_time| stop_time.stop_sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn first_row_wins_on_repeated_sequence_number() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 1));
        let tables = builder.build();

        let rows = tables.stop_times_of(&TripId::new("T1"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stop_id, StopId::new("A"));
    }

    #[test]
    fn unknown_trip_has_no_rows() {
        let tables = ScheduleTables::builder().build();
        assert!(tables.stop_times_of(&TripId::new("nope")).is_empty());
    }
}
