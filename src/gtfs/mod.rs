//! CSV-facing models of the static GTFS text files, as defined at
//! [https://developers.google.com/transit/gtfs/reference].
//! Documentation on this module uses excerpts from that reference.
//!
//! These records mirror the feed's column layout; `db` converts them into
//! the `route_summary` table types the summaries run on.

use serde::Deserialize;

pub use route_summary::types::{DirectionId, Route, RouteId, Stop, StopId, StopTime, Trip, TripId};

pub mod db;

/// GTFS record from routes.txt
#[derive(Debug, Deserialize)]
pub struct RouteRecord {
    /// Identifies a route.
    pub route_id: RouteId,
    /// Short name of a route. This will often be a short, abstract
    /// identifier like "32", "100X", or "Green" that riders use to identify
    /// a route. Either route_short_name or route_long_name must be
    /// specified, or potentially both if appropriate.
    #[serde(default)]
    pub route_short_name: String,
    /// Full name of a route. This name is generally more descriptive than
    /// the route_short_name and often includes the route's destination.
    #[serde(default)]
    pub route_long_name: Option<String>,
    /// Description of a route that provides useful, quality information.
    #[serde(default)]
    pub route_desc: Option<String>,
}

/// GTFS record from stops.txt
#[derive(Debug, Deserialize)]
pub struct StopRecord {
    /// Identifies a stop, station, or station entrance.
    pub stop_id: StopId,
    /// Name of the location. Use a name that people will understand in the
    /// local and tourist vernacular.
    #[serde(default)]
    pub stop_name: String,
    /// Latitude of the location. Conditionally required; generic nodes and
    /// boarding areas may omit it, so a blank cell must load as absent.
    #[serde(default)]
    pub stop_lat: Option<f64>,
    /// Longitude of the location. Conditionally required, as stop_lat.
    #[serde(default)]
    pub stop_lon: Option<f64>,
}

/// GTFS record from trips.txt
#[derive(Debug, PartialEq, Deserialize)]
pub struct TripRecord {
    /// Identifies a route.
    pub route_id: RouteId,
    /// Identifies a trip.
    pub trip_id: TripId,
    /// Indicates the direction of travel for a trip. This field is not used
    /// in routing; it provides a way to separate trips by direction.
    #[serde(default, deserialize_with = "direction_id_format::deserialize")]
    pub direction_id: Option<DirectionId>,
}

/// GTFS record from stop_times.txt
#[derive(Debug, Deserialize)]
pub struct StopTimeRecord {
    /// Identifies a trip.
    pub trip_id: TripId,
    /// Arrival time at a specific stop for a specific trip on a route. For
    /// times occurring after midnight on the service day, enter the time as
    /// a value greater than 24:00:00 in HH:MM:SS local time for the day on
    /// which the trip schedule begins. Carried verbatim for that reason.
    #[serde(default)]
    pub arrival_time: String,
    /// Departure time from a specific stop for a specific trip on a route.
    /// Same after-midnight convention as arrival_time; carried verbatim.
    #[serde(default)]
    pub departure_time: String,
    /// Identifies the serviced stop. A stop may be serviced multiple times
    /// in the same trip, and multiple trips and routes may service the same
    /// stop.
    pub stop_id: StopId,
    /// Order of stops for a particular trip. The values must increase along
    /// the trip but do not need to be consecutive.
    pub stop_sequence: u32,
}

/// 0 - Travel in one direction (e.g. outbound travel).
/// 1 - Travel in the opposite direction (e.g. inbound travel).
///
/// Feeds put all sorts of things in this column. Blank means the feed does
/// not say, which is what allows the positional fallback; any other value is
/// kept as present-but-other so junk never silently enables that fallback.
pub mod direction_id_format {
    use route_summary::types::DirectionId;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DirectionId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let field = String::deserialize(deserializer)?;
        Ok(match field.trim() {
            "" => None,
            "0" => Some(DirectionId::Outbound),
            "1" => Some(DirectionId::Inbound),
            _ => Some(DirectionId::Other),
        })
    }
}

impl From<RouteRecord> for Route {
    fn from(record: RouteRecord) -> Route {
        Route {
            route_id: record.route_id,
            route_short_name: record.route_short_name,
            route_long_name: record.route_long_name,
            route_desc: record.route_desc,
        }
    }
}

impl From<StopRecord> for Stop {
    fn from(record: StopRecord) -> Stop {
        // a half-present coordinate pair is as unusable as none at all
        let location = match (record.stop_lat, record.stop_lon) {
            (Some(lat), Some(lon)) => Some(geo::Point::new(lat, lon)),
            _ => None,
        };
        Stop {
            stop_id: record.stop_id,
            stop_name: record.stop_name,
            location,
        }
    }
}

impl From<TripRecord> for Trip {
    fn from(record: TripRecord) -> Trip {
        Trip {
            trip_id: record.trip_id,
            route_id: record.route_id,
            direction_id: record.direction_id,
        }
    }
}

impl From<StopTimeRecord> for StopTime {
    fn from(record: StopTimeRecord) -> StopTime {
        StopTime {
            trip_id: record.trip_id,
            stop_id: record.stop_id,
            stop_sequence: record.stop_sequence,
            arrival_time: record.arrival_time,
            departure_time: record.departure_time,
        }
    }
}
