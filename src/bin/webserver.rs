use std::path::Path;
use std::sync::Arc;
use urlencoding::decode;
use warp::Filter;

use route_board::gtfs::db::GTFSSource;
use route_summary::summary::{resolve_stops, sample_timetable};
use route_summary::types::{Route, RouteId, ScheduleTables};

use serde::Serialize;

#[derive(Serialize)]
struct FECounts {
    routes: usize,
    stops: usize,
    trips: usize,
    stop_times: usize,
}

#[derive(Serialize)]
struct FERoute<'s> {
    route_id: &'s str,
    route_short_name: &'s str,
    route_long_name: &'s str,
    route_desc: &'s str,
}

#[derive(Serialize)]
struct FEMapStop<'s> {
    stop_name: &'s str,
    stop_lat: f64,
    stop_lon: f64,
}

#[derive(Serialize)]
struct FERouteStop {
    stop_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    direction: String,
    sequence: u32,
}

#[derive(Serialize)]
struct FETiming {
    stop_name: String,
    arrival_time: String,
    departure_time: String,
    direction: String,
    sequence: u32,
}

fn with_data<D: Sync + Send>(
    db: Arc<D>,
) -> impl Filter<Extract = (Arc<D>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn summary_reply(data: Arc<ScheduleTables>) -> impl warp::Reply {
    warp::reply::json(&FECounts {
        routes: data.route_count(),
        stops: data.stop_count(),
        trips: data.trip_count(),
        stop_times: data.stop_time_count(),
    })
}

/// Long names ascending with unnamed routes listed last, the order a SQL
/// `ORDER BY route_long_name` gives over a nullable column
fn sorted_routes(data: &ScheduleTables) -> Vec<&Route> {
    let mut routes: Vec<&Route> = data.routes().collect();
    routes.sort_by(|a, b| {
        (a.route_long_name.is_none(), &a.route_long_name, &a.route_id)
            .cmp(&(b.route_long_name.is_none(), &b.route_long_name, &b.route_id))
    });
    routes
}

fn routes_reply(data: Arc<ScheduleTables>) -> impl warp::Reply {
    let routes: Vec<FERoute> = sorted_routes(&data)
        .iter()
        .map(|route| FERoute {
            route_id: route.route_id.as_str(),
            route_short_name: &route.route_short_name,
            route_long_name: route.route_long_name.as_deref().unwrap_or(""),
            route_desc: route.route_desc.as_deref().unwrap_or(""),
        })
        .collect();
    warp::reply::json(&routes)
}

/// Map markers; stops without coordinates can't be plotted and are left out
fn map_stops_reply(data: Arc<ScheduleTables>) -> impl warp::Reply {
    let mut stops: Vec<FEMapStop> = data
        .stops()
        .filter_map(|stop| {
            stop.location.map(|location| FEMapStop {
                stop_name: &stop.stop_name,
                stop_lat: location.x(),
                stop_lon: location.y(),
            })
        })
        .collect();
    stops.sort_by(|a, b| a.stop_name.cmp(b.stop_name));
    warp::reply::json(&stops)
}

async fn route_stops_handler(
    route_id: String,
    data: Arc<ScheduleTables>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match decode(&route_id) {
        Ok(route_id) => {
            let rows: Vec<FERouteStop> = resolve_stops(&data, &RouteId::new(route_id))
                .into_iter()
                .map(|row| FERouteStop {
                    stop_name: row.stop_name,
                    latitude: row.location.map(|location| location.x()),
                    longitude: row.location.map(|location| location.y()),
                    direction: row.direction.to_string(),
                    sequence: row.first_sequence,
                })
                .collect();
            Ok(warp::reply::json(&rows))
        }
        Err(err) => {
            eprintln!("route_stops: failed to decode route={:?}: {:?}", route_id, err);
            Err(warp::reject::reject())
        }
    }
}

async fn route_timings_handler(
    route_id: String,
    data: Arc<ScheduleTables>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match decode(&route_id) {
        Ok(route_id) => {
            let rows: Vec<FETiming> = sample_timetable(&data, &RouteId::new(route_id))
                .into_iter()
                .map(|row| FETiming {
                    stop_name: row.stop_name,
                    arrival_time: row.arrival_time,
                    departure_time: row.departure_time,
                    direction: row.direction.to_string(),
                    sequence: row.stop_sequence,
                })
                .collect();
            Ok(warp::reply::json(&rows))
        }
        Err(err) => {
            eprintln!(
                "route_timings: failed to decode route={:?}: {:?}",
                route_id, err
            );
            Err(warp::reject::reject())
        }
    }
}

fn api_routes(
    data: Arc<ScheduleTables>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors().allow_any_origin();
    let summary = warp::path!("api" / "summary")
        .and(with_data(data.clone()))
        .map(summary_reply);
    let routes = warp::path!("api" / "routes")
        .and(with_data(data.clone()))
        .map(routes_reply);
    let stops = warp::path!("api" / "stops")
        .and(with_data(data.clone()))
        .map(map_stops_reply);
    let route_stops = warp::path!("api" / "route_stops" / String)
        .and(with_data(data.clone()))
        .and_then(route_stops_handler);
    let route_timings = warp::path!("api" / "route_timings" / String)
        .and(with_data(data))
        .and_then(route_timings_handler);
    summary
        .or(routes)
        .or(stops)
        .or(route_stops)
        .or(route_timings)
        .with(cors)
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8085".to_owned())
        .parse()
        .unwrap();
    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_owned());
    let gtfs_dir = std::env::var("GTFS_DIR").unwrap_or_else(|_| "gtfs".to_owned());

    let source = GTFSSource::new(Path::new(&gtfs_dir));
    let data = match source.load_tables() {
        Ok((tables, _stats)) => Arc::new(tables),
        Err(error) => {
            eprintln!("Failed to load GTFS tables from {}: {}", gtfs_dir, error);
            std::process::exit(1);
        }
    };

    eprintln!("Starting web server on port {}", port);
    warp::serve(warp::fs::dir(static_dir).or(api_routes(data)))
        .run(([0, 0, 0, 0], port))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_summary::types::RouteId;

    fn route(id: &str, long_name: Option<&str>) -> Route {
        Route {
            route_id: RouteId::new(id),
            route_short_name: id.to_string(),
            route_long_name: long_name.map(str::to_string),
            route_desc: None,
        }
    }

    #[test]
    fn unnamed_routes_list_last() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R3", None))
            .add_route(route("R2", Some("Airport Express")))
            .add_route(route("R1", Some("City Circular")));
        let tables = builder.build();

        let ids: Vec<&str> = sorted_routes(&tables)
            .iter()
            .map(|route| route.route_id.as_str())
            .collect();
        assert_eq!(ids, vec!["R2", "R1", "R3"]);
    }
}
