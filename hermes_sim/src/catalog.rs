/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{collections::{BTreeMap, BTreeSet, HashMap}, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    Direction, InterestPoint, SimMode, VehicleCategory,
    clock::DAY_SECS,
    geo::{PlanarPoint, path_length},
    gtfs::{GtfsFeed, GtfsRoute, GtfsShapePoint, GtfsStopTime, GtfsTrip},
};

#[derive(Debug,Clone)]
pub struct RouteRecord {
    pub id: String,
    pub name: String,      // display (short) name, e.g. "66"
    pub long_name: String,
    pub category: VehicleCategory,
}

/// the static part of a trip. This is immutable once the catalog is built
#[derive(Debug,Clone)]
pub struct TripRecord {
    pub id: Arc<String>, // shared with registry keys and vehicle snapshots
    pub route_id: String,
    pub route_name: Arc<String>,
    pub headsign: String,
    pub direction: Direction,
    pub category: VehicleCategory,
    pub path: Vec<PlanarPoint>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub path_length: f64,
}

impl TripRecord {
    /// trips with less than two distinct path points cannot be interpolated
    pub fn is_well_formed (&self)->bool {
        self.path.len() > 1 && self.path_length > 0.0
    }

    /// the scheduled window, provided both ends are defined and ordered
    pub fn schedule_window (&self)->Option<(f64,f64)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start <= end => Some((start,end)),
            _ => None
        }
    }
}

/// the immutable index of routes, trips and trip geometry
#[derive(Debug)]
pub struct ScheduleCatalog {
    routes: HashMap<String,RouteRecord>,
    trips: Vec<TripRecord>,
    trip_index: HashMap<String,usize>,
    malformed: Vec<usize>,
    interest_points: Vec<InterestPoint>,
    affected_routes: BTreeMap<String,BTreeSet<String>>, // interest point name -> route names
}

impl ScheduleCatalog {
    pub fn builder (mode: SimMode, interest_points: Vec<InterestPoint>)->CatalogBuilder {
        CatalogBuilder::new( mode, interest_points)
    }

    /// build in the required order: routes, trips, stop times and finally shape points
    pub fn from_gtfs (feed: GtfsFeed, mode: SimMode, interest_points: Vec<InterestPoint>)->Self {
        let mut builder = CatalogBuilder::new( mode, interest_points);
        feed.routes.iter().for_each( |r| builder.add_route(r));
        feed.trips.iter().for_each( |t| builder.add_trip(t));
        feed.stop_times.iter().for_each( |st| builder.add_stop_time(st));
        feed.shapes.iter().for_each( |sp| builder.add_shape_point(sp));
        builder.build()
    }

    pub fn route (&self, route_id: &str)->Option<&RouteRecord> { self.routes.get(route_id) }
    pub fn routes (&self)->impl Iterator<Item=&RouteRecord> { self.routes.values() }
    pub fn n_routes (&self)->usize { self.routes.len() }

    pub fn trip (&self, trip_id: &str)->Option<&TripRecord> {
        self.trip_index.get(trip_id).map( |idx| &self.trips[*idx])
    }
    pub fn trip_at (&self, idx: usize)->&TripRecord { &self.trips[idx] }
    pub fn trips (&self)->&[TripRecord] { self.trips.as_slice() }

    /// indices of all trips that can be ticked
    pub fn well_formed_trips (&self)->impl Iterator<Item=usize> + '_ {
        self.trips.iter().enumerate().filter( |(_,t)| t.is_well_formed()).map( |(i,_)| i)
    }

    pub fn malformed_trips (&self)->impl Iterator<Item=&TripRecord> {
        self.malformed.iter().map( |idx| &self.trips[*idx])
    }

    pub fn interest_points (&self)->&[InterestPoint] { self.interest_points.as_slice() }
    pub fn affected_routes (&self)->&BTreeMap<String,BTreeSet<String>> { &self.affected_routes }

    pub fn is_affected (&self, route_name: &str)->bool {
        self.affected_routes.values().any( |names| names.contains(route_name))
    }

    /// number of catalog routes per vehicle category
    pub fn category_counts (&self)->BTreeMap<VehicleCategory,usize> {
        let mut counts = BTreeMap::new();
        for r in self.routes.values() {
            *counts.entry( r.category).or_insert(0) += 1;
        }
        counts
    }
}

/// projected interest point used while ingesting shapes
struct InterestArea {
    name: String,
    center: PlanarPoint,
    radius: f64 // map units
}

struct TripEntry {
    record: TripRecord,
    shape: Vec<(i64,PlanarPoint)>, // (shape sequence, point) until sorted
}

/// accumulates schedule records. Routes have to be added before the trips that reference them, and trips
/// before their stop times and shape points
pub struct CatalogBuilder {
    mode: SimMode,
    routes: HashMap<String,RouteRecord>,
    trips: Vec<TripEntry>,
    trip_index: HashMap<String,usize>,
    trips_by_shape: HashMap<String,Vec<usize>>,
    interest_points: Vec<InterestPoint>,
    interest_areas: Vec<InterestArea>,
    affected_routes: BTreeMap<String,BTreeSet<String>>,
    n_orphans: usize,
}

impl CatalogBuilder {
    pub fn new (mode: SimMode, interest_points: Vec<InterestPoint>)->Self {
        let interest_areas = interest_points.iter().map( |ip| InterestArea {
            name: ip.name.clone(),
            center: ip.planar_center(),
            radius: ip.planar_radius()
        }).collect();

        CatalogBuilder {
            mode,
            routes: HashMap::new(),
            trips: Vec::new(),
            trip_index: HashMap::new(),
            trips_by_shape: HashMap::new(),
            interest_points,
            interest_areas,
            affected_routes: BTreeMap::new(),
            n_orphans: 0,
        }
    }

    pub fn add_route (&mut self, route: &GtfsRoute) {
        let name = if route.route_short_name.is_empty() { route.route_long_name.clone() } else { route.route_short_name.clone() };
        let rec = RouteRecord {
            id: route.route_id.clone(),
            name,
            long_name: route.route_long_name.clone(),
            category: VehicleCategory::from_route_type( route.route_type),
        };
        self.routes.insert( route.route_id.clone(), rec);
    }

    pub fn add_trip (&mut self, trip: &GtfsTrip) {
        let Some(route) = self.routes.get( &trip.route_id) else {
            warn!("ignoring trip {} with unknown route {}", trip.trip_id, trip.route_id);
            self.n_orphans += 1;
            return
        };
        if self.trip_index.contains_key( &trip.trip_id) {
            warn!("ignoring duplicate trip {}", trip.trip_id);
            return
        }

        let record = TripRecord {
            id: Arc::new( trip.trip_id.clone()),
            route_id: route.id.clone(),
            route_name: Arc::new( route.name.clone()),
            headsign: trip.trip_headsign.clone(),
            direction: Direction::from_direction_id( trip.direction_id),
            category: route.category,
            path: Vec::new(),
            start_time: None,
            end_time: None,
            path_length: 0.0,
        };

        let idx = self.trips.len();
        if let Some(shape_id) = &trip.shape_id {
            self.trips_by_shape.entry( shape_id.clone()).or_default().push(idx);
        }
        self.trip_index.insert( trip.trip_id.clone(), idx);
        self.trips.push( TripEntry{ record, shape: Vec::new() });
    }

    /// sets the start time from the first stop departure and the end time from the latest arrival
    pub fn add_stop_time (&mut self, st: &GtfsStopTime) {
        if self.mode == SimMode::Live { return } // no schedule times needed for live data

        if let Some(idx) = self.trip_index.get( &st.trip_id) {
            let rec = &mut self.trips[*idx].record;
            if st.stop_sequence == 1 {
                if let Some(dep) = st.departure_time.or(st.arrival_time) {
                    rec.start_time = Some(dep as f64);
                }
            }
            if let Some(arr) = st.arrival_time.or(st.departure_time) {
                let arr = arr as f64;
                if rec.end_time.map_or( true, |end| arr > end) {
                    rec.end_time = Some(arr);
                }
            }
        }
    }

    /// appends the (projected) point to all trips of this shape and flags routes that come close to interest points
    pub fn add_shape_point (&mut self, sp: &GtfsShapePoint) {
        let Some(trip_indices) = self.trips_by_shape.get( &sp.shape_id) else { return };
        let p = PlanarPoint::from_lat_lon_degrees( sp.shape_pt_lat, sp.shape_pt_lon);

        let mut affected: Vec<&InterestArea> = Vec::new();
        for area in &self.interest_areas {
            if area.center.distance_to( &p) <= area.radius {
                affected.push( area);
            }
        }

        for idx in trip_indices {
            let entry = &mut self.trips[*idx];
            entry.shape.push( (sp.shape_pt_sequence, p));

            for area in &affected {
                self.affected_routes.entry( area.name.clone()).or_default().insert( entry.record.route_name.to_string());
            }
        }
    }

    /// add a trip with already projected geometry and schedule times (synthetic schedules)
    pub fn add_planar_trip (&mut self, trip: &GtfsTrip, path: &[PlanarPoint], start_time: Option<f64>, end_time: Option<f64>) {
        self.add_trip( trip);
        if let Some(idx) = self.trip_index.get( &trip.trip_id) {
            let entry = &mut self.trips[*idx];
            entry.shape = path.iter().enumerate().map( |(i,p)| (i as i64, *p)).collect();
            entry.record.start_time = start_time;
            entry.record.end_time = end_time;
        }
    }

    pub fn build (self)->ScheduleCatalog {
        let mut trips: Vec<TripRecord> = Vec::with_capacity( self.trips.len());
        let mut malformed: Vec<usize> = Vec::new();
        let mut n_shifted = 0;
        let mut n_past_midnight = 0;

        for (idx, mut entry) in self.trips.into_iter().enumerate() {
            entry.shape.sort_by_key( |(seq,_)| *seq);
            let mut rec = entry.record;
            rec.path = entry.shape.into_iter().map( |(_,p)| p).collect();
            rec.path_length = path_length( &rec.path);

            if shift_into_day( &mut rec) { n_shifted += 1 }
            if rec.end_time.is_some_and( |end| end >= DAY_SECS) {
                debug!("trip {} runs past midnight ({:?}), it ends at the day wrap", rec.id, rec.end_time);
                n_past_midnight += 1;
            }

            if !rec.is_well_formed() {
                warn!("malformed trip {} (route {}): {} path points, length {}", rec.id, rec.route_name, rec.path.len(), rec.path_length);
                malformed.push(idx);
            } else if self.mode != SimMode::Live && rec.schedule_window().is_none() {
                debug!("trip {} has no valid schedule window {:?}..{:?}", rec.id, rec.start_time, rec.end_time);
            }
            trips.push( rec);
        }

        if n_shifted > 0 || n_past_midnight > 0 {
            info!("{n_shifted} trips starting after 24:00:00 moved into the simulation day, {n_past_midnight} trips end after midnight");
        }
        info!("built schedule catalog: {} routes, {} trips ({} malformed, {} orphaned), {} interest points affecting {} routes",
              self.routes.len(), trips.len(), malformed.len(), self.n_orphans, self.interest_points.len(),
              self.affected_routes.values().map( |s| s.len()).sum::<usize>());

        ScheduleCatalog {
            routes: self.routes,
            trips,
            trip_index: self.trip_index,
            malformed,
            interest_points: self.interest_points,
            affected_routes: self.affected_routes,
        }
    }
}

/// GTFS service days can extend past 24h. Trips that start on the following day are moved to the early hours
/// of the simulation day, which is the only part of the schedule the wrapping clock can reach
fn shift_into_day (rec: &mut TripRecord)->bool {
    let Some(start) = rec.start_time else { return false };
    if start < DAY_SECS { return false }

    let offset = (start / DAY_SECS).floor() * DAY_SECS;
    rec.start_time = Some( start - offset);
    rec.end_time = rec.end_time.map( |end| end - offset);
    true
}
