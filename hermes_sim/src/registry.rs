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

use std::{collections::BTreeMap, fmt, sync::Arc};
use dashmap::{DashMap, mapref::entry::Entry};
use lazy_static::lazy_static;
use serde::{Serialize, Deserialize};

use crate::{Direction, VehicleCategory, catalog::{RouteRecord, TripRecord}, geo::{PlanarPoint, heading_degrees}};

/// geodetic location we park hidden vehicles at
pub const OFF_MAP_LAT_LON: (f64,f64) = (-27.499593094511493, 153.01620933407332);

lazy_static! {
    pub static ref OFF_MAP: PlanarPoint = PlanarPoint::from_lat_lon_degrees( OFF_MAP_LAT_LON.0, OFF_MAP_LAT_LON.1);
}

/// a computed vehicle location
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct VehiclePosition {
    pub pos: PlanarPoint,
    pub heading: f64, // degrees [0,360)
}

/// the observable state of a single vehicle
#[derive(Debug,Clone,Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub trip_id: Arc<String>,
    pub route_name: Arc<String>,
    pub category: VehicleCategory,
    pub direction: Direction,

    pub position: PlanarPoint,
    pub old_position: PlanarPoint,
    pub heading: f64,
    pub hidden: bool,
}

impl VehicleSnapshot {
    pub fn new (trip: &TripRecord, vp: VehiclePosition)->Self {
        VehicleSnapshot {
            trip_id: trip.id.clone(),
            route_name: trip.route_name.clone(),
            category: trip.category,
            direction: trip.direction,
            position: vp.pos,
            old_position: vp.pos,
            heading: vp.heading,
            hidden: false,
        }
    }

    /// a vehicle that is only known by its trip id and route (live feed observations)
    pub fn for_route (trip_id: Arc<String>, route: &RouteRecord, vp: VehiclePosition)->Self {
        VehicleSnapshot {
            trip_id,
            route_name: Arc::new( route.name.clone()),
            category: route.category,
            direction: Direction::default(),
            position: vp.pos,
            old_position: vp.pos,
            heading: vp.heading,
            hidden: false,
        }
    }

    /// move to a new observed position (this always makes the vehicle visible).
    /// A vehicle that was hidden restarts from `new_pos`, its off-map parking spot is not a previous position
    pub fn tick (&mut self, new_pos: PlanarPoint) {
        self.old_position = if self.hidden { new_pos } else { self.position };
        self.position = new_pos;
        self.hidden = false;
    }

    /// move and derive the heading from the old/new positions, unless `bearing` is known
    pub fn tick_with_bearing (&mut self, new_pos: PlanarPoint, bearing: Option<f64>) {
        self.tick( new_pos);
        if let Some(b) = bearing {
            self.heading = b;
        } else if self.old_position != self.position {
            self.heading = heading_degrees( &self.old_position, &self.position);
        }
    }

    pub fn set (&mut self, vp: VehiclePosition) {
        self.old_position = if self.hidden { vp.pos } else { self.position };
        self.position = vp.pos;
        self.heading = vp.heading;
        self.hidden = false;
    }

    pub fn hide (&mut self) {
        self.hidden = true;
        self.old_position = self.position;
        self.position = *OFF_MAP;
    }

    pub fn is_visible (&self)->bool { !self.hidden }
}

impl fmt::Display for VehicleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "Vehicle( trip: {}, route: {} ({}), pos: {}, hdg: {:.0}", self.trip_id, self.route_name, self.category, self.position, self.heading)?;
        if self.hidden { write!( f, ", hidden")?; }
        write!( f, ")")
    }
}

/// the concurrent trip_id -> VehicleSnapshot map
///
/// Concurrency contract: there is exactly one writer (the tick driver, which also applies live feed updates).
/// Any number of readers can hold clones of the registry and iterate concurrently. Readers only obtain
/// owned copies (`get`, `snapshot`) or run short closures while a shard lock is held (`with_vehicle`,
/// `for_each`). Such closures must not call back into the registry.
/// Entries are never deleted while the simulation runs, vehicles that become inactive are hidden instead.
/// This keeps keys stable and makes reconciliation idempotent
#[derive(Debug,Clone,Default)]
pub struct VehicleRegistry {
    vehicles: Arc<DashMap<String,VehicleSnapshot>>,
}

impl VehicleRegistry {
    pub fn new ()->Self {
        VehicleRegistry { vehicles: Arc::new( DashMap::new()) }
    }

    pub fn len (&self)->usize { self.vehicles.len() }
    pub fn is_empty (&self)->bool { self.vehicles.is_empty() }
    pub fn contains (&self, trip_id: &str)->bool { self.vehicles.contains_key( trip_id) }

    pub fn get (&self, trip_id: &str)->Option<VehicleSnapshot> {
        self.vehicles.get( trip_id).map( |e| e.value().clone())
    }

    pub fn with_vehicle<F,R> (&self, trip_id: &str, f: F)->Option<R> where F: FnOnce(&VehicleSnapshot)->R {
        self.vehicles.get( trip_id).map( |e| f( e.value()))
    }

    /// create the vehicle if we don't have one yet, otherwise update its position. Returns true if it was created
    pub fn upsert (&self, trip: &TripRecord, vp: VehiclePosition)->bool {
        match self.vehicles.entry( trip.id.to_string()) {
            Entry::Occupied(mut e) => {
                e.get_mut().set( vp);
                false
            }
            Entry::Vacant(e) => {
                e.insert( VehicleSnapshot::new( trip, vp));
                true
            }
        }
    }

    /// update an existing vehicle in place. Returns false if there is none
    pub fn update<F> (&self, trip_id: &str, f: F)->bool where F: FnOnce(&mut VehicleSnapshot) {
        if let Some(mut e) = self.vehicles.get_mut( trip_id) {
            f( e.value_mut());
            true
        } else {
            false
        }
    }

    pub fn insert (&self, vehicle: VehicleSnapshot) {
        self.vehicles.insert( vehicle.trip_id.to_string(), vehicle);
    }

    /// hide (but keep) the vehicle of a trip. This is a no-op if we never created one
    pub fn hide (&self, trip_id: &str)->bool {
        self.update( trip_id, |v| if !v.hidden { v.hide() })
    }

    /// hide every vehicle that does not satisfy the predicate, returning the number of newly hidden ones
    pub fn hide_unless<F> (&self, mut keep: F)->usize where F: FnMut(&str)->bool {
        let mut n = 0;
        for mut e in self.vehicles.iter_mut() {
            if !e.value().hidden && !keep( e.key().as_str()) {
                e.value_mut().hide();
                n += 1;
            }
        }
        n
    }

    pub fn keys (&self)->Vec<String> {
        self.vehicles.iter().map( |e| e.key().clone()).collect()
    }

    /// owned copy of all vehicles. Readers should prefer this over holding shard locks
    pub fn snapshot (&self)->Vec<VehicleSnapshot> {
        self.vehicles.iter().map( |e| e.value().clone()).collect()
    }

    pub fn for_each<F> (&self, mut f: F) where F: FnMut(&VehicleSnapshot) {
        for e in self.vehicles.iter() { f( e.value()) }
    }

    pub fn n_visible (&self)->usize {
        self.vehicles.iter().filter( |e| !e.value().hidden).count()
    }

    /// number of visible vehicles per route display name
    pub fn route_frequency (&self)->BTreeMap<String,usize> {
        let mut freq = BTreeMap::new();
        for e in self.vehicles.iter() {
            let v = e.value();
            if !v.hidden {
                *freq.entry( v.route_name.to_string()).or_insert(0) += 1;
            }
        }
        freq
    }
}
