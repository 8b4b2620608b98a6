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

//! per-trip progress computation for the scheduled (HISTORY) and speed based (SIMULATED) movement models

use tracing::{debug, trace};

use crate::{
    SimMode,
    catalog::{ScheduleCatalog, TripRecord},
    clock::SimulationClock,
    geo::{PlanarPoint, heading_degrees},
    registry::{VehiclePosition, VehicleRegistry},
    snapshot::ArrivalComparison,
};

/// the mutable per-day state of a trip
#[derive(Debug,Clone,Default)]
pub struct TripState {
    pub ended: bool,
    pub was_active: bool,        // located on its path at least once this day
    pub prev_dist: f64,          // SIMULATED mode: distance travelled so far
    pub prev_time: Option<f64>,  // SIMULATED mode: sim time of last update, None means start_time
    pub shape_index: Option<usize>,
}

impl TripState {
    fn reset (&mut self) { *self = TripState::default(); }
}

/// the outcome of ticking a single trip
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum TripProgress {
    /// on its path, with the segment end index the position lies on
    Active { vp: VehiclePosition, shape_index: usize },
    /// outside of its active window, parked off-map
    Inactive,
    /// inside its window but the travelled distance could not be located on the path. Hidden in place
    Stalled,
}

impl TripProgress {
    pub fn is_active (&self)->bool { matches!( self, TripProgress::Active{..}) }
}

#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct TickStats {
    pub active: usize,
    pub inactive: usize,
    pub stalled: usize,
    pub ended: usize,
}

/// find the point at arc length `traversed` along `path`
/// Walks the segments until the accumulated length plus the next segment length reaches `traversed`, then
/// interpolates within that segment. Returns None if the path is too short
pub fn locate_on_path (path: &[PlanarPoint], traversed: f64)->Option<(VehiclePosition,usize)> {
    if !traversed.is_finite() || traversed < 0.0 { return None }

    let mut acc = 0.0;
    for i in 1..path.len() {
        let p0 = &path[i-1];
        let p1 = &path[i];
        let seg = p0.distance_to( p1);

        if acc + seg >= traversed {
            let f = if seg > 0.0 { (traversed - acc) / seg } else { 0.0 };
            let pos = p0.lerp( p1, f);
            let heading = heading_degrees( p0, p1);
            return Some( (VehiclePosition{pos, heading}, i) )
        }
        acc += seg;
    }
    None
}

pub struct TripProgressEngine {
    mode: SimMode,
    vehicle_speed: f64,
    states: Vec<TripState>, // indexed like catalog trips
    day: u64,
}

impl TripProgressEngine {
    pub fn new (mode: SimMode, vehicle_speed: f64, catalog: &ScheduleCatalog)->Self {
        let states = vec![ TripState::default(); catalog.trips().len() ];
        TripProgressEngine { mode, vehicle_speed, states, day: 0 }
    }

    pub fn mode (&self)->SimMode { self.mode }
    pub fn vehicle_speed (&self)->f64 { self.vehicle_speed }

    pub fn state (&self, trip_idx: usize)->Option<&TripState> { self.states.get( trip_idx) }

    /// start a new simulation day. This re-arms all trips
    pub fn reset (&mut self, day: u64) {
        debug!("resetting trip states for day {day}");
        self.states.iter_mut().for_each( |s| s.reset());
        self.day = day;
    }

    /// update all well formed trips of the catalog for the current clock time and reconcile the registry.
    /// LIVE mode vehicles are not moved by this engine
    pub fn tick (&mut self, clock: &SimulationClock, catalog: &ScheduleCatalog, registry: &VehicleRegistry,
                 arrivals: &mut Vec<ArrivalComparison>)->TickStats {
        let mut stats = TickStats::default();
        if self.mode == SimMode::Live { return stats }

        if clock.day() != self.day {
            self.reset( clock.day());
        }

        let t = clock.time();
        for idx in catalog.well_formed_trips() {
            let trip = catalog.trip_at( idx);
            let (progress, arrival) = self.tick_trip( idx, trip, t);

            match progress {
                TripProgress::Active{vp,..} => {
                    if registry.upsert( trip, vp) { trace!("created vehicle for trip {}", trip.id) }
                    stats.active += 1;
                }
                TripProgress::Inactive => {
                    registry.hide( trip.id.as_str());
                    stats.inactive += 1;
                }
                TripProgress::Stalled => {
                    registry.update( trip.id.as_str(), |v| v.hidden = true);
                    stats.stalled += 1;
                }
            }

            if let Some(arrival) = arrival {
                debug!("trip {} arrived with a delay of {:.0}s", trip.id, arrival.delay());
                arrivals.push( arrival);
                stats.ended += 1;
            }
        }
        stats
    }

    /// compute the progress of a single trip at sim time `t`. This only updates the trip state, it does
    /// not touch the registry
    pub fn tick_trip (&mut self, trip_idx: usize, trip: &TripRecord, t: f64)->(TripProgress, Option<ArrivalComparison>) {
        if !trip.is_well_formed() { return (TripProgress::Inactive, None) }
        let Some(state) = self.states.get_mut( trip_idx) else { return (TripProgress::Inactive, None) };

        match self.mode {
            SimMode::History => history_progress( state, trip, t),
            SimMode::Simulated => simulated_progress( state, trip, t, self.vehicle_speed),
            SimMode::Live => (TripProgress::Inactive, None),
        }
    }
}

/// mark the trip as ended. Only trips that were on their path before report an arrival
fn arrival_of (state: &mut TripState, trip: &TripRecord, t: f64)->Option<ArrivalComparison> {
    if state.ended { return None }
    state.ended = true;
    if !state.was_active { return None }
    trip.end_time.map( |end| ArrivalComparison::new( trip.route_name.as_str(), t, end))
}

fn located (state: &mut TripState, trip: &TripRecord, traversed: f64)->TripProgress {
    match locate_on_path( &trip.path, traversed) {
        Some((vp,shape_index)) => {
            state.shape_index = Some(shape_index);
            state.was_active = true;
            TripProgress::Active{ vp, shape_index }
        }
        None => {
            state.shape_index = None;
            TripProgress::Stalled
        }
    }
}

/// position is proportional to the elapsed part of the [start,end] window
fn history_progress (state: &mut TripState, trip: &TripRecord, t: f64)->(TripProgress, Option<ArrivalComparison>) {
    let Some((start,end)) = trip.schedule_window() else { return (TripProgress::Inactive, None) };

    if t < start || t > end {
        state.shape_index = None;
        let arrival = if t >= start { arrival_of( state, trip, t) } else { None };
        return (TripProgress::Inactive, arrival)
    }

    let f = if end > start { (t - start) / (end - start) } else { 1.0 };
    (located( state, trip, f * trip.path_length), None)
}

/// position advances with a fixed speed from the scheduled start, regardless of the end time
fn simulated_progress (state: &mut TripState, trip: &TripRecord, t: f64, speed: f64)->(TripProgress, Option<ArrivalComparison>) {
    let Some(start) = trip.start_time else { return (TripProgress::Inactive, None) };
    if t < start {
        return (TripProgress::Inactive, None)
    }
    if state.ended {
        return (TripProgress::Inactive, None)
    }

    let prev_time = state.prev_time.unwrap_or( start);
    let dt = (t - prev_time).max(0.0);
    let traversed = state.prev_dist + dt * speed;
    state.prev_dist = traversed;
    state.prev_time = Some(t);

    match located( state, trip, traversed) {
        TripProgress::Stalled => { // ran out of path
            let arrival = arrival_of( state, trip, t);
            (TripProgress::Inactive, arrival)
        }
        progress => (progress, None)
    }
}
