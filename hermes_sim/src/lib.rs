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
#![allow(unused)]

use std::{fs, path::{Path, PathBuf}, time::Duration};
use serde::{Serialize, Deserialize};
use strum::{Display, EnumString};
use uom::si::{f64::Length, length::meter};

pub mod errors;
use errors::{Result, config_error};

pub mod geo;
use geo::{PlanarPoint, length_to_map_units};

pub mod clock;
pub mod gtfs;
pub mod gtfs_rt;
pub mod catalog;
pub mod registry;
pub mod trip;
pub mod live;
pub mod snapshot;
pub mod sim;

pub use clock::SimulationClock;
pub use catalog::{ScheduleCatalog, RouteRecord, TripRecord};
pub use registry::{VehicleRegistry, VehicleSnapshot, VehiclePosition};
pub use trip::TripProgressEngine;
pub use live::{LiveFeedReconciler, LiveFeedConnector, LiveFeedCache, FeedSource, FeedData, HttpFeedSource, ReconcileStats};
pub use snapshot::{SnapshotAggregator, SnapshotMessage, SnapshotPublisher, LogPublisher, PublishReport, ArrivalComparison};
pub use sim::{SimulationContext, HermesSim, TickReport, load_catalog};

#[inline] pub fn secs (n: u64)->Duration { Duration::from_secs(n) }
#[inline] pub fn millis (n: u64)->Duration { Duration::from_millis(n) }

/// the operating mode, which is fixed for the lifetime of a simulation
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize,Display,EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum SimMode {
    /// replay of scheduled trips, positions interpolated over the [start,end] window
    History,
    /// live vehicle positions from a GTFS-realtime feed
    Live,
    /// scheduled trips that move with a fixed vehicle speed once they started
    Simulated,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize,Display,EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum VehicleCategory {
    Bus,
    Train,
    Ferry,
}

impl VehicleCategory {
    /// map the GTFS route_type code. Anything we don't know is a bus
    pub fn from_route_type (route_type: i32)->Self {
        match route_type {
            2 => VehicleCategory::Train,
            4 => VehicleCategory::Ferry,
            _ => VehicleCategory::Bus,
        }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize,Default)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
}

impl Direction {
    pub fn from_direction_id (direction_id: Option<u8>)->Self {
        match direction_id {
            Some(1) => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }
}

/// a named location of interest. Routes that pass within `radius` are flagged as affected
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct InterestPoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub radius: Length, // serialized as meters
}

impl InterestPoint {
    pub fn new (name: impl ToString, lat: f64, lon: f64, radius_meters: f64)->Self {
        InterestPoint { name: name.to_string(), lat, lon, radius: Length::new::<meter>(radius_meters) }
    }

    pub fn planar_center (&self)->PlanarPoint { PlanarPoint::from_lat_lon_degrees( self.lat, self.lon) }

    pub fn planar_radius (&self)->f64 { length_to_map_units( self.radius, self.lat) }
}

/* #region config *****************************************************************************************/

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct HermesConfig {
    pub mode: SimMode,
    pub gtfs_path: PathBuf, // directory or zip archive

    #[serde(default)]
    pub start_time: Option<String>, // "H:MM:SS", defaults to local time of day

    #[serde(default="default_speed")]
    pub speed: f64,

    #[serde(default="default_vehicle_speed")]
    pub vehicle_speed: f64, // map units per simulated second (SIMULATED mode)

    #[serde(default="default_snapshot_interval")]
    pub snapshot_interval: usize, // in ticks

    #[serde(default="default_tick_interval")]
    pub tick_interval: Duration,

    #[serde(default)]
    pub interest_points: Vec<InterestPoint>,

    #[serde(default)]
    pub live_feed: Option<LiveFeedConfig>,
}

fn default_speed()->f64 { clock::DEFAULT_SPEED }
fn default_vehicle_speed()->f64 { 5.0 }
fn default_snapshot_interval()->usize { 10 }
fn default_tick_interval()->Duration { millis(100) }

impl HermesConfig {
    pub fn check (&self)->Result<()> {
        if self.snapshot_interval == 0 { return Err( config_error!("snapshot_interval has to be > 0")) }
        if !(self.speed > 0.0) { return Err( config_error!("speed has to be positive: {}", self.speed)) }
        if self.tick_interval.is_zero() { return Err( config_error!("tick_interval has to be > 0")) }
        if self.mode == SimMode::Live && self.live_feed.is_none() {
            return Err( config_error!("LIVE mode requires a live_feed config"))
        }
        Ok(())
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct LiveFeedConfig {
    pub vehicle_positions_url: String,

    #[serde(default)]
    pub trip_updates_url: Option<String>,

    #[serde(default="default_poll_interval")]
    pub poll_interval: Duration,

    #[serde(default="default_request_timeout")]
    pub request_timeout: Duration,

    #[serde(default="default_max_retries")]
    pub max_retries: usize,

    #[serde(default="default_retry_delay")]
    pub retry_delay: Duration,
}

fn default_poll_interval()->Duration { secs(10) }
fn default_request_timeout()->Duration { secs(15) }
fn default_max_retries()->usize { 3 }
fn default_retry_delay()->Duration { secs(2) }

/// load a RON config file
pub fn load_config<C> (path: impl AsRef<Path>)->Result<C> where C: for<'a> Deserialize<'a> {
    let data = fs::read( path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/* #endregion config */
