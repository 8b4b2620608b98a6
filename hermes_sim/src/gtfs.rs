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

//! reader for static GTFS schedule bundles (directory or zip archive)
//! we only read the four files the simulation needs: routes.txt, trips.txt, stop_times.txt and shapes.txt

use std::{fs::File, io::{BufReader, Read}, path::{Path, PathBuf}};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::{clock::parse_hms, errors::{Result, HermesError, op_failed}};

pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const SHAPES_FILE: &str = "shapes.txt";

#[derive(Deserialize,Debug,Clone)]
pub struct GtfsRoute {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: String,
    #[serde(default)]
    pub route_type: i32,
}

#[derive(Deserialize,Debug,Clone)]
pub struct GtfsTrip {
    pub route_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub trip_headsign: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub shape_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u8")]
    pub direction_id: Option<u8>,
}

#[derive(Deserialize,Debug,Clone)]
pub struct GtfsStopTime {
    pub trip_id: String,
    pub stop_sequence: u32,
    #[serde(default, deserialize_with = "de_opt_gtfs_time")]
    pub arrival_time: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_gtfs_time")]
    pub departure_time: Option<u32>,
}

#[derive(Deserialize,Debug,Clone)]
pub struct GtfsShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: i64,
}

/// the parsed record streams of a static schedule, in the order they have to be consumed
#[derive(Debug,Default)]
pub struct GtfsFeed {
    pub routes: Vec<GtfsRoute>,
    pub trips: Vec<GtfsTrip>,
    pub stop_times: Vec<GtfsStopTime>,
    pub shapes: Vec<GtfsShapePoint>,
}

impl GtfsFeed {
    /// read from either a directory or a zip archive. Failure here is not recoverable for the caller
    pub fn read (path: impl AsRef<Path>, with_stop_times: bool)->Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::read_dir( path, with_stop_times)
        } else if path.is_file() {
            Self::read_zip( path, with_stop_times)
        } else {
            Err( op_failed!("no GTFS bundle at {path:?}"))
        }
    }

    pub fn read_dir (dir: &Path, with_stop_times: bool)->Result<Self> {
        let open = |name: &str| -> Result<BufReader<File>> { Ok( BufReader::new( File::open( dir.join(name))?)) };

        let routes = read_records( open(ROUTES_FILE)?)?;
        let trips = read_records( open(TRIPS_FILE)?)?;
        let stop_times = if with_stop_times { read_records( open(STOP_TIMES_FILE)?)? } else { Vec::new() };
        let shapes = read_records( open(SHAPES_FILE)?)?;

        Ok( GtfsFeed{ routes, trips, stop_times, shapes } )
    }

    pub fn read_zip (path: &Path, with_stop_times: bool)->Result<Self> {
        let mut archive = zip::ZipArchive::new( BufReader::new( File::open(path)?))?;

        let routes = read_records( archive.by_name(ROUTES_FILE)?)?;
        let trips = read_records( archive.by_name(TRIPS_FILE)?)?;
        let stop_times = if with_stop_times { read_records( archive.by_name(STOP_TIMES_FILE)?)? } else { Vec::new() };
        let shapes = read_records( archive.by_name(SHAPES_FILE)?)?;

        Ok( GtfsFeed{ routes, trips, stop_times, shapes } )
    }
}

pub fn read_records<R,T> (reader: R)->Result<Vec<T>> where R: Read, T: for<'a> Deserialize<'a> {
    let mut csv = csv::ReaderBuilder::new().trim( csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for rec in csv.deserialize() {
        records.push( rec?);
    }
    debug!("read {} {} records", records.len(), std::any::type_name::<T>());
    Ok(records)
}

fn de_opt_string<'a,D> (deserializer: D)->std::result::Result<Option<String>,D::Error> where D: Deserializer<'a> {
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok( s.filter( |s| !s.is_empty()) )
}

fn de_opt_u8<'a,D> (deserializer: D)->std::result::Result<Option<u8>,D::Error> where D: Deserializer<'a> {
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref() {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<u8>().map(Some).map_err( serde::de::Error::custom)
    }
}

fn de_opt_gtfs_time<'a,D> (deserializer: D)->std::result::Result<Option<u32>,D::Error> where D: Deserializer<'a> {
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref() {
        None | Some("") => Ok(None),
        Some(v) => parse_hms(v).map(Some).map_err( serde::de::Error::custom)
    }
}
