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

//! planar map geometry used by the simulation
//! all trip geometry is kept in a spherical Mercator projection that is scaled to the map plane of the
//! renderer. Distances and speeds (e.g. the SIMULATED vehicle speed) are therefore in map units, not meters

use std::{fmt, f64::consts::PI};
use serde::{Serialize,Deserialize};
use uom::si::{f64::Length, length::meter};

/// number of map units that cover 360 degrees of longitude
pub const MAP_WIDTH: f64 = 20.0 * 128.0;

/// height of the map plane in map units (y is centered on the equator)
pub const MAP_HEIGHT: f64 = 36.0 * 128.0;

/// mean earth radius in meters (spherical Mercator)
pub const EARTH_RADIUS: f64 = 6_378_137.0;

#[inline]
pub fn normalize_360 (d: f64) -> f64 {
    let x = d % 360.0;
    if x < 0.0 { 360.0 + x } else { x }
}

/// a point in the projected map plane
#[derive(Debug,Clone,Copy,PartialEq,Default,Serialize,Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64
}

impl PlanarPoint {
    pub const fn new (x: f64, y: f64)->Self { PlanarPoint{x,y} }

    /// project geodetic degrees into the map plane
    pub fn from_lat_lon_degrees (lat: f64, lon: f64)->Self {
        let x = (lon + 180.0) * MAP_WIDTH / 360.0;

        let lat_rad = lat.to_radians();
        let merc_n = ((PI/4.0) + (lat_rad/2.0)).tan().ln();
        let y = (MAP_HEIGHT/2.0) - (MAP_WIDTH * merc_n / (2.0*PI));

        PlanarPoint{x,y}
    }

    #[inline]
    pub fn distance_to (&self, other: &PlanarPoint)->f64 {
        (other.x - self.x).hypot( other.y - self.y)
    }

    /// the point at fraction `f` of the way from self to `other` (not clamped)
    #[inline]
    pub fn lerp (&self, other: &PlanarPoint, f: f64)->PlanarPoint {
        PlanarPoint { x: self.x + (other.x - self.x) * f, y: self.y + (other.y - self.y) * f }
    }

    pub fn is_finite (&self)->bool { self.x.is_finite() && self.y.is_finite() }
}

impl fmt::Display for PlanarPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3},{:.3})", self.x, self.y)
    }
}

/// heading of a vehicle moving from `from` to `to`, in degrees [0,360)
/// this is the angle of the negated direction vector, which is what the map plane (y growing southwards) expects
pub fn heading_degrees (from: &PlanarPoint, to: &PlanarPoint)->f64 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    normalize_360( (-dy).atan2(-dx).to_degrees())
}

/// convert a length at the given latitude into map units (Mercator scale factor)
pub fn length_to_map_units (len: Length, lat: f64)->f64 {
    let units_per_meter = MAP_WIDTH / (2.0 * PI * EARTH_RADIUS);
    len.get::<meter>() * units_per_meter / lat.to_radians().cos()
}

/// sum of consecutive segment lengths
pub fn path_length (path: &[PlanarPoint])->f64 {
    path.windows(2).map( |w| w[0].distance_to( &w[1])).sum()
}

/// convert a compass bearing (clockwise from north) into our map plane heading
pub fn heading_from_bearing (bearing: f64)->f64 {
    normalize_360( bearing + 90.0)
}
