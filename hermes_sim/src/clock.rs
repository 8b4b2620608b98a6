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

use std::fmt;
use chrono::{Local, NaiveTime, Timelike};

use crate::errors::{Result, parse_error};

/// length of a simulation day in seconds
pub const DAY_SECS: f64 = 86400.0;

pub const DEFAULT_SPEED: f64 = 10.0;

/// the virtual time of a simulation, in seconds since the start of the simulated day
/// The time value is always within [0,DAY_SECS). Advancing past the end of the day wraps and increments `day`
#[derive(Debug,Clone)]
pub struct SimulationClock {
    time: f64,
    speed: f64, // multiplier applied to wall clock deltas
    day: u64,   // number of completed simulation days
}

impl SimulationClock {
    pub fn new (start_time: f64, speed: f64)->Self {
        SimulationClock { time: start_time.rem_euclid(DAY_SECS), speed, day: 0 }
    }

    /// clock that starts at the current local wall clock time of day
    pub fn from_local_time (speed: f64)->Self {
        let now = Local::now().time();
        SimulationClock::new( seconds_of_day( &now), speed)
    }

    #[inline] pub fn time (&self)->f64 { self.time }
    #[inline] pub fn speed (&self)->f64 { self.speed }
    #[inline] pub fn day (&self)->u64 { self.day }

    /// advance by a wall clock delta (in seconds), which is scaled by our speed multiplier
    pub fn advance (&mut self, delta: f64) {
        let t = self.time + delta * self.speed;
        if t >= DAY_SECS {
            self.day += (t / DAY_SECS).floor() as u64;
        }
        self.time = t.rem_euclid(DAY_SECS);
    }

    pub fn set_time (&mut self, time: f64) {
        self.time = time.rem_euclid(DAY_SECS);
    }

    // note there are no bounds for the speed multiplier

    pub fn increase_speed (&mut self) { self.speed *= 2.0; }

    pub fn decrease_speed (&mut self) { self.speed /= 2.0; }
}

impl Default for SimulationClock {
    fn default()->Self { SimulationClock::new( 0.0, DEFAULT_SPEED) }
}

impl fmt::Display for SimulationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.time as u64;
        write!( f, "day {} {:02}:{:02}:{:02} (x{})", self.day, secs / 3600, (secs % 3600) / 60, secs % 60, self.speed)
    }
}

pub fn seconds_of_day (t: &NaiveTime)->f64 {
    t.num_seconds_from_midnight() as f64 + (t.nanosecond() as f64 / 1e9)
}

/// parse a "H:MM:SS" time string into seconds. Hours are not limited to 23 (GTFS service days can exceed 24h)
pub fn parse_hms (s: &str)->Result<u32> {
    let mut it = s.trim().split(':');
    match (it.next(), it.next(), it.next(), it.next()) {
        (Some(h), Some(m), Some(sec), None) => {
            let h: u32 = h.trim().parse().map_err(|_| parse_error!("invalid hours in time '{s}'"))?;
            let m: u32 = m.parse().map_err(|_| parse_error!("invalid minutes in time '{s}'"))?;
            let sec: u32 = sec.parse().map_err(|_| parse_error!("invalid seconds in time '{s}'"))?;
            if m > 59 || sec > 59 { return Err( parse_error!("time out of range '{s}'")) }
            Ok( h * 3600 + m * 60 + sec )
        }
        _ => Err( parse_error!("not a H:MM:SS time '{s}'"))
    }
}
