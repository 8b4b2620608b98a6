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

use hermes_sim::clock::{SimulationClock, DAY_SECS, parse_hms};

#[test]
fn test_wrap_around() {
    let mut clock = SimulationClock::new( 86399.5, 1.0);
    clock.advance( 1.0);
    println!("clock after wrap: {clock}");
    assert!( (clock.time() - 0.5).abs() < 1e-9);
    assert_eq!( clock.day(), 1);

    let mut clock = SimulationClock::new( 100.0, 10.0);
    clock.advance( 3.0 * DAY_SECS / 10.0); // three full days at 10x
    assert!( (clock.time() - 100.0).abs() < 1e-6);
    assert_eq!( clock.day(), 3);
}

#[test]
fn test_advance_decomposition() {
    for (a,b) in [(0.1, 0.2), (1.5, 3.25), (1000.0, 7640.0), (8000.0, 1.0)] {
        let mut c1 = SimulationClock::new( 3600.0, 10.0);
        c1.advance( a);
        c1.advance( b);

        let mut c2 = SimulationClock::new( 3600.0, 10.0);
        c2.advance( a + b);

        println!("advance {a} + {b}: {} vs {}", c1.time(), c2.time());
        assert!( (c1.time() - c2.time()).abs() < 1e-6);
        assert_eq!( c1.day(), c2.day());
        assert!( c1.time() >= 0.0 && c1.time() < DAY_SECS);
    }
}

#[test]
fn test_speed_control() {
    let mut clock = SimulationClock::default();
    assert_eq!( clock.speed(), 10.0);

    clock.increase_speed();
    assert_eq!( clock.speed(), 20.0);

    clock.decrease_speed();
    clock.decrease_speed();
    assert_eq!( clock.speed(), 5.0);

    clock.advance( 2.0);
    assert_eq!( clock.time(), 10.0);
}

#[test]
fn test_parse_hms() {
    assert_eq!( parse_hms("0:00:00").unwrap(), 0);
    assert_eq!( parse_hms("08:15:30").unwrap(), 8*3600 + 15*60 + 30);
    assert_eq!( parse_hms(" 25:10:00").unwrap(), 25*3600 + 600); // service day past midnight

    for bad in ["", "12:00", "12:61:00", "ab:00:00", "1:2:3:4"] {
        let res = parse_hms( bad);
        println!("'{bad}' -> {res:?}");
        assert!( res.is_err());
    }
}

#[test]
fn test_display() {
    let clock = SimulationClock::new( 3723.0, 2.0);
    let s = clock.to_string();
    println!("{s}");
    assert_eq!( s, "day 0 01:02:03 (x2)");
}
