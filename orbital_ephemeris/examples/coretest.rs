/*  orbital_ephemeris | Pure Rust geocentric ephemeris.
 *  Copyright (c) 2021 incredimo. All rights reserved.

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as
    published by the Free Software Foundation, either version 3 of the
    License, or (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use orbital_ephemeris::{julday, Body, Calendar, Ephemeris};

fn main() {
    let eph = Ephemeris::default();
    let julian_day_ut = julday(1991, 10, 13, 20.0, Calendar::Gregorian);
    println!("Planet\tlon\tlat\tdist");
    for body in Body::ALL {
        match eph.calc_ut(julian_day_ut, body) {
            Ok(position) => println!(
                "{}\t{:.4}\t{:.4}\t{:.6}",
                body.name(),
                position.longitude,
                position.latitude,
                position.distance
            ),
            Err(err) => eprintln!("{}: {}", body.name(), err),
        }
    }
}
