//! Geocentric ecliptic positions for the Sun, Moon and the eight planets.
//!
//! ```
//! use orbital_ephemeris::{julday, Body, Calendar, Ephemeris};
//!
//! let eph = Ephemeris::default();
//! let jd = julday(2023, 5, 17, 12.0, Calendar::Gregorian);
//! let sun = eph.calc_ut(jd, Body::Sun).unwrap();
//! assert!((sun.longitude - 56.3).abs() < 0.5);
//! ```

pub mod core;

pub use crate::core::{
    centuries_since_j2000, julday, normalize_degrees, Body, Calendar, CalculationError,
    EclipticPosition, Ephemeris, EphemerisConfig, JulianDay, J2000,
};
