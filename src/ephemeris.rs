// src/ephemeris.rs
//
// Position resolution: every body is looked up twice, at the analysis
// instant and at the birth instant. A failed lookup only affects its body.

use chrono::{Datelike, NaiveDate};
use orbital_ephemeris::{julday, CalculationError, Calendar, Ephemeris, JulianDay};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{CelestialBody, PlanetObservation};

pub const ANALYSIS_HOUR_UT: f64 = 11.0;
pub const BIRTH_HOUR_UT: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("{body} could not be computed at julian day {julian_day}: {source}")]
    Calculation {
        body: CelestialBody,
        julian_day: JulianDay,
        #[source]
        source: CalculationError,
    },
    #[error("{body} is unavailable: {message}")]
    Unavailable { body: CelestialBody, message: String },
}

impl OracleError {
    pub fn body(&self) -> CelestialBody {
        match self {
            OracleError::Calculation { body, .. } | OracleError::Unavailable { body, .. } => *body,
        }
    }
}

pub trait EphemerisOracle {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, OracleError>;
}

impl EphemerisOracle for Ephemeris {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, OracleError> {
        self.calc_ut(julian_day, body.into())
            .map(|position| position.longitude)
            .map_err(|source| OracleError::Calculation {
                body,
                julian_day,
                source,
            })
    }
}

impl<O: EphemerisOracle + ?Sized> EphemerisOracle for &O {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, OracleError> {
        (**self).longitude(julian_day, body)
    }
}

pub fn date_to_julian_day(date: NaiveDate, hour: f64) -> JulianDay {
    julday(date.year(), date.month(), date.day(), hour, Calendar::Gregorian)
}

pub fn analysis_julian_day(date: NaiveDate) -> JulianDay {
    date_to_julian_day(date, ANALYSIS_HOUR_UT)
}

pub fn birth_julian_day(date: NaiveDate) -> JulianDay {
    date_to_julian_day(date, BIRTH_HOUR_UT)
}

// ---------------------------
// ## Position Table
// ---------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PositionTable {
    entries: Vec<(CelestialBody, Result<PlanetObservation, OracleError>)>,
}

impl PositionTable {
    // Rebuilds a table from stored observations. Bodies missing from
    // `observations` are recorded as unavailable.
    pub fn from_observations(observations: &[PlanetObservation]) -> Self {
        let entries = CelestialBody::iter()
            .map(|body| {
                let entry = observations
                    .iter()
                    .find(|obs| obs.body == body)
                    .copied()
                    .ok_or_else(|| OracleError::Unavailable {
                        body,
                        message: "no stored observation".to_string(),
                    });
                (body, entry)
            })
            .collect();
        PositionTable { entries }
    }

    pub fn entries(
        &self,
    ) -> impl Iterator<Item = (CelestialBody, &Result<PlanetObservation, OracleError>)> {
        self.entries.iter().map(|(body, entry)| (*body, entry))
    }

    pub fn observation(&self, body: CelestialBody) -> Option<&PlanetObservation> {
        self.entries
            .iter()
            .find(|(b, _)| *b == body)
            .and_then(|(_, entry)| entry.as_ref().ok())
    }

    pub fn observations(&self) -> Vec<PlanetObservation> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| entry.as_ref().ok().copied())
            .collect()
    }

    pub fn failures(&self) -> Vec<&OracleError> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| entry.as_ref().err())
            .collect()
    }

    pub fn analysis_longitudes(&self) -> Vec<(CelestialBody, f64)> {
        self.observations()
            .into_iter()
            .map(|obs| (obs.body, obs.analysis_longitude))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|(_, entry)| entry.is_ok())
    }
}

// ---------------------------
// ## Position Resolver
// ---------------------------

pub struct PositionResolver<O> {
    oracle: O,
}

impl<O: EphemerisOracle> PositionResolver<O> {
    pub fn new(oracle: O) -> Self {
        PositionResolver { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn resolve(&self, analysis_date: NaiveDate, birth_date: NaiveDate) -> PositionTable {
        let analysis_jd = analysis_julian_day(analysis_date);
        let birth_jd = birth_julian_day(birth_date);
        debug!(analysis_jd, birth_jd, "resolving positions");

        let entries = CelestialBody::iter()
            .map(|body| {
                let entry = self.observe(body, analysis_jd, birth_jd);
                if let Err(err) = &entry {
                    warn!(%body, error = %err, "position unavailable, seed falls back to random");
                }
                (body, entry)
            })
            .collect();
        PositionTable { entries }
    }

    fn observe(
        &self,
        body: CelestialBody,
        analysis_jd: JulianDay,
        birth_jd: JulianDay,
    ) -> Result<PlanetObservation, OracleError> {
        let analysis_longitude = self.oracle.longitude(analysis_jd, body)?;
        let birth_longitude = self.oracle.longitude(birth_jd, body)?;
        Ok(PlanetObservation::new(body, analysis_longitude, birth_longitude))
    }
}

// ---------------------------
// ## Observation Snapshot
// ---------------------------

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSnapshot {
    pub birth_date: NaiveDate,
    pub analysis_date: NaiveDate,
    pub observations: Vec<PlanetObservation>,
}

impl ObservationSnapshot {
    pub fn capture(table: &PositionTable, birth_date: NaiveDate, analysis_date: NaiveDate) -> Self {
        ObservationSnapshot {
            birth_date,
            analysis_date,
            observations: table.observations(),
        }
    }

    pub fn table(&self) -> PositionTable {
        PositionTable::from_observations(&self.observations)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        ObservationSnapshot::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct FailingBody<O> {
        inner: O,
        failing: CelestialBody,
    }

    impl<O: EphemerisOracle> EphemerisOracle for FailingBody<O> {
        fn longitude(
            &self,
            julian_day: JulianDay,
            body: CelestialBody,
        ) -> Result<f64, OracleError> {
            if body == self.failing {
                return Err(OracleError::Unavailable {
                    body,
                    message: "simulated outage".to_string(),
                });
            }
            self.inner.longitude(julian_day, body)
        }
    }

    #[test]
    fn test_julian_day_instants() {
        assert_relative_eq!(
            analysis_julian_day(date(2024, 1, 1)),
            2_460_310.958_333,
            epsilon = 1e-5
        );
        assert_relative_eq!(birth_julian_day(date(1990, 1, 1)), 2_447_893.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resolve_all_bodies() {
        let resolver = PositionResolver::new(Ephemeris::default());
        let table = resolver.resolve(date(2024, 1, 1), date(1990, 1, 1));
        assert!(table.is_complete());
        assert_eq!(table.observations().len(), CelestialBody::COUNT);

        for obs in table.observations() {
            assert!((0.0..360.0).contains(&obs.analysis_longitude));
            assert!((0.0..360.0).contains(&obs.birth_longitude));
            assert!((0.0..30.0).contains(&obs.degree));
        }

        // Sun sits in Capricorn at both new year dates
        let sun = table.observation(CelestialBody::Sun).unwrap();
        assert_eq!(sun.sign, crate::ZodiacSign::Capricorn);
        assert!(sun.resonance < 1.0);
    }

    #[test]
    fn test_single_body_failure_is_isolated() {
        let resolver = PositionResolver::new(FailingBody {
            inner: Ephemeris::default(),
            failing: CelestialBody::Pluto,
        });
        let table = resolver.resolve(date(2024, 1, 1), date(1990, 1, 1));
        assert!(!table.is_complete());
        assert_eq!(table.observations().len(), 9);
        assert!(table.observation(CelestialBody::Pluto).is_none());

        let failures = table.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].body(), CelestialBody::Pluto);
        assert!(table
            .analysis_longitudes()
            .iter()
            .all(|(body, _)| *body != CelestialBody::Pluto));
    }

    #[test]
    fn test_out_of_range_fails_every_body() {
        let resolver = PositionResolver::new(Ephemeris::default());
        let table = resolver.resolve(date(3500, 6, 1), date(1990, 1, 1));
        assert!(table.observations().is_empty());
        assert_eq!(table.failures().len(), CelestialBody::COUNT);
        assert!(matches!(
            table.failures()[0],
            OracleError::Calculation {
                source: CalculationError::OutOfRange { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_snapshot_replays_identically() {
        let resolver = PositionResolver::new(Ephemeris::default());
        let table = resolver.resolve(date(2023, 5, 17), date(1985, 7, 3));
        let snapshot = ObservationSnapshot::capture(&table, date(1985, 7, 3), date(2023, 5, 17));

        let bytes = snapshot.to_bytes().unwrap();
        let restored = ObservationSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.table(), table);
    }

    #[test]
    fn test_snapshot_file_round_trip_keeps_failures() {
        let resolver = PositionResolver::new(FailingBody {
            inner: Ephemeris::default(),
            failing: CelestialBody::Moon,
        });
        let table = resolver.resolve(date(2023, 5, 17), date(1985, 7, 3));
        let snapshot = ObservationSnapshot::capture(&table, date(1985, 7, 3), date(2023, 5, 17));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.bin");
        snapshot.save(&path).unwrap();

        let replayed = ObservationSnapshot::load(&path).unwrap().table();
        assert!(replayed.observation(CelestialBody::Moon).is_none());
        assert_eq!(replayed.observations(), table.observations());
    }
}
