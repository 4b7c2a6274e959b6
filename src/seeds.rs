// src/seeds.rs

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ephemeris::PositionTable;
use crate::{CelestialBody, PlanetObservation};

pub const FALLBACK_SEED_MIN: u64 = 1;
pub const FALLBACK_SEED_MAX: u64 = 999_999;

/// floor(analysis * 1000) + floor(birth * 10) + birth_day
pub fn derive_seed(analysis_longitude: f64, birth_longitude: f64, birth_day: u32) -> u64 {
    (analysis_longitude * 1000.0).floor() as u64
        + (birth_longitude * 10.0).floor() as u64
        + u64::from(birth_day)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedOrigin {
    Derived,
    Fallback,
}

/// Exactly one seed per body, in body order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSet {
    seeds: [u64; CelestialBody::COUNT],
    origins: [SeedOrigin; CelestialBody::COUNT],
}

impl SeedSet {
    pub fn from_table<R: Rng + ?Sized>(
        table: &PositionTable,
        birth_day: u32,
        fallback_rng: &mut R,
    ) -> Self {
        SeedSet::from_observations(&table.observations(), birth_day, fallback_rng)
    }

    /// Bodies without an observation draw a seed from `fallback_rng`.
    pub fn from_observations<R: Rng + ?Sized>(
        observations: &[PlanetObservation],
        birth_day: u32,
        fallback_rng: &mut R,
    ) -> Self {
        let mut seeds = [0; CelestialBody::COUNT];
        let mut origins = [SeedOrigin::Fallback; CelestialBody::COUNT];

        for body in CelestialBody::iter() {
            let i = body.index();
            match observations.iter().find(|obs| obs.body == body) {
                Some(obs) => {
                    seeds[i] = derive_seed(obs.analysis_longitude, obs.birth_longitude, birth_day);
                    origins[i] = SeedOrigin::Derived;
                }
                None => {
                    seeds[i] = fallback_rng.gen_range(FALLBACK_SEED_MIN..=FALLBACK_SEED_MAX);
                }
            }
        }

        SeedSet { seeds, origins }
    }

    /// All seeds marked as derived.
    pub fn from_values(seeds: [u64; CelestialBody::COUNT]) -> Self {
        SeedSet {
            seeds,
            origins: [SeedOrigin::Derived; CelestialBody::COUNT],
        }
    }

    pub fn get(&self, body: CelestialBody) -> u64 {
        self.seeds[body.index()]
    }

    pub fn origin(&self, body: CelestialBody) -> SeedOrigin {
        self.origins[body.index()]
    }

    pub fn values(&self) -> &[u64] {
        &self.seeds
    }

    pub fn fallback_count(&self) -> usize {
        self.origins
            .iter()
            .filter(|origin| **origin == SeedOrigin::Fallback)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CelestialBody, u64, SeedOrigin)> + '_ {
        CelestialBody::iter().map(move |body| (body, self.get(body), self.origin(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_derive_seed_formula() {
        assert_eq!(derive_seed(123.4567, 210.98, 15), 123_456 + 2_109 + 15);
        assert_eq!(derive_seed(0.0, 0.0, 1), 1);
        assert_eq!(derive_seed(359.9999, 359.99, 31), 359_999 + 3_599 + 31);
    }

    #[test]
    fn test_seeds_from_full_observations() {
        let observations: Vec<PlanetObservation> = CelestialBody::iter()
            .map(|body| PlanetObservation::new(body, 10.0 * body.index() as f64 + 0.5, 20.25))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let seeds = SeedSet::from_observations(&observations, 4, &mut rng);

        assert_eq!(seeds.fallback_count(), 0);
        assert_eq!(seeds.get(CelestialBody::Sun), 500 + 202 + 4);
        assert_eq!(seeds.get(CelestialBody::Jupiter), 50_500 + 202 + 4);
        assert_eq!(seeds.values().len(), CelestialBody::COUNT);
    }

    #[test]
    fn test_missing_body_uses_fallback_range() {
        let observations: Vec<PlanetObservation> = CelestialBody::iter()
            .filter(|body| *body != CelestialBody::Pluto)
            .map(|body| PlanetObservation::new(body, 100.0, 200.0))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let seeds = SeedSet::from_observations(&observations, 9, &mut rng);

        assert_eq!(seeds.fallback_count(), 1);
        assert_eq!(seeds.origin(CelestialBody::Pluto), SeedOrigin::Fallback);
        let pluto = seeds.get(CelestialBody::Pluto);
        assert!((FALLBACK_SEED_MIN..=FALLBACK_SEED_MAX).contains(&pluto));
        assert_eq!(seeds.get(CelestialBody::Sun), 100_000 + 2_000 + 9);
    }

    #[test]
    fn test_empty_observations_are_all_fallback() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seeds = SeedSet::from_observations(&[], 1, &mut rng);
        assert_eq!(seeds.fallback_count(), CelestialBody::COUNT);
        assert!(seeds
            .iter()
            .all(|(_, seed, _)| (FALLBACK_SEED_MIN..=FALLBACK_SEED_MAX).contains(&seed)));
    }
}
