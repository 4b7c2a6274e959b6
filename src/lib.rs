// src/lib.rs

use chrono::{Datelike, NaiveDate, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub mod aspects;
pub mod card;
pub mod config;
pub mod ephemeris;
pub mod identity;
pub mod ledger;
pub mod seeds;
pub mod synthesis;

pub use aspects::{
    angular_separation, summarize_aspects, AspectConfig, AspectDetector, AspectThresholds,
    NO_NOTABLE_ASPECT,
};
pub use card::{CardError, CardRenderer, JsonCard, TextCard};
pub use config::{ConfigError, ResonanceConfig};
pub use ephemeris::{
    analysis_julian_day, birth_julian_day, EphemerisOracle, ObservationSnapshot, OracleError,
    PositionResolver, PositionTable, SnapshotError,
};
pub use identity::{IdentityError, IdentityHash, UserIdentity};
pub use ledger::{Ledger, LedgerConfig, LedgerEntry, LedgerError};
pub use orbital_ephemeris::{Ephemeris, EphemerisConfig, JulianDay};
pub use seeds::{derive_seed, SeedOrigin, SeedSet};
pub use synthesis::{
    Channel, ChannelDraw, CombinationSynthesizer, NumberFrequency, Reduction, Synthesis,
    SynthesisConfig, MAX_NUMBER_SPAN,
};

// ---------------------------
// ## Enumerations
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CelestialBody {
    Sun = 0,
    Moon = 1,
    Mercury = 2,
    Venus = 3,
    Mars = 4,
    Jupiter = 5,
    Saturn = 6,
    Uranus = 7,
    Neptune = 8,
    Pluto = 9,
}

impl CelestialBody {
    pub const COUNT: usize = 10;

    pub const ALL: [CelestialBody; CelestialBody::COUNT] = [
        CelestialBody::Sun,
        CelestialBody::Moon,
        CelestialBody::Mercury,
        CelestialBody::Venus,
        CelestialBody::Mars,
        CelestialBody::Jupiter,
        CelestialBody::Saturn,
        CelestialBody::Uranus,
        CelestialBody::Neptune,
        CelestialBody::Pluto,
    ];

    pub fn iter() -> impl Iterator<Item = CelestialBody> {
        CelestialBody::ALL.iter().copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "Sun",
            CelestialBody::Moon => "Moon",
            CelestialBody::Mercury => "Mercury",
            CelestialBody::Venus => "Venus",
            CelestialBody::Mars => "Mars",
            CelestialBody::Jupiter => "Jupiter",
            CelestialBody::Saturn => "Saturn",
            CelestialBody::Uranus => "Uranus",
            CelestialBody::Neptune => "Neptune",
            CelestialBody::Pluto => "Pluto",
        }
    }

    pub fn korean_name(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "태양",
            CelestialBody::Moon => "달",
            CelestialBody::Mercury => "수성",
            CelestialBody::Venus => "금성",
            CelestialBody::Mars => "화성",
            CelestialBody::Jupiter => "목성",
            CelestialBody::Saturn => "토성",
            CelestialBody::Uranus => "천왕성",
            CelestialBody::Neptune => "해왕성",
            CelestialBody::Pluto => "명왕성",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "☀️",
            CelestialBody::Moon => "🌙",
            CelestialBody::Mercury => "💧",
            CelestialBody::Venus => "✨",
            CelestialBody::Mars => "🔥",
            CelestialBody::Jupiter => "⚡",
            CelestialBody::Saturn => "🪐",
            CelestialBody::Uranus => "🌀",
            CelestialBody::Neptune => "🔱",
            CelestialBody::Pluto => "💀",
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "self / vitality",
            CelestialBody::Moon => "emotion / inner life",
            CelestialBody::Mercury => "communication / intellect",
            CelestialBody::Venus => "love / values",
            CelestialBody::Mars => "passion / action",
            CelestialBody::Jupiter => "expansion / luck",
            CelestialBody::Saturn => "patience / order",
            CelestialBody::Uranus => "change / innovation",
            CelestialBody::Neptune => "inspiration / dreams",
            CelestialBody::Pluto => "transformation / rebirth",
        }
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<CelestialBody> for orbital_ephemeris::Body {
    fn from(body: CelestialBody) -> Self {
        match body {
            CelestialBody::Sun => orbital_ephemeris::Body::Sun,
            CelestialBody::Moon => orbital_ephemeris::Body::Moon,
            CelestialBody::Mercury => orbital_ephemeris::Body::Mercury,
            CelestialBody::Venus => orbital_ephemeris::Body::Venus,
            CelestialBody::Mars => orbital_ephemeris::Body::Mars,
            CelestialBody::Jupiter => orbital_ephemeris::Body::Jupiter,
            CelestialBody::Saturn => orbital_ephemeris::Body::Saturn,
            CelestialBody::Uranus => orbital_ephemeris::Body::Uranus,
            CelestialBody::Neptune => orbital_ephemeris::Body::Neptune,
            CelestialBody::Pluto => orbital_ephemeris::Body::Pluto,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn from_longitude(longitude: f64) -> Self {
        let normalized_longitude = orbital_ephemeris::normalize_degrees(longitude);
        let sign_index = (normalized_longitude / 30.0).floor() as usize;
        ZodiacSign::ALL[sign_index.min(11)]
    }

    pub fn korean_name(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "양자리",
            ZodiacSign::Taurus => "황소자리",
            ZodiacSign::Gemini => "쌍둥이자리",
            ZodiacSign::Cancer => "게자리",
            ZodiacSign::Leo => "사자자리",
            ZodiacSign::Virgo => "처녀자리",
            ZodiacSign::Libra => "천칭자리",
            ZodiacSign::Scorpio => "전갈자리",
            ZodiacSign::Sagittarius => "사수자리",
            ZodiacSign::Capricorn => "염소자리",
            ZodiacSign::Aquarius => "물병자리",
            ZodiacSign::Pisces => "물고기자리",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign_str = match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        };
        write!(f, "{}", sign_str)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKind {
    Conjunction,
    Square,
    Trine,
    Opposition,
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AspectKind::Conjunction => "Conjunction",
            AspectKind::Square => "Square",
            AspectKind::Trine => "Trine",
            AspectKind::Opposition => "Opposition",
        };
        f.write_str(name)
    }
}

// ---------------------------
// ## Structures
// ---------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanetObservation {
    pub body: CelestialBody,
    pub analysis_longitude: f64,
    pub birth_longitude: f64,
    pub sign: ZodiacSign,
    pub degree: f64,
    // |analysis_longitude - birth_longitude|
    pub resonance: f64,
}

impl PlanetObservation {
    pub fn new(body: CelestialBody, analysis_longitude: f64, birth_longitude: f64) -> Self {
        let analysis_longitude = orbital_ephemeris::normalize_degrees(analysis_longitude);
        let birth_longitude = orbital_ephemeris::normalize_degrees(birth_longitude);
        PlanetObservation {
            body,
            analysis_longitude,
            birth_longitude,
            sign: ZodiacSign::from_longitude(analysis_longitude),
            degree: analysis_longitude % 30.0,
            resonance: (analysis_longitude - birth_longitude).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRecord {
    pub body_a: CelestialBody,
    pub body_b: CelestialBody,
    pub separation: f64,
    pub classification: Option<AspectKind>,
}

impl fmt::Display for AspectRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.classification {
            Some(kind) => write!(
                f,
                "{}-{} {} ({:.1}°)",
                self.body_a, self.body_b, kind, self.separation
            ),
            None => write!(f, "{}-{} ({:.1}°)", self.body_a, self.body_b, self.separation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberCombination(Vec<u32>);

impl NumberCombination {
    pub fn from_unsorted(mut numbers: Vec<u32>) -> Self {
        numbers.sort_unstable();
        NumberCombination(numbers)
    }

    pub fn numbers(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.0.binary_search(&number).is_ok()
    }

    // Exactly `size` distinct members, ascending, all inside `range`.
    pub fn is_valid(&self, size: usize, range: RangeInclusive<u32>) -> bool {
        self.0.len() == size
            && self.0.windows(2).all(|pair| pair[0] < pair[1])
            && self.0.iter().all(|n| range.contains(n))
    }
}

impl fmt::Display for NumberCombination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, number) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", number)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid number combination {input:?}: {reason}")]
pub struct ParseCombinationError {
    pub input: String,
    pub reason: String,
}

impl FromStr for NumberCombination {
    type Err = ParseCombinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numbers = s
            .split_whitespace()
            .map(|token| {
                token.parse::<u32>().map_err(|e| ParseCombinationError {
                    input: s.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let combination = NumberCombination::from_unsorted(numbers);
        if combination.0.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ParseCombinationError {
                input: s.to_string(),
                reason: "duplicate number".to_string(),
            });
        }
        Ok(combination)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFailure {
    pub body: CelestialBody,
    pub reason: String,
}

// ---------------------------
// ## Resonance Report
// ---------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResonanceRequest {
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub analysis_date: NaiveDate,
}

impl ResonanceRequest {
    pub fn new(
        display_name: impl Into<String>,
        birth_date: NaiveDate,
        analysis_date: NaiveDate,
    ) -> Self {
        ResonanceRequest {
            display_name: display_name.into(),
            birth_date,
            analysis_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceReport {
    pub identity: UserIdentity,
    pub analysis_date: NaiveDate,
    pub observations: Vec<PlanetObservation>,
    pub failures: Vec<BodyFailure>,
    pub seeds: SeedSet,
    pub aspects: Vec<AspectRecord>,
    pub aspect_summary: String,
    pub synthesis: Synthesis,
}

impl ResonanceReport {
    pub fn combination(&self) -> &NumberCombination {
        &self.synthesis.combination
    }

    pub fn is_reproducible(&self) -> bool {
        self.seeds.fallback_count() == 0
    }
}

pub struct ResonanceEngine<O> {
    resolver: PositionResolver<O>,
    detector: AspectDetector,
    synthesizer: CombinationSynthesizer,
}

impl ResonanceEngine<Ephemeris> {
    pub fn from_config(config: &ResonanceConfig) -> Result<Self, ConfigError> {
        ResonanceEngine::new(Ephemeris::new(config.ephemeris), config)
    }
}

impl<O: EphemerisOracle> ResonanceEngine<O> {
    pub fn new(oracle: O, config: &ResonanceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ResonanceEngine {
            resolver: PositionResolver::new(oracle),
            detector: AspectDetector::new(config.aspects),
            synthesizer: CombinationSynthesizer::new(config.synthesis),
        })
    }

    pub fn synthesizer(&self) -> &CombinationSynthesizer {
        &self.synthesizer
    }

    pub fn resolve(&self, request: &ResonanceRequest) -> PositionTable {
        self.resolver.resolve(request.analysis_date, request.birth_date)
    }

    pub fn generate(&self, request: &ResonanceRequest) -> ResonanceReport {
        self.generate_with_rng(request, &mut rand::thread_rng())
    }

    // `fallback_rng` only feeds seeds for bodies the oracle could not resolve.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        request: &ResonanceRequest,
        fallback_rng: &mut R,
    ) -> ResonanceReport {
        let table = self.resolve(request);
        self.assemble(request, &table, fallback_rng)
    }

    pub fn assemble<R: Rng + ?Sized>(
        &self,
        request: &ResonanceRequest,
        table: &PositionTable,
        fallback_rng: &mut R,
    ) -> ResonanceReport {
        let identity = UserIdentity::new(request.display_name.clone(), request.birth_date);

        let seeds = SeedSet::from_table(table, request.birth_date.day(), fallback_rng);
        debug!(seeds = ?seeds.values(), fallbacks = seeds.fallback_count(), "derived seeds");

        let aspects = self.detector.detect(&table.analysis_longitudes());
        let aspect_summary = summarize_aspects(&aspects);

        let synthesis = self.synthesizer.synthesize(&seeds, &identity.identity_hash);
        info!(
            identity = %identity.identity_hash,
            analysis_date = %request.analysis_date,
            combination = %synthesis.combination,
            "synthesized combination"
        );

        let failures = table
            .failures()
            .into_iter()
            .map(|err| BodyFailure {
                body: err.body(),
                reason: err.to_string(),
            })
            .collect();

        ResonanceReport {
            identity,
            analysis_date: request.analysis_date,
            observations: table.observations(),
            failures,
            seeds,
            aspects,
            aspect_summary,
            synthesis,
        }
    }
}

// ---------------------------
// ## Utility Functions
// ---------------------------

pub fn upcoming_draw_date(today: NaiveDate) -> NaiveDate {
    let saturday = Weekday::Sat.num_days_from_monday();
    let days_ahead = (7 + saturday - today.weekday().num_days_from_monday()) % 7;
    today + chrono::Duration::days(i64::from(days_ahead))
}
