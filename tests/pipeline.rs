use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use resonance_core::ledger::{entries_from_report, CONSENSUS_LABEL};
use resonance_core::{
    CelestialBody, Ephemeris, EphemerisOracle, JulianDay, Ledger, ObservationSnapshot, OracleError,
    ResonanceConfig, ResonanceEngine, ResonanceRequest, SeedOrigin, SynthesisConfig,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn request() -> ResonanceRequest {
    ResonanceRequest::new("설계자", date(1990, 1, 1), date(2024, 1, 6))
}

/// Wraps the real ephemeris and refuses one body.
struct BlindSpot {
    inner: Ephemeris,
    body: CelestialBody,
}

impl EphemerisOracle for BlindSpot {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, OracleError> {
        if body == self.body {
            return Err(OracleError::Unavailable {
                body,
                message: "ephemeris file missing".to_string(),
            });
        }
        self.inner.longitude(julian_day, body)
    }
}

fn engine() -> ResonanceEngine<Ephemeris> {
    ResonanceEngine::from_config(&ResonanceConfig::default()).unwrap()
}

#[test]
fn identity_hash_of_known_user() {
    let report = engine().generate(&request());
    assert_eq!(report.identity.identity_hash.as_str(), "1be06059");
    assert_eq!(report.identity.identity_hash.handle(), "1BE06059");
}

#[test]
fn full_oracle_is_deterministic() {
    let engine = engine();
    let first = engine.generate(&request());
    let second = engine.generate(&request());

    assert!(first.is_reproducible());
    assert_eq!(first.seeds, second.seeds);
    assert_eq!(first.combination(), second.combination());
    assert_eq!(first.identity, second.identity);
    assert_eq!(first.synthesis, second.synthesis);
}

#[test]
fn report_invariants_hold() {
    let report = engine().generate(&request());

    assert_eq!(report.seeds.values().len(), 10);
    assert_eq!(report.observations.len(), 10);
    assert!(report.failures.is_empty());
    assert_eq!(report.synthesis.channels.len(), 3);
    assert!(report
        .synthesis
        .channels
        .iter()
        .all(|draw| draw.candidates.len() == 5
            && draw.candidates.iter().all(|c| c.is_valid(6, 1..=45))));
    assert!(report.combination().is_valid(6, 1..=45));
    assert!(!report.aspect_summary.is_empty());
}

#[test]
fn missing_pluto_degrades_to_fallback() {
    let oracle = BlindSpot {
        inner: Ephemeris::default(),
        body: CelestialBody::Pluto,
    };
    let blind = ResonanceEngine::new(oracle, &ResonanceConfig::default()).unwrap();
    let report = blind.generate_with_rng(&request(), &mut ChaCha8Rng::seed_from_u64(11));

    assert_eq!(report.observations.len(), 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].body, CelestialBody::Pluto);
    assert_eq!(report.seeds.origin(CelestialBody::Pluto), SeedOrigin::Fallback);
    assert_eq!(report.seeds.fallback_count(), 1);
    assert!(!report.is_reproducible());
    assert!(report
        .aspects
        .iter()
        .all(|a| a.body_a != CelestialBody::Pluto && a.body_b != CelestialBody::Pluto));
    assert!(report.combination().is_valid(6, 1..=45));

    // the other nine seeds match a full run
    let full = engine().generate(&request());
    for body in CelestialBody::iter().filter(|b| *b != CelestialBody::Pluto) {
        assert_eq!(report.seeds.get(body), full.seeds.get(body));
    }
}

#[test]
fn out_of_range_date_uses_only_fallbacks() {
    let request = ResonanceRequest::new("설계자", date(1990, 1, 1), date(3500, 1, 1));
    let report = engine().generate_with_rng(&request, &mut ChaCha8Rng::seed_from_u64(3));

    assert!(report.observations.is_empty());
    assert_eq!(report.failures.len(), 10);
    assert_eq!(report.seeds.fallback_count(), 10);
    assert!(report.aspects.is_empty());
    assert_eq!(report.aspect_summary, resonance_core::NO_NOTABLE_ASPECT);
    assert!(report.combination().is_valid(6, 1..=45));
}

#[test]
fn single_candidate_is_pure_filler() {
    let config = ResonanceConfig {
        synthesis: SynthesisConfig {
            channel_count: 1,
            candidates_per_channel: 1,
            ..SynthesisConfig::default()
        },
        ..ResonanceConfig::default()
    };
    let engine = ResonanceEngine::from_config(&config).unwrap();
    let report = engine.generate(&request());

    assert!(report.synthesis.repeated.is_empty());
    let identity_seed = report.identity.identity_hash.value();
    let expected: Vec<u32> = engine
        .synthesizer()
        .filler_draw(identity_seed)
        .into_iter()
        .take(6)
        .collect();
    assert_eq!(report.synthesis.filler, expected);
    assert!(report.combination().is_valid(6, 1..=45));
}

#[test]
fn snapshot_replay_reproduces_report() {
    let engine = engine();
    let request = request();
    let table = engine.resolve(&request);
    let snapshot = ObservationSnapshot::capture(&table, request.birth_date, request.analysis_date);
    let bytes = snapshot.to_bytes().unwrap();

    let original = engine.assemble(&request, &table, &mut ChaCha8Rng::seed_from_u64(0));
    let restored = ObservationSnapshot::from_bytes(&bytes).unwrap();
    let replayed = engine.assemble(&request, &restored.table(), &mut ChaCha8Rng::seed_from_u64(0));

    assert_eq!(replayed, original);
}

#[test]
fn ledger_records_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("resonance_log.csv"));
    let engine = engine();
    let report = engine.generate(&request());

    assert_eq!(ledger.record(&report, true).unwrap(), 16);
    let other_request = ResonanceRequest::new("someone", date(1975, 9, 30), date(2024, 1, 6));
    let other = engine.generate(&other_request);
    assert_eq!(ledger.record(&other, false).unwrap(), 1);

    let rows = ledger.entries_for(&report.identity.identity_hash).unwrap();
    assert_eq!(rows.len(), 16);
    assert_eq!(rows[0].channel_label, CONSENSUS_LABEL);
    assert_eq!(&rows[0].combination, report.combination());
    assert_eq!(rows[1].channel_label, "baseline-1");
    assert_eq!(rows[15].channel_label, "identity-5");
    assert!(rows.iter().all(|row| row.aspect_summary == report.aspect_summary));

    let other_rows = ledger.entries_for(&other.identity.identity_hash).unwrap();
    assert_eq!(other_rows.len(), 1);
}

#[test]
fn consensus_only_rows() {
    let report = engine().generate(&request());
    let rows = entries_from_report(&report, false, chrono::Utc::now());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].display_name, "설계자");
    assert_eq!(rows[0].analysis_date, date(2024, 1, 6));
}
