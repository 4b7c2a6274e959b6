// src/card.rs

use std::fmt::Write;
use thiserror::Error;

use crate::{CelestialBody, ResonanceReport};

#[derive(Debug, Error)]
pub enum CardError {
    #[error("failed to format card: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("failed to serialize card: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns a finished report into something a person can read.
pub trait CardRenderer {
    fn render(&self, report: &ResonanceReport) -> Result<String, CardError>;
}

const RULE: &str = "------------------------------------------------------------";
const DOUBLE_RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCard {
    pub show_candidates: bool,
    pub show_guide: bool,
}

impl Default for TextCard {
    fn default() -> Self {
        TextCard {
            show_candidates: true,
            show_guide: true,
        }
    }
}

fn padded(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:02}", n))
        .collect::<Vec<_>>()
        .join(" ")
}

impl CardRenderer for TextCard {
    fn render(&self, report: &ResonanceReport) -> Result<String, CardError> {
        let mut out = String::new();
        let identity = &report.identity;

        writeln!(out, "{}", DOUBLE_RULE)?;
        writeln!(out, " COSMIC RESONANCE CARD  [{}]", identity.identity_hash.handle())?;
        writeln!(
            out,
            " {}  born {}  analysis {}",
            identity.display_name, identity.birth_date, report.analysis_date
        )?;
        writeln!(out, "{}", RULE)?;

        writeln!(out, " {:<12} {:<24} {:>8} {:>10}", "body", "sign", "degree", "resonance")?;
        for obs in &report.observations {
            let sign = format!("{} ({})", obs.sign, obs.sign.korean_name());
            writeln!(
                out,
                " {} {:<9} {:<24} {:>7.2}° {:>9.2}°",
                obs.body.glyph(),
                obs.body.name(),
                sign,
                obs.degree,
                obs.resonance
            )?;
        }
        for failure in &report.failures {
            writeln!(
                out,
                " {} {:<9} unavailable: {}",
                failure.body.glyph(),
                failure.body.name(),
                failure.reason
            )?;
        }
        if !report.is_reproducible() {
            writeln!(
                out,
                " note: {} seed(s) drawn at random; this card cannot be reproduced",
                report.seeds.fallback_count()
            )?;
        }
        writeln!(out, "{}", RULE)?;

        writeln!(out, " aspects: {}", report.aspect_summary)?;
        writeln!(out, "{}", RULE)?;

        if self.show_candidates {
            for draw in &report.synthesis.channels {
                writeln!(out, " {} channel (seed {})", draw.channel.label(), draw.base_seed)?;
                for (n, candidate) in draw.candidates.iter().enumerate() {
                    writeln!(out, "   #{}  {}", n + 1, padded(candidate.numbers()))?;
                }
            }
            writeln!(out, "{}", RULE)?;
        }

        if !report.synthesis.repeated.is_empty() {
            let repeated: Vec<String> = report
                .synthesis
                .repeated
                .iter()
                .map(|f| format!("{:02}x{}", f.number, f.count))
                .collect();
            writeln!(out, " repeated: {}", repeated.join(" "))?;
        }
        writeln!(out, " *  {}  *", padded(report.combination().numbers()))?;

        if self.show_guide {
            writeln!(out, "{}", RULE)?;
            writeln!(out, " planet symbol guide")?;
            for pair in CelestialBody::ALL.chunks(2) {
                let cells: Vec<String> = pair
                    .iter()
                    .map(|body| {
                        format!("{} {:<8} {:<26}", body.glyph(), body.name(), body.keyword())
                    })
                    .collect();
                writeln!(out, " {}", cells.join(" ").trim_end())?;
            }
        }
        writeln!(out, "{}", DOUBLE_RULE)?;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCard {
    pub pretty: bool,
}

impl CardRenderer for JsonCard {
    fn render(&self, report: &ResonanceReport) -> Result<String, CardError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ephemeris, ResonanceConfig, ResonanceEngine, ResonanceRequest};
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn report() -> ResonanceReport {
        let engine =
            ResonanceEngine::new(Ephemeris::default(), &ResonanceConfig::default()).unwrap();
        let request = ResonanceRequest::new(
            "설계자",
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
        );
        engine.generate_with_rng(&request, &mut ChaCha8Rng::seed_from_u64(0))
    }

    #[test]
    fn test_text_card_sections() {
        let report = report();
        let card = TextCard::default().render(&report).unwrap();
        assert!(card.contains("[1BE06059]"));
        assert!(card.contains("설계자"));
        assert!(card.contains("염소자리"));
        assert!(card.contains("baseline channel"));
        assert!(card.contains("identity channel"));
        assert!(card.contains("planet symbol guide"));
        assert!(card.contains("transformation / rebirth"));
        assert!(card.contains(&padded(report.combination().numbers())));
        assert!(!card.contains("cannot be reproduced"));
    }

    #[test]
    fn test_text_card_without_extras() {
        let report = report();
        let card = TextCard {
            show_candidates: false,
            show_guide: false,
        }
        .render(&report)
        .unwrap();
        assert!(!card.contains("channel (seed"));
        assert!(!card.contains("planet symbol guide"));
        assert!(card.contains(&padded(report.combination().numbers())));
    }

    #[test]
    fn test_json_card_round_trips() {
        let report = report();
        let json = JsonCard::default().render(&report).unwrap();
        let parsed: ResonanceReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.combination(), report.combination());
        assert_eq!(parsed.identity, report.identity);

        let pretty = JsonCard { pretty: true }.render(&report).unwrap();
        assert!(pretty.contains("\n  \"identity\""));
    }

    #[test]
    fn test_padded_numbers() {
        assert_eq!(padded(&[3, 11, 45]), "03 11 45");
    }
}
