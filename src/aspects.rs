// src/aspects.rs

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ConfigError;
use crate::{AspectKind, AspectRecord, CelestialBody};

/// Summary text when no pair forms an aspect.
pub const NO_NOTABLE_ASPECT: &str = "no notable aspect";

/// Conjunction is `separation < conjunction`. The other bands are open
/// intervals, except the opposition upper bound which is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectThresholds {
    pub conjunction: f64,
    pub square: (f64, f64),
    pub trine: (f64, f64),
    pub opposition: (f64, f64),
}

impl Default for AspectThresholds {
    fn default() -> Self {
        AspectThresholds {
            conjunction: 5.0,
            square: (85.0, 95.0),
            trine: (115.0, 125.0),
            opposition: (175.0, 180.0),
        }
    }
}

impl AspectThresholds {
    /// Bands must be ordered and disjoint inside [0, 180].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.conjunction > 0.0) {
            return Err(ConfigError::invalid("aspects.thresholds.conjunction", "must be positive"));
        }
        let bands = [
            ("aspects.thresholds.square", self.square),
            ("aspects.thresholds.trine", self.trine),
            ("aspects.thresholds.opposition", self.opposition),
        ];
        let mut floor = self.conjunction;
        for (field, (lower, upper)) in bands {
            if !(lower < upper) {
                return Err(ConfigError::invalid(field, "lower bound must be below upper bound"));
            }
            if lower < floor {
                return Err(ConfigError::invalid(
                    field,
                    format!("overlaps the preceding band ending at {}", floor),
                ));
            }
            floor = upper;
        }
        if self.opposition.1 > 180.0 {
            return Err(ConfigError::invalid(
                "aspects.thresholds.opposition",
                "upper bound exceeds 180",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectConfig {
    pub enable_square: bool,
    pub enable_opposition: bool,
    pub thresholds: AspectThresholds,
}

impl Default for AspectConfig {
    fn default() -> Self {
        AspectConfig {
            enable_square: true,
            enable_opposition: true,
            thresholds: AspectThresholds::default(),
        }
    }
}

impl AspectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()
    }
}

/// Shorter arc between two longitudes, in [0, 180].
pub fn angular_separation(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

pub struct AspectDetector {
    config: AspectConfig,
}

impl AspectDetector {
    pub fn new(config: AspectConfig) -> Self {
        AspectDetector { config }
    }

    pub fn config(&self) -> &AspectConfig {
        &self.config
    }

    pub fn classify(&self, separation: f64) -> Option<AspectKind> {
        let t = &self.config.thresholds;
        let within = |(lower, upper): (f64, f64)| lower < separation && separation < upper;

        if separation < t.conjunction {
            Some(AspectKind::Conjunction)
        } else if self.config.enable_square && within(t.square) {
            Some(AspectKind::Square)
        } else if within(t.trine) {
            Some(AspectKind::Trine)
        } else if self.config.enable_opposition
            && t.opposition.0 < separation
            && separation <= t.opposition.1
        {
            Some(AspectKind::Opposition)
        } else {
            None
        }
    }

    /// Every unordered pair, in input order, classified or not.
    pub fn survey(&self, longitudes: &[(CelestialBody, f64)]) -> Vec<AspectRecord> {
        let pairs = longitudes.len() * longitudes.len().saturating_sub(1) / 2;
        let mut records = Vec::with_capacity(pairs);
        for (i, &(body_a, lon_a)) in longitudes.iter().enumerate() {
            for &(body_b, lon_b) in &longitudes[i + 1..] {
                let separation = angular_separation(lon_a, lon_b);
                records.push(AspectRecord {
                    body_a,
                    body_b,
                    separation,
                    classification: self.classify(separation),
                });
            }
        }
        records
    }

    /// Classified pairs only.
    pub fn detect(&self, longitudes: &[(CelestialBody, f64)]) -> Vec<AspectRecord> {
        let records: Vec<AspectRecord> = self
            .survey(longitudes)
            .into_iter()
            .filter(|record| record.classification.is_some())
            .collect();
        trace!(count = records.len(), "detected aspects");
        records
    }
}

pub fn summarize_aspects(records: &[AspectRecord]) -> String {
    let parts: Vec<String> = records
        .iter()
        .filter_map(|record| {
            record
                .classification
                .map(|kind| format!("{}-{} {}", record.body_a, record.body_b, kind))
        })
        .collect();
    if parts.is_empty() {
        NO_NOTABLE_ASPECT.to_string()
    } else {
        parts.join(", ")
    }
}
