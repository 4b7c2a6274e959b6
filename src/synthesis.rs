// src/synthesis.rs

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::config::ConfigError;
use crate::identity::IdentityHash;
use crate::seeds::SeedSet;
use crate::{CelestialBody, NumberCombination};

/// Widest `number_range` accepted by `SynthesisConfig::validate`.
pub const MAX_NUMBER_SPAN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub channel_count: usize,
    pub candidates_per_channel: usize,
    pub combination_size: usize,
    pub number_range: (u32, u32),
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            channel_count: 3,
            candidates_per_channel: 5,
            combination_size: 6,
            number_range: (1, 45),
        }
    }
}

impl SynthesisConfig {
    pub fn range(&self) -> RangeInclusive<u32> {
        self.number_range.0..=self.number_range.1
    }

    /// Count of numbers in `number_range`.
    pub fn span(&self) -> usize {
        (self.number_range.1 - self.number_range.0) as usize + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count == 0 || self.channel_count > Channel::ALL.len() {
            return Err(ConfigError::invalid(
                "synthesis.channel_count",
                format!("must be between 1 and {}", Channel::ALL.len()),
            ));
        }
        if self.candidates_per_channel == 0 {
            return Err(ConfigError::invalid(
                "synthesis.candidates_per_channel",
                "must be at least 1",
            ));
        }
        if self.number_range.0 > self.number_range.1 {
            return Err(ConfigError::invalid(
                "synthesis.number_range",
                "lower bound exceeds upper bound",
            ));
        }
        if self.span() > MAX_NUMBER_SPAN {
            return Err(ConfigError::invalid(
                "synthesis.number_range",
                format!("covers {} numbers, at most {} allowed", self.span(), MAX_NUMBER_SPAN),
            ));
        }
        if self.combination_size == 0 || self.combination_size > self.span() {
            return Err(ConfigError::invalid(
                "synthesis.combination_size",
                format!("must be between 1 and {}", self.span()),
            ));
        }
        Ok(())
    }
}

// ---------------------------
// ## Channels
// ---------------------------

/// Candidate channels, each with its own base seed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Baseline,
    Ephemeris,
    Identity,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Baseline, Channel::Ephemeris, Channel::Identity];

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Baseline => "baseline",
            Channel::Ephemeris => "ephemeris",
            Channel::Identity => "identity",
        }
    }

    /// Baseline: Sun + Moon + Mercury. Ephemeris: Jupiter + Pluto.
    /// Identity: Moon + Mercury + (hash mod 1000).
    pub fn base_seed(&self, seeds: &SeedSet, identity: &IdentityHash) -> u64 {
        let sum = |bodies: &[CelestialBody]| {
            bodies
                .iter()
                .fold(0u64, |acc, body| acc.wrapping_add(seeds.get(*body)))
        };
        match self {
            Channel::Baseline => {
                sum(&[CelestialBody::Sun, CelestialBody::Moon, CelestialBody::Mercury])
            }
            Channel::Ephemeris => sum(&[CelestialBody::Jupiter, CelestialBody::Pluto]),
            Channel::Identity => sum(&[CelestialBody::Moon, CelestialBody::Mercury])
                .wrapping_add(identity.value() % 1000),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------
// ## Results
// ---------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDraw {
    pub channel: Channel,
    pub base_seed: u64,
    pub candidates: Vec<NumberCombination>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFrequency {
    pub number: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub channels: Vec<ChannelDraw>,
    /// Numbers seen more than once across all candidates, most frequent first.
    pub repeated: Vec<NumberFrequency>,
    /// Numbers taken from the identity draw to complete the combination.
    pub filler: Vec<u32>,
    pub combination: NumberCombination,
}

impl Synthesis {
    pub fn candidate_pool(&self) -> impl Iterator<Item = &NumberCombination> {
        self.channels.iter().flat_map(|draw| draw.candidates.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub repeated: Vec<NumberFrequency>,
    pub filler: Vec<u32>,
    pub combination: NumberCombination,
}

/// Repeated numbers ordered by descending count, ties by ascending value.
pub fn rank_repeated<'a, I>(pool: I) -> Vec<NumberFrequency>
where
    I: IntoIterator<Item = &'a NumberCombination>,
{
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for combination in pool {
        for &number in combination.numbers() {
            *counts.entry(number).or_insert(0) += 1;
        }
    }
    let mut repeated: Vec<NumberFrequency> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(number, count)| NumberFrequency { number, count })
        .collect();
    // stable sort keeps ascending value among equal counts
    repeated.sort_by(|a, b| b.count.cmp(&a.count));
    repeated
}

// ---------------------------
// ## Synthesizer
// ---------------------------

pub struct CombinationSynthesizer {
    config: SynthesisConfig,
}

impl CombinationSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        CombinationSynthesizer { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// `combination_size` distinct numbers from the range, fully determined by `seed`.
    pub fn draw_candidate(&self, seed: u64) -> NumberCombination {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let lower = self.config.number_range.0;
        let numbers = index::sample(&mut rng, self.config.span(), self.config.combination_size)
            .into_iter()
            .map(|i| lower + i as u32)
            .collect();
        NumberCombination::from_unsorted(numbers)
    }

    /// Distinct numbers in an order fixed by `seed`: twice `combination_size`,
    /// or the whole range when it is smaller. Enough to complete any vote.
    pub fn filler_draw(&self, seed: u64) -> Vec<u32> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let span = self.config.span();
        let amount = span.min(self.config.combination_size.saturating_mul(2));
        let lower = self.config.number_range.0;
        index::sample(&mut rng, span, amount)
            .into_iter()
            .map(|i| lower + i as u32)
            .collect()
    }

    pub fn draw_channel(
        &self,
        channel: Channel,
        seeds: &SeedSet,
        identity: &IdentityHash,
    ) -> ChannelDraw {
        let base_seed = channel.base_seed(seeds, identity);
        let candidates = (0..self.config.candidates_per_channel as u64)
            .map(|i| self.draw_candidate(base_seed.wrapping_add(i)))
            .collect();
        ChannelDraw {
            channel,
            base_seed,
            candidates,
        }
    }

    /// Frequency vote over `pool`, completed from the identity draw.
    /// Filler skips numbers already chosen, so the result is always distinct.
    pub fn reduce(&self, pool: &[NumberCombination], identity_seed: u64) -> Reduction {
        let size = self.config.combination_size;
        let repeated = rank_repeated(pool);

        let mut chosen: Vec<u32> = repeated.iter().take(size).map(|f| f.number).collect();
        let mut filler = Vec::new();
        for number in self.filler_draw(identity_seed) {
            if chosen.len() >= size {
                break;
            }
            if !chosen.contains(&number) {
                chosen.push(number);
                filler.push(number);
            }
        }

        Reduction {
            repeated,
            filler,
            combination: NumberCombination::from_unsorted(chosen),
        }
    }

    pub fn synthesize(&self, seeds: &SeedSet, identity: &IdentityHash) -> Synthesis {
        let channels: Vec<ChannelDraw> = Channel::ALL
            .iter()
            .take(self.config.channel_count)
            .map(|&channel| {
                let draw = self.draw_channel(channel, seeds, identity);
                debug!(%channel, base_seed = draw.base_seed, "drew candidates");
                draw
            })
            .collect();

        let pool: Vec<NumberCombination> = channels
            .iter()
            .flat_map(|draw| draw.candidates.iter().cloned())
            .collect();
        let Reduction {
            repeated,
            filler,
            combination,
        } = self.reduce(&pool, identity.value());
        debug!(repeated = repeated.len(), filler = filler.len(), "reduced candidate pool");

        Synthesis {
            channels,
            repeated,
            filler,
            combination,
        }
    }
}
