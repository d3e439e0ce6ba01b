// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tracks, their patterns and per-step trigger scheduling.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::scheduler::TriggerCommand;
use super::step::{StepData, TrackDefaults};
use super::{PatternId, TrackId};
use crate::effects::MidiEffectsChain;
use crate::timing::StepTime;

/// One programmed step inside a bucket, at an offset within the base step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Offset within the base step
    #[serde(default)]
    pub time: StepTime,
    /// Raw step data as stored in the pattern
    pub data: StepData,
}

impl BucketEntry {
    pub fn new(time: StepTime, data: StepData) -> Self {
        Self { time, data }
    }
}

/// A pattern's trigger matrix and length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    /// Pattern step to the entries programmed there
    pub matrix: BTreeMap<u64, Vec<BucketEntry>>,
    /// Number of base steps before the pattern repeats
    pub length: u64,
}

impl Pattern {
    pub fn new(matrix: BTreeMap<u64, Vec<BucketEntry>>, length: u64) -> Self {
        Self { matrix, length }
    }

    /// Position of transport step `step` within this pattern.
    ///
    /// `None` for an empty pattern, which never plays.
    pub fn pattern_step(&self, step: u64) -> Option<u64> {
        (self.length > 0).then(|| step % self.length)
    }

    /// Entries programmed at pattern step `step`
    pub fn bucket(&self, step: u64) -> Option<&[BucketEntry]> {
        self.matrix.get(&step).map(Vec::as_slice)
    }
}

/// A sequencer track
#[derive(Debug)]
pub struct Track {
    id: TrackId,
    /// Patterns by number
    patterns: HashMap<PatternId, Pattern>,
    /// Values inherited by steps that leave a field unset
    defaults: TrackDefaults,
    /// Effects every scheduled note passes through
    chain: MidiEffectsChain,
}

impl Track {
    /// Create a track with default settings and an empty effects chain
    pub fn new(id: TrackId) -> Self {
        Self {
            id,
            patterns: HashMap::new(),
            defaults: TrackDefaults::default(),
            chain: MidiEffectsChain::new(id),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn defaults(&self) -> &TrackDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut TrackDefaults {
        &mut self.defaults
    }

    /// Replace the track defaults
    pub fn set_defaults(&mut self, defaults: TrackDefaults) {
        self.defaults = defaults;
    }

    pub fn chain(&self) -> &MidiEffectsChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut MidiEffectsChain {
        &mut self.chain
    }

    /// Replace the effects chain, dropping all effect state
    pub fn set_chain(&mut self, chain: MidiEffectsChain) {
        self.chain = chain;
    }

    pub fn pattern(&self, pattern: PatternId) -> Option<&Pattern> {
        self.patterns.get(&pattern)
    }

    pub fn has_pattern(&self, pattern: PatternId) -> bool {
        self.patterns.contains_key(&pattern)
    }

    /// Replace (or create) a pattern
    pub fn set_pattern(&mut self, pattern: PatternId, contents: Pattern) {
        self.patterns.insert(pattern, contents);
    }

    /// Delete a pattern, returning it if it existed
    pub fn remove_pattern(&mut self, pattern: PatternId) -> Option<Pattern> {
        self.patterns.remove(&pattern)
    }

    /// Move a pattern to a new number, replacing anything stored there.
    ///
    /// Returns false if `from` does not exist.
    pub fn move_pattern(&mut self, from: PatternId, to: PatternId) -> bool {
        match self.patterns.remove(&from) {
            Some(pattern) => {
                self.patterns.insert(to, pattern);
                true
            }
            None => false,
        }
    }

    /// Schedule this track's triggers for transport step `step` of `pattern`.
    ///
    /// Tracks without the pattern produce nothing and do not advance their
    /// chain. Otherwise the chain is always stepped, even when no bucket is
    /// programmed at this step, so held arpeggios keep moving.
    pub fn schedule_triggers(&mut self, step: u64, pattern: PatternId) -> Vec<TriggerCommand> {
        let Some(contents) = self.patterns.get(&pattern) else {
            return Vec::new();
        };
        let Some(pattern_step) = contents.pattern_step(step) else {
            trace!(track = self.id, pattern, "skipping empty pattern");
            return Vec::new();
        };

        self.chain.on_new_step();

        let Some(bucket) = contents.bucket(pattern_step) else {
            self.chain.output(pattern_step, &self.defaults);
            return Vec::new();
        };

        let mut triggers = Vec::with_capacity(bucket.len() * 2);
        for entry in bucket {
            let resolved = entry.data.resolve(&self.defaults);
            triggers.push(TriggerCommand::TriggerAutomations {
                time: entry.time,
                step: pattern_step,
            });

            for voice in resolved.expand().into_iter().filter(|voice| voice.on) {
                self.chain.input(voice, entry.time, pattern_step);
            }
        }

        let track = self.id;
        triggers.extend(
            self.chain
                .output(pattern_step, &self.defaults)
                .iter()
                .map(|trigger| TriggerCommand::TriggerTrack {
                    track,
                    step: pattern_step,
                    trigger: trigger.clone(),
                }),
        );

        trace!(track, step = pattern_step, count = triggers.len(), "scheduled track");
        triggers
    }
}
