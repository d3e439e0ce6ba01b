// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Inbound command handling and per-step trigger scheduling.
//!
//! The scheduler is single-threaded and step-synchronous: commands and
//! scheduling requests are applied one at a time through `&mut self`, so a
//! pattern or parameter update can never land in the middle of a step.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::step::{StepData, TrackDefaults};
use super::track::{BucketEntry, Pattern, Track};
use super::trigger::MidiTrigger;
use super::{PatternId, TrackId};
use crate::config::{EffectConfig, ParamValue};
use crate::effects::{LiveSink, MidiEffectsChain};
use crate::error::{EngineError, Result};
use crate::timing::StepTime;

/// Commands emitted for the audio side, in emission order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "command",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TriggerCommand {
    /// A bucket entry was reached, whether or not it sounds
    TriggerAutomations { time: StepTime, step: u64 },
    /// A note leaving the track's effects chain
    TriggerTrack {
        track: TrackId,
        step: u64,
        trigger: MidiTrigger,
    },
}

/// Inbound engine commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    /// Replace a pattern's trigger matrix and length
    PatternUpdate {
        track: TrackId,
        pattern: PatternId,
        matrix: BTreeMap<u64, Vec<BucketEntry>>,
        pattern_length: u64,
    },
    PatternMoved {
        track: TrackId,
        from: PatternId,
        to: PatternId,
    },
    PatternDeleted { track: TrackId, pattern: PatternId },
    TrackDeleted { track: TrackId },
    /// Set a track default or effect parameter, or a global one when
    /// `track` is absent
    ParameterUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track: Option<TrackId>,
        id: String,
        value: ParamValue,
    },
    /// Replace a track's defaults
    TrackDataUpdate {
        track: TrackId,
        track_data: TrackDefaults,
    },
    /// Rebuild a track's effects chain
    MidiEffectsUpdate {
        track: TrackId,
        effects: Vec<EffectConfig>,
    },
    /// Reset a track's effect state
    MidiEffectsCleared { track: TrackId },
    /// Produce the triggers for one transport step
    ScheduleTrackTriggers { step: u64, pattern: PatternId },
    /// Transport (re)started
    Start,
}

/// Everything the engine knows about the current session
#[derive(Debug, Default)]
pub struct Session {
    /// Tracks by number, iterated in ascending order
    tracks: BTreeMap<TrackId, Track>,
    /// Global parameters
    parameters: HashMap<String, ParamValue>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, track: TrackId) -> Option<&Track> {
        self.tracks.get(&track)
    }

    pub fn track_mut(&mut self, track: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&track)
    }

    /// Get a track, creating it on first reference
    pub fn ensure_track(&mut self, track: TrackId) -> &mut Track {
        self.tracks.entry(track).or_insert_with(|| {
            debug!(track, "created track");
            Track::new(track)
        })
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn remove_track(&mut self, track: TrackId) -> Option<Track> {
        self.tracks.remove(&track)
    }

    pub fn parameter(&self, id: &str) -> Option<&ParamValue> {
        self.parameters.get(id)
    }

    pub fn set_parameter(&mut self, id: impl Into<String>, value: ParamValue) {
        self.parameters.insert(id.into(), value);
    }
}

/// Applies commands to a session and schedules each step's triggers
#[derive(Debug, Default)]
pub struct Scheduler {
    session: Session,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Apply one inbound command.
    ///
    /// Only `ScheduleTrackTriggers` produces triggers; every other command
    /// returns an empty list.
    pub fn apply(&mut self, command: Command) -> Result<Vec<TriggerCommand>> {
        match command {
            Command::PatternUpdate {
                track,
                pattern,
                matrix,
                pattern_length,
            } => {
                debug!(track, pattern, pattern_length, "pattern update");
                self.session
                    .ensure_track(track)
                    .set_pattern(pattern, Pattern::new(matrix, pattern_length));
            }
            Command::PatternMoved { track, from, to } => {
                debug!(track, from, to, "pattern moved");
                if !self.existing_track(track)?.move_pattern(from, to) {
                    return Err(EngineError::UnknownPattern {
                        track,
                        pattern: from,
                    });
                }
            }
            Command::PatternDeleted { track, pattern } => {
                debug!(track, pattern, "pattern deleted");
                if self.existing_track(track)?.remove_pattern(pattern).is_none() {
                    return Err(EngineError::UnknownPattern { track, pattern });
                }
            }
            Command::TrackDeleted { track } => {
                debug!(track, "track deleted");
                self.session
                    .remove_track(track)
                    .ok_or(EngineError::UnknownTrack(track))?;
            }
            Command::ParameterUpdate {
                track: None,
                id,
                value,
            } => {
                debug!(%id, "global parameter update");
                self.session.set_parameter(id, value);
            }
            Command::ParameterUpdate {
                track: Some(track),
                id,
                value,
            } => {
                debug!(track, %id, "track parameter update");
                let track = self.session.ensure_track(track);
                match track.defaults_mut().set_param(&id, &value) {
                    Err(EngineError::UnknownParameter(_)) => {
                        track.chain_mut().set_param(&id, &value)?
                    }
                    other => other?,
                }
            }
            Command::TrackDataUpdate { track, track_data } => {
                debug!(track, "track data update");
                self.session.ensure_track(track).set_defaults(track_data);
            }
            Command::MidiEffectsUpdate { track, effects } => {
                debug!(track, count = effects.len(), "midi effects update");
                self.session
                    .ensure_track(track)
                    .set_chain(MidiEffectsChain::from_config(track, &effects));
            }
            Command::MidiEffectsCleared { track } => {
                debug!(track, "midi effects cleared");
                self.session.ensure_track(track).chain_mut().clear();
            }
            Command::ScheduleTrackTriggers { step, pattern } => {
                return Ok(self.schedule_triggers(step, pattern));
            }
            Command::Start => self.start(),
        }
        Ok(Vec::new())
    }

    /// Apply a batch of commands in order, collecting any triggers
    pub fn apply_all<I>(&mut self, commands: I) -> Result<Vec<TriggerCommand>>
    where
        I: IntoIterator<Item = Command>,
    {
        let mut triggers = Vec::new();
        for command in commands {
            triggers.extend(self.apply(command)?);
        }
        Ok(triggers)
    }

    /// Schedule transport step `step` of `pattern` across every track, in
    /// ascending track order
    pub fn schedule_triggers(&mut self, step: u64, pattern: PatternId) -> Vec<TriggerCommand> {
        let mut triggers = Vec::new();
        for track in self.session.tracks.values_mut() {
            triggers.extend(track.schedule_triggers(step, pattern));
        }
        trace!(step, pattern, count = triggers.len(), "scheduled step");
        triggers
    }

    /// Reset every effects chain for a fresh transport start
    pub fn start(&mut self) {
        debug!(tracks = self.session.track_count(), "transport start");
        for track in self.session.tracks.values_mut() {
            track.chain_mut().clear();
        }
    }

    /// Play a note live on `track`
    pub fn live_trigger(
        &mut self,
        track: TrackId,
        step_data: StepData,
        sink: &mut dyn LiveSink,
    ) -> Result<()> {
        let track = self.existing_track(track)?;
        let defaults = track.defaults().clone();
        let resolved = step_data.resolve(&defaults);
        track.chain_mut().live_input_trigger(resolved, &defaults, sink);
        Ok(())
    }

    /// Release a live note on `track`
    pub fn live_release(
        &mut self,
        track: TrackId,
        transpose: i32,
        sink: &mut dyn LiveSink,
    ) -> Result<()> {
        self.existing_track(track)?
            .chain_mut()
            .live_input_release(transpose, sink);
        Ok(())
    }

    fn existing_track(&mut self, track: TrackId) -> Result<&mut Track> {
        self.session
            .track_mut(track)
            .ok_or(EngineError::UnknownTrack(track))
    }
}
