// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Arpeggiator effect.
//!
//! Replaces the held chord with a sequence of single notes, one per tick
//! of the arpeggiator rate, cycling through the chord in pitch order and
//! across octaves. Notes arriving from the pattern stay held for twice
//! their duration; live notes stay held until released.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EffectKind, MidiEffect};
use crate::config::{EffectConfig, ParamValue};
use crate::error::{EngineError, Result};
use crate::sequencer::{MidiTrigger, StepData, TrackDefaults};
use crate::timing::{get_trigger_times, Resolution, BASE_RESOLUTION};

/// Number of reusable trigger slots in the arpeggiator's cache
pub const CACHE_SIZE: usize = 16;

/// Highest `arpOctaves` accepted
pub const MAX_OCTAVES: u32 = 10;

/// Order in which the held chord is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArpDirection {
    /// Lowest note first, octaves climbing
    #[default]
    Up,
    /// Highest note first, octaves falling
    Down,
}

impl ArpDirection {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "UP" => Some(ArpDirection::Up),
            "DOWN" => Some(ArpDirection::Down),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ArpDirection::Up => "UP",
            ArpDirection::Down => "DOWN",
        }
    }
}

/// Configuration for the arpeggiator
#[derive(Debug, Clone, PartialEq)]
pub struct ArpConfig {
    /// Rate at which notes are emitted
    pub rate: Resolution,
    /// Octaves above (or below) the held chord to cycle through
    pub octaves: u32,
    pub direction: ArpDirection,
    /// Times each note repeats before moving on
    pub repeat: u32,
    /// Emitted note length as a multiple of the track's duration
    pub duration_factor: f64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            rate: Resolution::SIXTEENTH,
            octaves: 0,
            direction: ArpDirection::Up,
            repeat: 1,
            duration_factor: 1.0,
        }
    }
}

fn invalid(id: &str, value: &ParamValue, expected: &str) -> EngineError {
    EngineError::InvalidParameter {
        id: id.to_string(),
        reason: format!("expected {}, got {:?}", expected, value),
    }
}

/// Parse a rate given either as `{resolution, isTriplet}` or as `"1/16"` / `"1/16t"`
fn parse_rate(id: &str, value: &ParamValue) -> Result<Resolution> {
    match value {
        ParamValue::Map(map) => {
            let resolution = map
                .get("resolution")
                .and_then(ParamValue::as_i64)
                .and_then(|r| u32::try_from(r).ok())
                .ok_or_else(|| invalid(id, value, "a resolution"))?;
            let is_triplet = map
                .get("isTriplet")
                .and_then(ParamValue::as_bool)
                .unwrap_or(false);
            Resolution::new(resolution, is_triplet)
        }
        ParamValue::String(text) => {
            let body = text
                .strip_prefix("1/")
                .ok_or_else(|| invalid(id, value, "a rate like \"1/16\""))?;
            let (digits, is_triplet) = match body.strip_suffix('t') {
                Some(digits) => (digits, true),
                None => (body, false),
            };
            let resolution = digits
                .parse::<u32>()
                .map_err(|_| invalid(id, value, "a rate like \"1/16\""))?;
            Resolution::new(resolution, is_triplet)
        }
        _ => Err(invalid(id, value, "a resolution")),
    }
}

/// Most ticks of `rate` that can fall inside one base step
fn max_ticks_per_step(rate: &Resolution) -> i64 {
    (rate.num_steps() / BASE_RESOLUTION.num_steps()).ceil()
}

/// Reject rates whose busiest step would not fit in the cache
fn check_rate(id: &str, rate: Resolution) -> Result<Resolution> {
    if max_ticks_per_step(&rate) >= CACHE_SIZE as i64 {
        return Err(EngineError::InvalidParameter {
            id: id.to_string(),
            reason: format!(
                "rate {} emits up to {} notes per step, the cache holds {}",
                rate,
                max_ticks_per_step(&rate),
                CACHE_SIZE
            ),
        });
    }
    Ok(rate)
}

impl ArpConfig {
    /// Set a configuration field by its parameter id
    pub fn set_param(&mut self, id: &str, value: &ParamValue) -> Result<()> {
        let count = || {
            value
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(id, value, "a non-negative integer"))
        };

        match id {
            "arpRate" => self.rate = check_rate(id, parse_rate(id, value)?)?,
            "arpOctaves" => {
                let octaves = count()?;
                if octaves > MAX_OCTAVES {
                    return Err(EngineError::InvalidParameter {
                        id: id.to_string(),
                        reason: format!("at most {} octaves, got {}", MAX_OCTAVES, octaves),
                    });
                }
                self.octaves = octaves;
            }
            "arpDirection" => {
                self.direction = value
                    .as_str()
                    .and_then(ArpDirection::from_name)
                    .ok_or_else(|| invalid(id, value, "UP or DOWN"))?
            }
            "arpRepeat" => self.repeat = count()?,
            "arpDurationFactor" => {
                self.duration_factor = value
                    .as_f64()
                    .ok_or_else(|| invalid(id, value, "a number"))?
            }
            _ => return Err(EngineError::UnknownParameter(id.to_string())),
        }
        Ok(())
    }

    /// Build from an effect config; fields this effect does not know are ignored
    pub fn from_effect_config(config: &EffectConfig) -> Result<Self> {
        let mut arp = Self::default();
        for (id, value) in &config.params {
            match arp.set_param(id, value) {
                Ok(()) | Err(EngineError::UnknownParameter(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(arp)
    }

    fn params(&self) -> BTreeMap<String, ParamValue> {
        let mut rate = BTreeMap::new();
        rate.insert(
            "resolution".to_string(),
            ParamValue::Int(self.rate.resolution() as i64),
        );
        rate.insert("isTriplet".to_string(), ParamValue::Bool(self.rate.is_triplet()));
        rate.insert(
            "baseResolution".to_string(),
            ParamValue::Int(self.rate.base_resolution() as i64),
        );

        let mut params = BTreeMap::new();
        params.insert("arpRate".to_string(), ParamValue::Map(rate));
        params.insert("arpOctaves".to_string(), ParamValue::Int(self.octaves as i64));
        params.insert(
            "arpDirection".to_string(),
            ParamValue::String(self.direction.name().to_string()),
        );
        params.insert("arpRepeat".to_string(), ParamValue::Int(self.repeat as i64));
        params.insert(
            "arpDurationFactor".to_string(),
            ParamValue::Float(self.duration_factor),
        );
        params
    }
}

/// Fixed-capacity arena of reusable triggers with a round-robin cursor.
///
/// Each `stage` overwrites the slot under the cursor in place, reusing its
/// allocations. An output batch starts at slot 0 and is read back with
/// `batch`, so one batch must never stage more than `CACHE_SIZE` triggers.
/// Slots are only valid until the next batch; callers that keep a trigger
/// longer must clone it out.
#[derive(Debug)]
pub struct StepCache {
    slots: [MidiTrigger; CACHE_SIZE],
    cursor: usize,
    staged: usize,
}

impl StepCache {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| MidiTrigger::live(StepData::default())),
            cursor: 0,
            staged: 0,
        }
    }

    /// Start a new batch at the first slot
    pub fn begin_batch(&mut self) {
        self.cursor = 0;
        self.staged = 0;
    }

    /// Overwrite the next slot with `source` at a new pitch and duration
    pub fn stage(
        &mut self,
        source: &MidiTrigger,
        transpose: i32,
        duration: Option<f64>,
    ) -> &mut MidiTrigger {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % CACHE_SIZE;
        self.staged = (self.staged + 1).min(CACHE_SIZE);

        let slot = &mut self.slots[index];
        slot.step_data.copy_voice_from(&source.step_data);
        slot.step_data.transpose = Some(transpose);
        slot.step_data.duration = duration;
        slot.time = source.time;
        slot.step_number = source.step_number;
        slot
    }

    /// Triggers staged since the last `begin_batch`
    pub fn batch(&self) -> &[MidiTrigger] {
        &self.slots[..self.staged]
    }

    /// Slot the next `stage` will overwrite
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        CACHE_SIZE
    }
}

impl Default for StepCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Arpeggiator effect
#[derive(Debug)]
pub struct ArpEffect {
    enabled: bool,
    config: ArpConfig,
    /// Held chord, ordered by pitch (descending for `Down`)
    notes: Vec<MidiTrigger>,
    /// Remaining life, in base steps, of notes that came with a duration
    note_to_duration: BTreeMap<i32, f64>,
    index: usize,
    repeat_index: u32,
    current_octave: u32,
    cache: StepCache,
}

impl ArpEffect {
    /// Create an enabled arpeggiator
    pub fn new(mut config: ArpConfig) -> Self {
        config.octaves = config.octaves.min(MAX_OCTAVES);
        let mut arp = Self {
            enabled: true,
            config,
            notes: Vec::new(),
            note_to_duration: BTreeMap::new(),
            index: 0,
            repeat_index: 0,
            current_octave: 0,
            cache: StepCache::new(),
        };
        arp.clear();
        arp
    }

    /// Build from an effect config
    pub fn from_config(config: &EffectConfig) -> Result<Self> {
        let mut arp = Self::new(ArpConfig::from_effect_config(config)?);
        arp.enabled = config.enabled;
        Ok(arp)
    }

    pub fn config(&self) -> &ArpConfig {
        &self.config
    }

    /// Pitches of the held chord in play order
    pub fn held_pitches(&self) -> Vec<i32> {
        self.notes.iter().map(MidiTrigger::pitch).collect()
    }

    /// Remaining life of a held note, if it came with a duration
    pub fn remaining_duration(&self, transpose: i32) -> Option<f64> {
        self.note_to_duration.get(&transpose).copied()
    }

    pub fn current_octave(&self) -> u32 {
        self.current_octave
    }

    fn sort_notes(&mut self) {
        self.notes.sort_by_key(MidiTrigger::pitch);
        if self.config.direction == ArpDirection::Down {
            self.notes.reverse();
        }
    }

    /// Advance the cursor and return the next note to sound, or `None`
    /// when no chord is held.
    ///
    /// The note keeps the held note's parameters, is shifted by
    /// `12 * current_octave` and lasts `defaults.duration * duration_factor`.
    /// It lives in a cache slot that a later call will overwrite.
    pub fn next_note(&mut self, octaves: u32, defaults: &TrackDefaults) -> Option<&MidiTrigger> {
        self.stage_next(octaves, defaults).map(|slot| &*slot)
    }

    fn stage_next(&mut self, octaves: u32, defaults: &TrackDefaults) -> Option<&mut MidiTrigger> {
        if self.notes.is_empty() {
            return None;
        }
        debug_assert!(self.index < self.notes.len(), "arp cursor past held chord");

        let octaves = octaves.min(MAX_OCTAVES);
        let held = self.index;
        let pitch = self.notes[held].pitch().saturating_add(12 * self.current_octave as i32);

        self.repeat_index += 1;
        if self.repeat_index >= self.config.repeat.max(1) {
            self.repeat_index = 0;
            self.index += 1;
        }
        if self.index >= self.notes.len() {
            self.index = 0;
            self.current_octave = match self.config.direction {
                ArpDirection::Up => (self.current_octave + 1) % (octaves + 1),
                // one octave down, wrapping from 0 to the top octave
                ArpDirection::Down => (self.current_octave + octaves) % (octaves + 1),
            };
        }

        let duration = defaults.duration * self.config.duration_factor;
        Some(self.cache.stage(&self.notes[held], pitch, Some(duration)))
    }

    /// Count down every timed note by one step and release the expired ones
    fn age_notes(&mut self) {
        let mut expired = Vec::new();
        self.note_to_duration.retain(|&pitch, remaining| {
            *remaining -= 1.0;
            if *remaining <= 0.0 {
                expired.push(pitch);
                false
            } else {
                true
            }
        });
        for pitch in expired {
            self.remove_note(pitch);
        }

        if self.note_to_duration.is_empty() && self.notes.is_empty() {
            self.clear();
        }
    }
}

impl Default for ArpEffect {
    fn default() -> Self {
        Self::new(ArpConfig::default())
    }
}

impl MidiEffect for ArpEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Arpeggiator
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_real_time(&self) -> bool {
        false
    }

    fn input(&mut self, trigger: &MidiTrigger) {
        let pitch = trigger.pitch();

        // Retriggering a held note extends its life rather than resetting it
        if let Some(duration) = trigger.step_data.duration {
            *self.note_to_duration.entry(pitch).or_insert(0.0) += duration * 2.0;
        }

        if !self.notes.iter().any(|note| note.pitch() == pitch) {
            self.notes.push(trigger.clone());
            self.sort_notes();
        }
    }

    fn output(&mut self, step: Option<u64>, defaults: &TrackDefaults) -> &[MidiTrigger] {
        let Some(step) = step else {
            return &[];
        };

        let times = get_trigger_times(step, &self.config.rate);
        if times.len() > self.cache.capacity() {
            warn!(
                rate = %self.config.rate,
                ticks = times.len(),
                "arp rate outruns the trigger cache, dropping ticks"
            );
        }

        self.cache.begin_batch();
        for tick in times.iter().take(CACHE_SIZE) {
            if let Some(slot) = self.stage_next(self.config.octaves, defaults) {
                slot.time = Some(tick.time);
                slot.step_number = Some(step);
            }
        }

        self.age_notes();
        self.cache.batch()
    }

    fn add_note(&mut self, transpose: i32, defaults: &TrackDefaults) {
        let mut step_data = StepData::note(transpose).resolve(defaults);
        step_data.duration = None;
        self.input(&MidiTrigger::live(step_data));
    }

    fn remove_note(&mut self, transpose: i32) {
        if let Some(position) = self.notes.iter().position(|note| note.pitch() == transpose) {
            self.notes.remove(position);
        }

        if self.index >= self.notes.len() {
            self.index = 0;
            self.current_octave = 0;
        }

        if self.notes.is_empty() {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.notes.clear();
        self.note_to_duration.clear();
        self.repeat_index = 0;
        self.index = 0;
        self.current_octave = match self.config.direction {
            ArpDirection::Up => 0,
            ArpDirection::Down => self.config.octaves,
        };
    }

    fn set_param(&mut self, id: &str, value: &ParamValue) -> Result<()> {
        if id == "enabled" {
            self.enabled = value
                .as_bool()
                .ok_or_else(|| invalid(id, value, "a boolean"))?;
            return Ok(());
        }

        let direction = self.config.direction;
        self.config.set_param(id, value)?;
        if self.config.direction != direction {
            self.sort_notes();
        }
        if self.current_octave > self.config.octaves {
            self.current_octave = 0;
        }
        Ok(())
    }

    fn to_config(&self) -> EffectConfig {
        EffectConfig {
            name: self.name().to_string(),
            enabled: self.enabled,
            params: self.config.params(),
        }
    }
}
