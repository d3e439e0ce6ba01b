// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-step note parameters and their resolution against track defaults.
//!
//! A step read from pattern storage leaves most parameters unset, meaning
//! "use the track's value". Before a step reaches the effects chain it is
//! copied and every unset parameter is filled from the owning track's
//! `TrackDefaults`. The pattern's own copy is never modified.

use std::collections::BTreeMap;
use std::iter;

use serde::{Deserialize, Serialize};

use crate::config::ParamValue;
use crate::error::{EngineError, Result};

/// Performance parameters of one potential note event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepData {
    /// Whether the step sounds at all
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<bool>,
    /// Pitch offset in semitones, also the note's identity in held chords
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transpose: Option<i32>,
    /// Length in base steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chop: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chop_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<u32>,
    /// Never inherited; an unset panning stays unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_sustain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_release: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monophonic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_recording: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_automations: Option<BTreeMap<String, ParamValue>>,
    /// Sibling notes sounding together with this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub polyphonic_steps: Vec<StepData>,
}

impl StepData {
    /// A step that sounds at the given pitch with everything else inherited
    pub fn note(transpose: i32) -> Self {
        Self {
            on: true,
            transpose: Some(transpose),
            ..Default::default()
        }
    }

    /// Add a polyphonic sibling
    pub fn with_polyphonic(mut self, step: StepData) -> Self {
        self.polyphonic_steps.push(step);
        self
    }

    /// Copy of this step with every unset parameter taken from `defaults`,
    /// applied to each polyphonic sibling as well
    pub fn resolve(&self, defaults: &TrackDefaults) -> StepData {
        let mut resolved = StepData::default();
        resolved.copy_voice_from(self);
        resolved.inherit(defaults);
        resolved.polyphonic_steps = self
            .polyphonic_steps
            .iter()
            .map(|step| step.resolve(defaults))
            .collect();
        resolved
    }

    fn inherit(&mut self, defaults: &TrackDefaults) {
        self.reverse = self.reverse.or(Some(defaults.reverse));
        self.transpose = self.transpose.or(Some(defaults.transpose));
        self.duration = self.duration.or(Some(defaults.duration));
        self.velocity = self.velocity.or(Some(defaults.velocity));
        self.chop = self.chop.or(Some(defaults.chop));
        self.chop_duration = self.chop_duration.or(Some(defaults.chop_duration));
        self.attack = self.attack.or(Some(defaults.attack));
        self.release = self.release.or(Some(defaults.release));
        self.slice = self.slice.or(Some(defaults.slice));
        self.pitch_attack = self.pitch_attack.or(Some(defaults.pitch_attack));
        self.pitch_decay = self.pitch_decay.or(Some(defaults.pitch_decay));
        self.pitch_sustain = self.pitch_sustain.or(Some(defaults.pitch_sustain));
        self.pitch_release = self.pitch_release.or(Some(defaults.pitch_release));
        self.monophonic = self.monophonic.or(Some(defaults.monophonic));
    }

    /// Whether every inheritable parameter has a value
    pub fn is_resolved(&self) -> bool {
        self.reverse.is_some()
            && self.transpose.is_some()
            && self.duration.is_some()
            && self.velocity.is_some()
            && self.chop.is_some()
            && self.chop_duration.is_some()
            && self.attack.is_some()
            && self.release.is_some()
            && self.slice.is_some()
            && self.pitch_attack.is_some()
            && self.pitch_decay.is_some()
            && self.pitch_sustain.is_some()
            && self.pitch_release.is_some()
            && self.monophonic.is_some()
    }

    /// The primary voice followed by each polyphonic sibling
    pub fn voices(&self) -> impl Iterator<Item = &StepData> {
        iter::once(self).chain(self.polyphonic_steps.iter())
    }

    /// Flatten into one standalone step per voice
    pub fn expand(&self) -> Vec<StepData> {
        self.voices()
            .map(|voice| {
                let mut single = StepData::default();
                single.copy_voice_from(voice);
                single
            })
            .collect()
    }

    /// Overwrite this step's parameters with `source`'s, leaving it without
    /// polyphonic siblings. Existing allocations are reused.
    pub fn copy_voice_from(&mut self, source: &StepData) {
        self.on = source.on;
        self.reverse = source.reverse;
        self.transpose = source.transpose;
        self.duration = source.duration;
        self.velocity = source.velocity;
        self.chop = source.chop;
        self.chop_duration = source.chop_duration;
        self.attack = source.attack;
        self.release = source.release;
        self.slice = source.slice;
        self.panning = source.panning;
        self.pitch_attack = source.pitch_attack;
        self.pitch_decay = source.pitch_decay;
        self.pitch_sustain = source.pitch_sustain;
        self.pitch_release = source.pitch_release;
        self.monophonic = source.monophonic;
        self.selected_recording = source.selected_recording;
        self.effect_automations.clone_from(&source.effect_automations);
        self.polyphonic_steps.clear();
    }

    /// Pitch of the step, treating an unset transpose as the root
    pub fn pitch(&self) -> i32 {
        self.transpose.unwrap_or(0)
    }
}

/// A track's parameter values, used wherever a step leaves one unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackDefaults {
    pub reverse: bool,
    pub transpose: i32,
    /// Note length in base steps
    pub duration: f64,
    pub velocity: f64,
    pub chop: u32,
    pub chop_duration: f64,
    pub attack: f64,
    pub release: f64,
    pub slice: u32,
    pub pitch_attack: f64,
    pub pitch_decay: f64,
    pub pitch_sustain: f64,
    pub pitch_release: f64,
    pub monophonic: bool,
}

impl Default for TrackDefaults {
    fn default() -> Self {
        Self {
            reverse: false,
            transpose: 0,
            duration: 1.0,
            velocity: 1.0,
            chop: 0,
            chop_duration: 1.0,
            attack: 0.0,
            release: 0.0,
            slice: 0,
            pitch_attack: 0.0,
            pitch_decay: 0.0,
            pitch_sustain: 1.0,
            pitch_release: 0.0,
            monophonic: false,
        }
    }
}

impl TrackDefaults {
    /// Set a default by its parameter id.
    ///
    /// Returns `UnknownParameter` for ids that are not track defaults so the
    /// caller can try other owners.
    pub fn set_param(&mut self, id: &str, value: &ParamValue) -> Result<()> {
        let float = || {
            value.as_f64().ok_or_else(|| EngineError::InvalidParameter {
                id: id.to_string(),
                reason: format!("expected a number, got {:?}", value),
            })
        };
        let int = || {
            value
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| EngineError::InvalidParameter {
                    id: id.to_string(),
                    reason: format!("expected a non-negative integer, got {:?}", value),
                })
        };
        let flag = || {
            value.as_bool().ok_or_else(|| EngineError::InvalidParameter {
                id: id.to_string(),
                reason: format!("expected a boolean, got {:?}", value),
            })
        };

        match id {
            "reverse" => self.reverse = flag()?,
            "transpose" => {
                self.transpose = value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| EngineError::InvalidParameter {
                        id: id.to_string(),
                        reason: format!("expected an integer, got {:?}", value),
                    })?
            }
            "duration" => self.duration = float()?,
            "velocity" => self.velocity = float()?,
            "chop" => self.chop = int()?,
            "chopDuration" => self.chop_duration = float()?,
            "attack" => self.attack = float()?,
            "release" => self.release = float()?,
            "slice" => self.slice = int()?,
            "pitchAttack" => self.pitch_attack = float()?,
            "pitchDecay" => self.pitch_decay = float()?,
            "pitchSustain" => self.pitch_sustain = float()?,
            "pitchRelease" => self.pitch_release = float()?,
            "monophonic" => self.monophonic = flag()?,
            _ => return Err(EngineError::UnknownParameter(id.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> TrackDefaults {
        TrackDefaults {
            transpose: 3,
            duration: 4.0,
            velocity: 0.8,
            release: 0.25,
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_fields_inherit() {
        let raw = StepData {
            on: true,
            velocity: Some(0.5),
            ..Default::default()
        };
        let resolved = raw.resolve(&defaults());

        assert!(resolved.is_resolved());
        assert_eq!(resolved.velocity, Some(0.5));
        assert_eq!(resolved.transpose, Some(3));
        assert_eq!(resolved.duration, Some(4.0));
        assert_eq!(resolved.release, Some(0.25));
        assert_eq!(resolved.pitch_sustain, Some(1.0));
    }

    #[test]
    fn test_release_is_copied() {
        let raw = StepData {
            on: true,
            release: Some(0.9),
            ..Default::default()
        };
        assert_eq!(raw.resolve(&defaults()).release, Some(0.9));

        let mut slot = StepData::default();
        slot.copy_voice_from(&raw);
        assert_eq!(slot.release, Some(0.9));
    }

    #[test]
    fn test_pass_through_fields() {
        let raw = StepData::note(0);
        let resolved = raw.resolve(&defaults());
        assert_eq!(resolved.panning, None);
        assert_eq!(resolved.selected_recording, None);
        assert_eq!(resolved.effect_automations, None);

        let panned = StepData {
            panning: Some(-0.5),
            ..StepData::note(0)
        };
        assert_eq!(panned.resolve(&defaults()).panning, Some(-0.5));
    }

    #[test]
    fn test_resolve_does_not_mutate_source() {
        let raw = StepData::note(7).with_polyphonic(StepData::default());
        let before = raw.clone();
        let _ = raw.resolve(&defaults());
        assert_eq!(raw, before);
        assert_eq!(raw.velocity, None);
    }

    #[test]
    fn test_polyphony_expands_to_all_voices() {
        let raw = StepData::note(0)
            .with_polyphonic(StepData {
                on: true,
                transpose: Some(4),
                velocity: Some(0.3),
                ..Default::default()
            })
            .with_polyphonic(StepData {
                on: false,
                transpose: Some(7),
                ..Default::default()
            });

        let voices = raw.resolve(&defaults()).expand();
        assert_eq!(voices.len(), 3);
        assert!(voices.iter().all(|v| v.is_resolved()));
        assert!(voices.iter().all(|v| v.polyphonic_steps.is_empty()));

        assert_eq!(voices[0].transpose, Some(0));
        assert_eq!(voices[1].transpose, Some(4));
        assert_eq!(voices[2].transpose, Some(7));

        // Each voice inherits independently
        assert_eq!(voices[0].velocity, Some(0.8));
        assert_eq!(voices[1].velocity, Some(0.3));
        assert_eq!(voices[2].velocity, Some(0.8));

        let on: Vec<bool> = voices.iter().map(|v| v.on).collect();
        assert_eq!(on, vec![true, true, false]);
    }

    #[test]
    fn test_copy_voice_drops_siblings() {
        let source = StepData::note(2).with_polyphonic(StepData::note(5));
        let mut slot = StepData::note(9).with_polyphonic(StepData::note(1));
        slot.copy_voice_from(&source);
        assert_eq!(slot.transpose, Some(2));
        assert!(slot.polyphonic_steps.is_empty());
    }

    #[test]
    fn test_set_param() {
        let mut defaults = TrackDefaults::default();
        defaults.set_param("duration", &ParamValue::Float(2.5)).unwrap();
        defaults.set_param("velocity", &ParamValue::Int(1)).unwrap();
        defaults.set_param("transpose", &ParamValue::Int(-12)).unwrap();
        defaults.set_param("monophonic", &ParamValue::Bool(true)).unwrap();
        assert_eq!(defaults.duration, 2.5);
        assert_eq!(defaults.velocity, 1.0);
        assert_eq!(defaults.transpose, -12);
        assert!(defaults.monophonic);

        assert_eq!(
            defaults.set_param("tempo", &ParamValue::Float(1.0)),
            Err(EngineError::UnknownParameter("tempo".to_string()))
        );
        assert!(matches!(
            defaults.set_param("chop", &ParamValue::Int(-1)),
            Err(EngineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_deserialize_raw_step() {
        let yaml = "on: true\ntranspose: 5\npolyphonicSteps:\n  - on: true\n    transpose: 9\n";
        let step: StepData = serde_yaml::from_str(yaml).unwrap();
        assert!(step.on);
        assert_eq!(step.transpose, Some(5));
        assert_eq!(step.velocity, None);
        assert_eq!(step.polyphonic_steps.len(), 1);
    }
}
