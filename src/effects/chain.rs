// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Ordered chain of MIDI effects for one track.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{effect_from_config, MidiEffect};
use crate::config::{EffectConfig, ParamValue};
use crate::error::{EngineError, Result};
use crate::sequencer::{MidiTrigger, StepData, TrackDefaults, TrackId};
use crate::timing::StepTime;

/// Receiver for notes played live, outside the step schedule
pub trait LiveSink {
    /// A live note starts sounding
    fn begin_live_trigger(&mut self, track: TrackId, step_data: &StepData);

    /// A live note stops sounding
    fn release_live_trigger(&mut self, track: TrackId, transpose: i32);
}

/// A recorded live-path call
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Begin { track: TrackId, step_data: StepData },
    Release { track: TrackId, transpose: i32 },
}

impl LiveSink for Vec<LiveEvent> {
    fn begin_live_trigger(&mut self, track: TrackId, step_data: &StepData) {
        self.push(LiveEvent::Begin {
            track,
            step_data: step_data.clone(),
        });
    }

    fn release_live_trigger(&mut self, track: TrackId, transpose: i32) {
        self.push(LiveEvent::Release { track, transpose });
    }
}

/// Feed `input` through every enabled effect in order. Disabled effects
/// pass their input through untouched.
///
/// Each effect reads the previous effect's buffer in place; the result
/// borrows either `input` or the last enabled effect.
fn run_effects<'a>(
    effects: &'a mut [Box<dyn MidiEffect>],
    input: &'a [MidiTrigger],
    step: Option<u64>,
    defaults: &TrackDefaults,
) -> &'a [MidiTrigger] {
    let mut triggers = input;
    for effect in effects.iter_mut().filter(|effect| effect.is_enabled()) {
        for trigger in triggers {
            effect.input(trigger);
        }
        triggers = effect.output(step, defaults);
    }
    triggers
}

/// Effects applied to one track's notes, in processing order
#[derive(Debug)]
pub struct MidiEffectsChain {
    track: TrackId,
    effects: Vec<Box<dyn MidiEffect>>,
    /// Triggers fed in for the current step
    inputed_triggers: Vec<MidiTrigger>,
    /// What each live note became after the chain, for releasing it later
    note_to_triggers: HashMap<i32, Vec<MidiTrigger>>,
}

impl MidiEffectsChain {
    /// Create an empty chain, which passes every note through
    pub fn new(track: TrackId) -> Self {
        Self {
            track,
            effects: Vec::new(),
            inputed_triggers: Vec::new(),
            note_to_triggers: HashMap::new(),
        }
    }

    /// Build a chain from effect configs, skipping any that cannot be built
    pub fn from_config(track: TrackId, configs: &[EffectConfig]) -> Self {
        let mut chain = Self::new(track);
        for effect in configs.iter().filter_map(effect_from_config) {
            chain.add_effect(effect);
        }
        debug!(
            track,
            loaded = chain.effects.len(),
            configured = configs.len(),
            "built midi effects chain"
        );
        chain
    }

    /// Current configuration of every effect, in order
    pub fn to_config(&self) -> Vec<EffectConfig> {
        self.effects.iter().map(|effect| effect.to_config()).collect()
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    /// Append an effect to the end of the chain
    pub fn add_effect(&mut self, effect: Box<dyn MidiEffect>) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Box<dyn MidiEffect>] {
        &self.effects
    }

    pub fn effect_mut(&mut self, index: usize) -> Option<&mut Box<dyn MidiEffect>> {
        self.effects.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Queue a resolved step for the current step's processing
    pub fn input(&mut self, step_data: StepData, time: StepTime, current_step: u64) {
        debug_assert!(step_data.is_resolved(), "unresolved step fed to effects chain");
        self.inputed_triggers
            .push(MidiTrigger::new(step_data, time, current_step));
    }

    /// Triggers queued for the current step
    pub fn inputed_triggers(&self) -> &[MidiTrigger] {
        &self.inputed_triggers
    }

    /// Run this step's triggers through the chain and return what comes out.
    ///
    /// The result is only valid until the chain is next used.
    pub fn output(&mut self, step: u64, defaults: &TrackDefaults) -> &[MidiTrigger] {
        run_effects(&mut self.effects, &self.inputed_triggers, Some(step), defaults)
    }

    /// Play a note live.
    ///
    /// A real-time chain sounds it immediately and remembers what it became;
    /// otherwise the note is held by the chain's sequencing effect until the
    /// next scheduled step.
    pub fn live_input_trigger(
        &mut self,
        step_data: StepData,
        defaults: &TrackDefaults,
        sink: &mut dyn LiveSink,
    ) {
        let transpose = step_data.pitch();
        if self.is_real_time() {
            let live = [MidiTrigger::live(step_data)];
            let triggers = run_effects(&mut self.effects, &live, None, defaults).to_vec();
            for trigger in &triggers {
                sink.begin_live_trigger(self.track, &trigger.step_data);
            }
            self.note_to_triggers.insert(transpose, triggers);
        } else {
            self.add_note(transpose, defaults);
        }
    }

    /// Release a live note
    pub fn live_input_release(&mut self, transpose: i32, sink: &mut dyn LiveSink) {
        // A note that sounded immediately is released even if the chain
        // stopped being real-time while it was held
        if let Some(triggers) = self.note_to_triggers.remove(&transpose) {
            for trigger in &triggers {
                sink.release_live_trigger(self.track, trigger.pitch());
            }
        }
        if !self.is_real_time() {
            self.remove_note(transpose);
        }
    }

    /// Hold a note in the first enabled effect that sequences notes itself
    pub fn add_note(&mut self, transpose: i32, defaults: &TrackDefaults) {
        match self
            .effects
            .iter_mut()
            .find(|effect| effect.is_enabled() && !effect.is_real_time())
        {
            Some(effect) => effect.add_note(transpose, defaults),
            None => trace!(track = self.track, transpose, "no effect holds live notes"),
        }
    }

    /// Release a held note from every effect
    pub fn remove_note(&mut self, transpose: i32) {
        for effect in &mut self.effects {
            effect.remove_note(transpose);
        }
    }

    /// Whether every enabled effect sounds notes immediately
    pub fn is_real_time(&self) -> bool {
        self.effects
            .iter()
            .filter(|effect| effect.is_enabled())
            .all(|effect| effect.is_real_time())
    }

    /// Whether the chain holds an effect that sequences notes itself, in
    /// which case scheduling should happen as late as possible to catch
    /// last-moment live notes. Disabled effects count.
    pub fn is_live_real_time(&self) -> bool {
        self.effects.iter().any(|effect| !effect.is_real_time())
    }

    /// Start a new step; must run before any `input` for that step
    pub fn on_new_step(&mut self) {
        self.inputed_triggers.clear();
    }

    /// Reset every effect, e.g. when the transport (re)starts
    pub fn clear(&mut self) {
        for effect in &mut self.effects {
            effect.clear();
        }
    }

    /// Set a parameter on every effect that owns it
    pub fn set_param(&mut self, id: &str, value: &ParamValue) -> Result<()> {
        let mut applied = false;
        for effect in &mut self.effects {
            match effect.set_param(id, value) {
                Ok(()) => applied = true,
                Err(EngineError::UnknownParameter(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if applied {
            Ok(())
        } else {
            Err(EngineError::UnknownParameter(id.to_string()))
        }
    }
}
