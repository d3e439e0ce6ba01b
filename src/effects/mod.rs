// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI effects that transform a track's notes before they are emitted.
//!
//! Each track owns a `MidiEffectsChain`; the chain feeds every enabled
//! effect's output into the next effect's input. Effects are stateful and
//! may reorder, delay, repeat or synthesize notes.

pub mod arpeggiator;
pub mod chain;

use std::fmt;

use tracing::warn;

use crate::config::{EffectConfig, ParamValue};
use crate::error::Result;
use crate::sequencer::{MidiTrigger, TrackDefaults};

pub use arpeggiator::{ArpConfig, ArpDirection, ArpEffect, StepCache, CACHE_SIZE, MAX_OCTAVES};
pub use chain::{LiveEvent, LiveSink, MidiEffectsChain};

/// Trait for all MIDI effect implementations
pub trait MidiEffect: Send + fmt::Debug {
    /// Which kind of effect this is
    fn kind(&self) -> EffectKind;

    /// Display name, also used as the config `name`
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn toggle_enabled(&mut self) {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled);
    }

    /// Whether a note passed through this effect sounds immediately.
    ///
    /// Effects that hold notes and emit them on later steps return false.
    fn is_real_time(&self) -> bool {
        true
    }

    /// Accept one trigger for the current step
    fn input(&mut self, trigger: &MidiTrigger);

    /// Produce the triggers for base step `step` (`None` on the live path).
    ///
    /// The slice borrows the effect's own buffer and is overwritten by the
    /// next call; clone anything that must outlive it.
    fn output(&mut self, step: Option<u64>, defaults: &TrackDefaults) -> &[MidiTrigger];

    /// Hold a live note until `remove_note` releases it
    fn add_note(&mut self, transpose: i32, defaults: &TrackDefaults);

    /// Release a held note
    fn remove_note(&mut self, transpose: i32);

    /// Reset all playback state
    ///
    /// Called when the transport starts or the chain is cleared.
    fn clear(&mut self);

    /// Set a parameter by id.
    ///
    /// Returns `UnknownParameter` for ids this effect does not own.
    fn set_param(&mut self, id: &str, value: &ParamValue) -> Result<()>;

    /// Current configuration, suitable for `effect_from_config`
    fn to_config(&self) -> EffectConfig;
}

/// The closed set of effect types the engine can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Arpeggiator,
}

impl EffectKind {
    /// All known effect kinds
    pub const ALL: [EffectKind; 1] = [EffectKind::Arpeggiator];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Arpeggiator => "Arpeggiator",
        }
    }

    /// Look up an effect kind by config name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Build an effect of this kind from its configuration
    pub fn create(self, config: &EffectConfig) -> Result<Box<dyn MidiEffect>> {
        match self {
            EffectKind::Arpeggiator => Ok(Box::new(ArpEffect::from_config(config)?)),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build an effect from its configuration.
///
/// Unknown names and malformed configs yield `None` so that one bad entry
/// never prevents the rest of a chain from loading.
pub fn effect_from_config(config: &EffectConfig) -> Option<Box<dyn MidiEffect>> {
    let Some(kind) = EffectKind::from_name(&config.name) else {
        warn!(name = %config.name, "skipping unknown midi effect");
        return None;
    };
    match kind.create(config) {
        Ok(effect) => Some(effect),
        Err(e) => {
            warn!(name = %config.name, error = %e, "skipping malformed midi effect");
            None
        }
    }
}
