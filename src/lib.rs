// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Step-sequencer trigger scheduling.
//!
//! On every transport step the engine resolves each track's programmed
//! steps against the track defaults, runs the resulting notes through the
//! track's MIDI effects chain and emits the triggers that should sound.

pub mod config;
pub mod effects;
pub mod error;
pub mod sequencer;
pub mod timing;

pub use config::{EffectConfig, ParamValue, SessionFile};
pub use effects::{ArpEffect, LiveSink, MidiEffect, MidiEffectsChain};
pub use error::{EngineError, Result};
pub use sequencer::{Command, Scheduler, StepData, TrackDefaults, TriggerCommand};
pub use timing::{get_trigger_times, Resolution, StepTime, BASE_RESOLUTION};
