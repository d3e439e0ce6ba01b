// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequencer core for scheduling triggers.
//!
//! This module provides the per-step pipeline:
//! - Step data with track-default inheritance and polyphony
//! - Tracks owning patterns and an effects chain
//! - The scheduler that applies inbound commands and emits triggers

pub mod scheduler;
pub mod step;
pub mod track;
pub mod trigger;

pub use scheduler::{Command, Scheduler, Session, TriggerCommand};
pub use step::{StepData, TrackDefaults};
pub use track::{BucketEntry, Pattern, Track};
pub use trigger::MidiTrigger;

/// Track number as used by inbound commands
pub type TrackId = u32;

/// Pattern number within a track
pub type PatternId = u32;
