// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scheduled note events flowing through the effects chain.

use serde::Serialize;

use super::step::StepData;
use crate::timing::StepTime;

/// One note event at effects-chain granularity.
///
/// `time` and `step_number` are `None` for notes played live, which are not
/// tied to any transport step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiTrigger {
    pub step_data: StepData,
    /// Offset within the base step
    pub time: Option<StepTime>,
    pub step_number: Option<u64>,
}

impl MidiTrigger {
    /// A trigger scheduled at `time` within base step `step_number`
    pub fn new(step_data: StepData, time: StepTime, step_number: u64) -> Self {
        Self {
            step_data,
            time: Some(time),
            step_number: Some(step_number),
        }
    }

    /// A trigger from live input
    pub fn live(step_data: StepData) -> Self {
        Self {
            step_data,
            time: None,
            step_number: None,
        }
    }

    /// Pitch used to identify the note in held chords
    pub fn pitch(&self) -> i32 {
        self.step_data.pitch()
    }

    pub fn is_live(&self) -> bool {
        self.step_number.is_none()
    }
}
