// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides musical resolutions, exact step arithmetic and
//! the sub-step trigger time calculation used by the effects.

pub mod resolution;
pub mod trigger_times;

pub use resolution::{transform_step, Resolution, StepTime, BASE_RESOLUTION};
pub use trigger_times::{get_trigger_times, TriggerTime};
