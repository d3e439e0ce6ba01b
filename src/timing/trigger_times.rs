// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sub-step trigger times for resolutions other than the base step.

use super::resolution::{transform_step, Resolution, StepTime, BASE_RESOLUTION};

/// One event of a target resolution that falls inside a base step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime {
    /// Tick index counted in the target resolution
    pub tick: i64,
    /// Offset from the start of the base step, in base steps (`0 <= time < 1`)
    pub time: StepTime,
}

/// Find every tick of `resolution` that occurs within base step `step`.
///
/// The base step covers the half-open span `[step, step + 1)`. A tick that
/// lands exactly on the start is included and one that lands on the end
/// belongs to the following step, so adjacent steps never share a tick.
pub fn get_trigger_times(step: u64, resolution: &Resolution) -> Vec<TriggerTime> {
    let start = StepTime::from(step);
    let min = transform_step(start, resolution, &BASE_RESOLUTION);
    let max = transform_step(start + StepTime::from_integer(1), resolution, &BASE_RESOLUTION);

    (min.ceil()..max.ceil())
        .map(|tick| {
            let at_base = transform_step(StepTime::from_integer(tick), &BASE_RESOLUTION, resolution);
            TriggerTime {
                tick,
                time: at_base - start,
            }
        })
        .collect()
}
