// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the scheduling engine.

use thiserror::Error;

use crate::sequencer::{PatternId, TrackId};

/// Errors raised while applying inbound commands to the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A command referenced a track the session has never seen
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    /// A command referenced a pattern the track does not own
    #[error("track {track} has no pattern {pattern}")]
    UnknownPattern { track: TrackId, pattern: PatternId },

    /// A parameter update named an id no track or effect understands
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A parameter update carried a value of the wrong shape
    #[error("invalid value for parameter '{id}': {reason}")]
    InvalidParameter { id: String, reason: String },

    /// A resolution with zero steps cannot be used for step conversion
    #[error("invalid resolution 1/{0}")]
    InvalidResolution(u32),
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;
