// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for the scheduling engine.
//!
//! This module provides the flexible parameter values carried by inbound
//! updates, effect configurations, and session files that describe tracks,
//! patterns and effect chains on disk.

pub mod watcher;

pub use watcher::{validate_session, SessionEvent, SessionWatcher};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sequencer::{BucketEntry, Command, PatternId, TrackDefaults, TrackId};

/// Value types supported in parameter updates and effect configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<ParamValue>),
    /// Nested key-value pairs (e.g. a resolution)
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(v) => Some(v),
            _ => None,
        }
    }
}

/// Configuration of one effect in a chain: its name, whether it is
/// enabled, and effect-specific fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectConfig {
    /// Effect type name (e.g. "Arpeggiator")
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// Effect-specific parameters as key-value pairs
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl EffectConfig {
    /// Create an empty config for the named effect
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a float parameter with default
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).and_then(ParamValue::as_f64).unwrap_or(default)
    }

    /// Get an integer parameter with default
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.params.get(key).and_then(ParamValue::as_i64).unwrap_or(default)
    }

    /// Get a string parameter with default
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.params
            .get(key)
            .and_then(ParamValue::as_str)
            .unwrap_or(default)
            .to_string()
    }
}

/// Root of a session file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionFile {
    /// What the renderer plays
    #[serde(default)]
    pub transport: TransportConfig,
    /// Global parameter values
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    /// Track definitions
    #[serde(default)]
    pub tracks: Vec<TrackFile>,
}

impl SessionFile {
    /// Load a session from a YAML file, or TOML when the extension says so
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {:?}", path))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Parse a session from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML session")
    }

    /// Parse a session from TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML session")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize session to YAML")
    }

    /// Save session to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write session file: {:?}", path.as_ref()))
    }

    /// The inbound commands that rebuild this session inside a scheduler
    pub fn to_commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        for (id, value) in &self.parameters {
            commands.push(Command::ParameterUpdate {
                track: None,
                id: id.clone(),
                value: value.clone(),
            });
        }

        for track in &self.tracks {
            commands.push(Command::TrackDataUpdate {
                track: track.id,
                track_data: track.defaults.clone(),
            });
            commands.push(Command::MidiEffectsUpdate {
                track: track.id,
                effects: track.effects.clone(),
            });
            for pattern in &track.patterns {
                commands.push(Command::PatternUpdate {
                    track: track.id,
                    pattern: pattern.id,
                    matrix: pattern.matrix(),
                    pattern_length: pattern.length,
                });
            }
            for (id, value) in &track.parameters {
                commands.push(Command::ParameterUpdate {
                    track: Some(track.id),
                    id: id.clone(),
                    value: value.clone(),
                });
            }
        }

        commands
    }
}

/// Which pattern to render and for how long
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default)]
    pub pattern: PatternId,
    /// Number of base steps to render
    #[serde(default = "default_steps")]
    pub steps: u64,
}

fn default_steps() -> u64 {
    32
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pattern: 0,
            steps: default_steps(),
        }
    }
}

/// Track definition in a session file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackFile {
    pub id: TrackId,
    /// Values used wherever a step leaves a parameter unset
    #[serde(default)]
    pub defaults: TrackDefaults,
    /// MIDI effects chain, in processing order
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
    #[serde(default)]
    pub patterns: Vec<PatternFile>,
    /// Track-scoped parameter updates applied after the chain is built
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

/// Pattern definition in a session file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternFile {
    pub id: PatternId,
    /// Pattern length in base steps
    pub length: u64,
    /// Programmed cells; steps without a cell are empty
    #[serde(default)]
    pub cells: Vec<CellFile>,
}

impl PatternFile {
    /// Build the step-keyed trigger matrix
    pub fn matrix(&self) -> BTreeMap<u64, Vec<BucketEntry>> {
        let mut matrix: BTreeMap<u64, Vec<BucketEntry>> = BTreeMap::new();
        for cell in &self.cells {
            matrix
                .entry(cell.step)
                .or_default()
                .extend(cell.entries.iter().cloned());
        }
        matrix
    }
}

/// One programmed step of a pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellFile {
    pub step: u64,
    #[serde(default)]
    pub entries: Vec<BucketEntry>,
}
