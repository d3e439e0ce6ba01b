// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for STEPSEQ
//!
//! These tests drive the public API end to end: session files become
//! commands, commands become scheduler state, and scheduled steps become
//! triggers.

use std::collections::BTreeMap;
use std::fs;

use stepseq::effects::{ArpConfig, ArpDirection, LiveEvent};
use stepseq::sequencer::BucketEntry;
use stepseq::{
    get_trigger_times, ArpEffect, Command, EffectConfig, MidiEffect, MidiEffectsChain, ParamValue,
    Resolution, Scheduler, SessionFile, StepData, StepTime, TrackDefaults, TriggerCommand,
    BASE_RESOLUTION,
};

const ARP_SESSION: &str = r#"
transport:
  pattern: 0
  steps: 8
tracks:
  - id: 0
    defaults:
      duration: 2
      velocity: 0.8
    effects:
      - name: Flanger
        enabled: true
      - name: Arpeggiator
        enabled: true
        arpRate: "1/16"
        arpOctaves: 1
        arpDirection: UP
        arpDurationFactor: 0.5
    patterns:
      - id: 0
        length: 8
        cells:
          - step: 0
            entries:
              - time: 0
                data:
                  on: true
                  transpose: 0
                  duration: 8
                  polyphonicSteps:
                    - on: true
                      transpose: 4
                      duration: 8
                    - on: true
                      transpose: 7
                      duration: 8
          - step: 1
            entries: [{ data: { on: false } }]
          - step: 2
            entries: [{ data: { on: false } }]
          - step: 3
            entries: [{ data: { on: false } }]
          - step: 4
            entries: [{ data: { on: false } }]
          - step: 5
            entries: [{ data: { on: false } }]
          - step: 6
            entries: [{ data: { on: false } }]
          - step: 7
            entries: [{ data: { on: false } }]
"#;

/// A bucket on every step that only fires automations
fn rest_cells(steps: std::ops::Range<u64>) -> BTreeMap<u64, Vec<BucketEntry>> {
    steps
        .map(|step| (step, vec![BucketEntry::new(StepTime::ZERO, StepData::default())]))
        .collect()
}

/// (step, pitch, offset) of every note leaving a track
fn notes(triggers: &[TriggerCommand]) -> Vec<(u64, i32, StepTime)> {
    triggers
        .iter()
        .filter_map(|t| match t {
            TriggerCommand::TriggerTrack { step, trigger, .. } => Some((
                *step,
                trigger.pitch(),
                trigger.time.unwrap_or(StepTime::ZERO),
            )),
            _ => None,
        })
        .collect()
}

fn scheduler_for(session: &SessionFile) -> Scheduler {
    let mut scheduler = Scheduler::new();
    scheduler.apply_all(session.to_commands()).unwrap();
    scheduler.apply(Command::Start).unwrap();
    scheduler
}

fn run(scheduler: &mut Scheduler, steps: std::ops::Range<u64>, pattern: u32) -> Vec<TriggerCommand> {
    steps
        .flat_map(|step| {
            scheduler
                .apply(Command::ScheduleTrackTriggers { step, pattern })
                .unwrap()
        })
        .collect()
}

/// A chord held by a 1/16 arpeggiator plays one note every other base step,
/// climbing through the octave
#[test]
fn test_arpeggiated_chord_from_session() {
    let session = SessionFile::from_yaml(ARP_SESSION).unwrap();
    let mut scheduler = scheduler_for(&session);

    // the unknown effect was skipped, the arpeggiator still loaded
    assert_eq!(scheduler.session().track(0).unwrap().chain().len(), 1);

    let triggers = run(&mut scheduler, 0..8, 0);
    let played: Vec<(u64, i32)> = notes(&triggers).iter().map(|n| (n.0, n.1)).collect();
    assert_eq!(played, vec![(0, 0), (2, 4), (4, 7), (6, 12)]);

    let automations = triggers
        .iter()
        .filter(|t| matches!(t, TriggerCommand::TriggerAutomations { .. }))
        .count();
    assert_eq!(automations, 8);

    // arp notes use the track duration scaled by the duration factor
    for trigger in &triggers {
        if let TriggerCommand::TriggerTrack { trigger, .. } = trigger {
            assert_eq!(trigger.step_data.duration, Some(1.0));
            assert_eq!(trigger.step_data.velocity, Some(0.8));
        }
    }
}

/// The same session written as TOML schedules identically
#[test]
fn test_toml_session_matches_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = SessionFile::from_yaml(ARP_SESSION).unwrap();

    let toml_path = dir.path().join("session.toml");
    fs::write(&toml_path, toml::to_string(&yaml).unwrap()).unwrap();
    let toml = SessionFile::load(&toml_path).unwrap();
    assert_eq!(toml, yaml);

    let yaml_path = dir.path().join("session.yaml");
    yaml.save(&yaml_path).unwrap();
    let reloaded = SessionFile::load(&yaml_path).unwrap();

    let a = run(&mut scheduler_for(&toml), 0..16, 0);
    let b = run(&mut scheduler_for(&reloaded), 0..16, 0);
    assert_eq!(a, b);
}

/// A 1/64 arpeggiator emits two notes per base step, half a step apart
#[test]
fn test_fast_arpeggio_two_ticks_per_step() {
    let mut scheduler = Scheduler::new();
    scheduler
        .apply(Command::MidiEffectsUpdate {
            track: 1,
            effects: vec![EffectConfig::new("Arpeggiator", true)
                .with_param("arpRate", ParamValue::String("1/64".into()))],
        })
        .unwrap();
    scheduler
        .apply(Command::PatternUpdate {
            track: 1,
            pattern: 0,
            matrix: BTreeMap::new(),
            pattern_length: 4,
        })
        .unwrap();

    let mut sink: Vec<LiveEvent> = Vec::new();
    for pitch in [0, 3, 7] {
        scheduler.live_trigger(1, StepData::note(pitch), &mut sink).unwrap();
    }
    // held by the arpeggiator rather than played immediately
    assert!(sink.is_empty());

    // empty buckets produce no output, but the arpeggio still advances
    assert!(run(&mut scheduler, 0..1, 0).is_empty());

    let chord_step = BTreeMap::from([(
        1,
        vec![BucketEntry::new(
            StepTime::ZERO,
            StepData {
                on: false,
                ..Default::default()
            },
        )],
    )]);
    scheduler
        .apply(Command::PatternUpdate {
            track: 1,
            pattern: 0,
            matrix: chord_step,
            pattern_length: 4,
        })
        .unwrap();

    let triggers = run(&mut scheduler, 1..2, 0);
    assert_eq!(
        notes(&triggers),
        vec![(1, 7, StepTime::ZERO), (1, 0, StepTime::new(1, 2))]
    );

    for pitch in [0, 3, 7] {
        scheduler.live_release(1, pitch, &mut sink).unwrap();
    }
    assert!(sink.is_empty());
    assert!(notes(&run(&mut scheduler, 1..2, 0)).is_empty());
}

/// Steps without a bucket emit nothing, but the arpeggio keeps moving
#[test]
fn test_steps_without_bucket_advance_silently() {
    let session = SessionFile::from_yaml(ARP_SESSION).unwrap();
    let mut scheduler = scheduler_for(&session);
    let full = session.tracks[0].patterns[0].matrix();
    let sparse: BTreeMap<u64, Vec<BucketEntry>> = full
        .iter()
        .filter(|(step, _)| **step == 0)
        .map(|(step, entries)| (*step, entries.clone()))
        .collect();

    let update = |matrix: BTreeMap<u64, Vec<BucketEntry>>| Command::PatternUpdate {
        track: 0,
        pattern: 0,
        matrix,
        pattern_length: 8,
    };

    scheduler.apply(update(sparse)).unwrap();
    let triggers = run(&mut scheduler, 0..4, 0);
    let played: Vec<(u64, i32)> = notes(&triggers).iter().map(|n| (n.0, n.1)).collect();
    assert_eq!(played, vec![(0, 0)]);
    assert_eq!(triggers.len(), 2);

    // step 2 consumed the 4 without emitting it
    scheduler.apply(update(full)).unwrap();
    let played: Vec<(u64, i32)> = notes(&run(&mut scheduler, 4..8, 0))
        .iter()
        .map(|n| (n.0, n.1))
        .collect();
    assert_eq!(played, vec![(4, 7), (6, 12)]);
}

/// A scheduled note of duration d keeps sounding for 2d base steps
#[test]
fn test_scheduled_note_expires() {
    let mut scheduler = Scheduler::new();
    scheduler
        .apply(Command::MidiEffectsUpdate {
            track: 0,
            effects: vec![EffectConfig::new("Arpeggiator", true).with_param(
                "arpRate",
                ParamValue::Map(BTreeMap::from([
                    ("resolution".to_string(), ParamValue::Int(32)),
                    ("isTriplet".to_string(), ParamValue::Bool(false)),
                ])),
            )],
        })
        .unwrap();
    scheduler
        .apply(Command::PatternUpdate {
            track: 0,
            pattern: 0,
            matrix: {
                let mut matrix = rest_cells(1..16);
                matrix.insert(
                    0,
                    vec![BucketEntry::new(
                        StepTime::ZERO,
                        StepData {
                            duration: Some(1.5),
                            ..StepData::note(5)
                        },
                    )],
                );
                matrix
            },
            pattern_length: 16,
        })
        .unwrap();

    let played: Vec<u64> = notes(&run(&mut scheduler, 0..8, 0))
        .iter()
        .map(|n| n.0)
        .collect();
    assert_eq!(played, vec![0, 1, 2]);
}

/// Track-level parameter updates reach the arpeggiator between steps
#[test]
fn test_parameter_update_between_steps() {
    let session = SessionFile::from_yaml(ARP_SESSION).unwrap();
    let mut scheduler = scheduler_for(&session);

    run(&mut scheduler, 0..1, 0);
    scheduler
        .apply(Command::ParameterUpdate {
            track: Some(0),
            id: "arpDirection".into(),
            value: ParamValue::String("DOWN".into()),
        })
        .unwrap();
    scheduler
        .apply(Command::ParameterUpdate {
            track: Some(0),
            id: "arpOctaves".into(),
            value: ParamValue::Int(0),
        })
        .unwrap();

    let played: Vec<i32> = notes(&run(&mut scheduler, 1..8, 0))
        .iter()
        .map(|n| n.1)
        .collect();
    assert_eq!(played, vec![4, 0, 7]);
}

/// Without effects every "on" voice passes straight through
#[test]
fn test_plain_track_plays_every_voice() {
    let mut scheduler = Scheduler::new();
    let chord = StepData::note(0)
        .with_polyphonic(StepData::note(3))
        .with_polyphonic(StepData {
            on: false,
            transpose: Some(6),
            ..Default::default()
        });
    scheduler
        .apply(Command::PatternUpdate {
            track: 2,
            pattern: 1,
            matrix: BTreeMap::from([
                (0, vec![BucketEntry::new(StepTime::ZERO, chord)]),
                (
                    3,
                    vec![
                        BucketEntry::new(StepTime::ZERO, StepData::note(12)),
                        BucketEntry::new(StepTime::new(1, 2), StepData::note(24)),
                    ],
                ),
            ]),
            pattern_length: 4,
        })
        .unwrap();

    let triggers = run(&mut scheduler, 4..8, 1);
    assert_eq!(
        notes(&triggers),
        vec![
            (0, 0, StepTime::ZERO),
            (0, 3, StepTime::ZERO),
            (3, 12, StepTime::ZERO),
            (3, 24, StepTime::new(1, 2)),
        ]
    );
}

/// Notes played live on a real-time chain are forwarded at once and
/// released with the pitch they became
#[test]
fn test_live_notes_on_real_time_chain() {
    let mut chain = MidiEffectsChain::new(9);
    let mut arp = ArpEffect::new(ArpConfig::default());
    arp.set_enabled(false);
    chain.add_effect(Box::new(arp));
    assert!(chain.is_real_time());

    let defaults = TrackDefaults::default();
    let mut sink: Vec<LiveEvent> = Vec::new();
    chain.live_input_trigger(StepData::note(1).resolve(&defaults), &defaults, &mut sink);
    chain.live_input_release(1, &mut sink);

    assert_eq!(sink.len(), 2);
    assert!(matches!(&sink[0], LiveEvent::Begin { track: 9, step_data } if step_data.transpose == Some(1)));
    assert_eq!(sink[1], LiveEvent::Release { track: 9, transpose: 1 });
}

#[test]
fn test_arp_direction_down_cycles_octaves() {
    let config = ArpConfig {
        octaves: 1,
        direction: ArpDirection::Down,
        ..Default::default()
    };
    let mut arp = ArpEffect::new(config);
    let defaults = TrackDefaults::default();
    for pitch in [0, 4, 7] {
        arp.add_note(pitch, &defaults);
    }
    let pitches: Vec<i32> = (0..9)
        .filter_map(|_| arp.next_note(1, &defaults).map(|t| t.pitch()))
        .collect();
    assert_eq!(pitches, vec![19, 16, 12, 7, 4, 0, 19, 16, 12]);
}

/// Over a long run every tick of every rate is emitted exactly once
#[test]
fn test_trigger_times_cover_every_tick() {
    for (resolution, triplet) in [(4, false), (8, true), (16, false), (16, true), (64, false), (64, true)] {
        let rate = Resolution::new(resolution, triplet).unwrap();
        assert_eq!(rate.triplet_or_non_triplet().triplet_or_non_triplet(), rate);

        let steps = 96u64;
        let ticks: Vec<i64> = (0..steps)
            .flat_map(|step| get_trigger_times(step, &rate))
            .map(|t| t.tick)
            .collect();
        let expected = StepTime::from(steps) * rate.num_steps() / BASE_RESOLUTION.num_steps();
        assert!(expected.is_integer());
        assert_eq!(ticks, (0..expected.floor()).collect::<Vec<_>>());
    }
}
