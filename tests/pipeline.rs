use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use songform::analyzer::{AnalysisConfig, analyze_file, analyze_notes};
use songform::batch::analyze_paths;
use songform::config::AppConfig;
use songform::export::ExportFormat;
use songform::model::{EventKind, MusicStructure, Note};

/// Chords, runs, chords, runs: 8 seconds each.
fn performance() -> Vec<Note> {
    let mut notes = Vec::new();
    for p in 0..4 {
        let offset = p as f64 * 8.0;
        if p % 2 == 0 {
            for beat in 0..8 {
                for pitch in [40, 47, 52] {
                    notes.push(Note {
                        start_time: offset + beat as f64,
                        duration: 0.75,
                        pitch,
                        velocity: 64,
                        track: 0,
                    });
                }
            }
        } else {
            for step in 0..32 {
                notes.push(Note {
                    start_time: offset + step as f64 * 0.25,
                    duration: 0.25,
                    pitch: 72 + (step % 4) * 3,
                    velocity: 100,
                    track: 1,
                });
            }
        }
    }
    notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    notes
}

fn check_structure(structure: &MusicStructure) {
    assert!(!structure.skeleton_sections.is_empty());
    for pair in structure.skeleton_sections.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    for sections in [&structure.skeleton_sections, &structure.ssm_sections] {
        for s in sections.iter() {
            assert!(s.end > s.start);
        }
    }

    // One adjacency entry per characterized section, symmetric, no self loops
    let keys: Vec<usize> = structure.repetition_adjacency.keys().copied().collect();
    assert!(keys.len() <= structure.skeleton_sections.len());
    assert_eq!(keys, (0..keys.len()).collect::<Vec<_>>());
    for (i, related) in &structure.repetition_adjacency {
        assert!(!related.contains(i));
        for j in related {
            assert!(structure.repetition_adjacency[j].contains(i));
        }
    }

    let boundaries = structure
        .salient_events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::SectionStart | EventKind::SectionEnd))
        .count();
    assert_eq!(boundaries, 2 * structure.skeleton_sections.len());
    for pair in structure.salient_events.windows(2) {
        assert!(pair[0].time <= pair[1].time);
    }
}

#[test]
fn analyzes_json_notes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.json");
    let notes = performance();
    std::fs::write(&path, serde_json::to_string(&notes).unwrap()).unwrap();

    let from_file = analyze_file(&path, &AppConfig::default()).unwrap();
    let in_memory = analyze_notes(&notes, &AnalysisConfig::default()).unwrap();
    assert_eq!(from_file, in_memory);
    check_structure(&from_file);
    assert!(from_file.skeleton_sections.len() >= 2);
}

#[test]
fn analyzes_midi_file() {
    let mut track: Vec<TrackEvent<'static>> = vec![TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(500_000u32.into())),
    }];
    // Quarter notes at 120 BPM: a rising scale then a low pedal
    let keys: Vec<u8> = (0..48u8).map(|i| if i < 24 { 60 + i % 12 } else { 36 + i % 3 }).collect();
    for key in keys {
        track.push(TrackEvent {
            delta: 0u32.into(),
            kind: TrackEventKind::Midi {
                channel: 0u8.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: 90u8.into(),
                },
            },
        });
        track.push(TrackEvent {
            delta: 480u32.into(),
            kind: TrackEventKind::Midi {
                channel: 0u8.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0u8.into(),
                },
            },
        });
    }
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(480u16.into())));
    smf.tracks.push(track);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scale.mid");
    std::fs::write(&path, bytes).unwrap();

    let structure = analyze_file(&path, &AppConfig::default()).unwrap();
    check_structure(&structure);
}

#[test]
fn batch_writes_one_file_per_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("takes");
    std::fs::create_dir_all(&input).unwrap();
    let notes = serde_json::to_string(&performance()).unwrap();
    std::fs::write(input.join("first.json"), &notes).unwrap();
    std::fs::write(input.join("second.json"), &notes).unwrap();
    std::fs::write(input.join("empty.json"), "[]").unwrap();

    let out = dir.path().join("results");
    let result = analyze_paths(
        &[input],
        &out,
        ExportFormat::Yaml,
        2,
        &AppConfig::default(),
    )
    .unwrap();
    assert_eq!(result.analyzed, 2);
    assert_eq!(result.failed, 1);

    let first: MusicStructure =
        serde_yaml::from_str(&std::fs::read_to_string(out.join("first.structure.yaml")).unwrap())
            .unwrap();
    let second: MusicStructure =
        serde_yaml::from_str(&std::fs::read_to_string(out.join("second.structure.yaml")).unwrap())
            .unwrap();
    assert_eq!(first, second);
    check_structure(&first);
    assert!(!out.join("empty.structure.yaml").exists());
}
