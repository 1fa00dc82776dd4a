//! Standard MIDI File decoding into timed notes.

use super::{SourceConfig, filter_and_sort};
use crate::model::Note;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;

/// Default tempo when a file carries no tempo events (120 BPM).
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// Zero-based General MIDI percussion channel.
const PERCUSSION_CHANNEL: u8 = 9;

/// Converts absolute ticks to seconds.
#[derive(Debug, Clone)]
enum TickClock {
    /// Metrical timing: ticks per beat plus the merged tempo map as
    /// `(tick, seconds at tick, µs per beat)` segments.
    Metrical {
        ticks_per_beat: f64,
        segments: Vec<(u64, f64, u32)>,
    },
    /// SMPTE timing: a fixed number of ticks per second.
    Timecode { ticks_per_second: f64 },
}

impl TickClock {
    fn new(smf: &Smf) -> Self {
        match smf.header.timing {
            Timing::Metrical(tpb) => {
                let ticks_per_beat = f64::from(tpb.as_int().max(1));
                let mut changes: Vec<(u64, u32)> = Vec::new();
                for track in &smf.tracks {
                    let mut tick: u64 = 0;
                    for event in track {
                        tick += u64::from(event.delta.as_int());
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                            changes.push((tick, tempo.as_int()));
                        }
                    }
                }
                // Stable sort keeps the later event of two at the same tick last
                changes.sort_by_key(|&(tick, _)| tick);

                let mut segments = vec![(0u64, 0.0f64, DEFAULT_USEC_PER_BEAT)];
                for (tick, usec) in changes {
                    let &(seg_tick, seg_secs, seg_usec) = segments.last().unwrap_or(&(0, 0.0, DEFAULT_USEC_PER_BEAT));
                    let secs = seg_secs
                        + (tick - seg_tick) as f64 * f64::from(seg_usec) / 1e6 / ticks_per_beat;
                    if tick == seg_tick {
                        segments.pop();
                    }
                    segments.push((tick, secs, usec));
                }

                Self::Metrical {
                    ticks_per_beat,
                    segments,
                }
            }
            Timing::Timecode(fps, subframes) => Self::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Self::Metrical {
                ticks_per_beat,
                segments,
            } => {
                let idx = segments.partition_point(|&(t, _, _)| t <= tick).saturating_sub(1);
                let (seg_tick, seg_secs, usec) = segments[idx];
                seg_secs + (tick - seg_tick) as f64 * f64::from(usec) / 1e6 / ticks_per_beat
            }
            Self::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }
}

/// Decode MIDI bytes into a filtered, onset-sorted note list.
///
/// NoteOn/NoteOff pairs are matched per channel and key, last in first out;
/// a NoteOn with velocity 0 counts as a NoteOff. Notes still held when a track
/// ends close at the track's final tick. `Note::track` numbers the MIDI tracks
/// that contain notes, in file order.
pub fn notes_from_midi(bytes: &[u8], config: &SourceConfig) -> Result<Vec<Note>, midly::Error> {
    let smf = Smf::parse(bytes)?;
    let clock = TickClock::new(&smf);

    let mut notes = Vec::new();
    let mut instrument = 0;
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        // (channel, key) → stack of (onset tick, velocity)
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut closed: Vec<(u8, u8, u64, u64, u8)> = Vec::new();

        for event in track {
            tick += u64::from(event.delta.as_int());
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let ch = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    pending
                        .entry((ch, key.as_int()))
                        .or_default()
                        .push((tick, vel.as_int()));
                }
                MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                    if let Some((onset, velocity)) = pending
                        .get_mut(&(ch, key.as_int()))
                        .and_then(|stack| stack.pop())
                    {
                        closed.push((ch, key.as_int(), onset, tick, velocity));
                    }
                }
                _ => {}
            }
        }

        for ((ch, key), stack) in pending {
            for (onset, velocity) in stack {
                closed.push((ch, key, onset, tick, velocity));
            }
        }
        if closed.is_empty() {
            continue;
        }
        // HashMap drain order is arbitrary; restore a deterministic order
        closed.sort_by_key(|&(ch, key, onset, _, _)| (onset, key, ch));

        for (ch, key, onset, offset, velocity) in closed {
            if config.skip_percussion && ch == PERCUSSION_CHANNEL {
                continue;
            }
            let start_time = clock.seconds(onset);
            notes.push(Note {
                start_time,
                duration: clock.seconds(offset) - start_time,
                pitch: i32::from(key),
                velocity: i32::from(velocity),
                track: instrument,
            });
        }
        instrument += 1;
    }

    let notes = filter_and_sort(notes, config);
    log::debug!(
        "Decoded {} notes from {} MIDI tracks",
        notes.len(),
        smf.tracks.len()
    );
    Ok(notes)
}
