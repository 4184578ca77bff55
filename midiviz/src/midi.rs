use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub start: f32,
    pub end: f32,
    pub key: u8,
    pub velocity: u8,
    pub track: usize,
}

impl Note {
    pub fn is_sounding(&self, time: f32) -> bool {
        self.start <= time && time < self.end
    }
}

/// All notes of a MIDI file on one timeline in seconds.
#[derive(Clone, Debug, Default)]
pub struct Score {
    notes: Vec<Note>,
    duration: f32,
}

impl Score {
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = fs::read(path).map_err(|err| {
            format!("failed to read '{}': {}", path.display(), err)
        })?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let smf = Smf::parse(bytes)
            .map_err(|err| format!("invalid MIDI file: {}", err))?;

        if smf.header.format == Format::Sequential {
            warn!("sequential MIDI files are played as parallel tracks");
        }

        let clock = TickClock::new(&smf)?;
        let mut notes = Vec::new();
        let mut duration = 0.0f32;

        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u64;
            let mut open: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

            for event in track {
                tick += u64::from(event.delta.as_int());

                let TrackEventKind::Midi { channel, message } = event.kind
                else {
                    continue;
                };

                let (key, velocity, on) = match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        (key.as_int(), vel.as_int(), true)
                    }
                    MidiMessage::NoteOn { key, .. }
                    | MidiMessage::NoteOff { key, .. } => {
                        (key.as_int(), 0, false)
                    }
                    _ => continue,
                };

                let slot = open.entry((channel.as_int(), key)).or_default();
                if on {
                    slot.push((tick, velocity));
                } else if !slot.is_empty() {
                    let (start, velocity) = slot.remove(0);
                    notes.push(Note {
                        start: clock.seconds(start),
                        end: clock.seconds(tick),
                        key,
                        velocity,
                        track: track_index,
                    });
                }
            }

            // Anything still held ends with its track.
            for ((_, key), pending) in open {
                for (start, velocity) in pending {
                    notes.push(Note {
                        start: clock.seconds(start),
                        end: clock.seconds(tick),
                        key,
                        velocity,
                        track: track_index,
                    });
                }
            }

            duration = duration.max(clock.seconds(tick));
        }

        notes.sort_by(|a, b| {
            a.start.total_cmp(&b.start).then(a.key.cmp(&b.key))
        });

        debug!(
            "parsed {} notes over {:.2}s in {} tracks",
            notes.len(),
            duration,
            smf.tracks.len()
        );

        Ok(Self { notes, duration })
    }

    pub fn from_notes(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));
        let duration = notes.iter().map(|note| note.end).fold(0.0, f32::max);
        Self { notes, duration }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes overlapping `[from, to)`.
    pub fn window(&self, from: f32, to: f32) -> impl Iterator<Item = &Note> {
        let first = self.notes.partition_point(|note| note.start < to);
        self.notes[..first].iter().filter(move |note| note.end > from)
    }
}

enum TickClock {
    Metrical {
        ticks_per_beat: f64,
        // (tick, seconds at tick, microseconds per beat from tick on)
        segments: Vec<(u64, f64, u32)>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl TickClock {
    fn new(smf: &Smf) -> Result<Self, String> {
        match smf.header.timing {
            Timing::Metrical(ticks) => {
                let ticks_per_beat = f64::from(ticks.as_int());
                if ticks_per_beat == 0.0 {
                    return Err("MIDI file has zero ticks per beat".into());
                }

                let mut changes = Vec::new();
                for track in &smf.tracks {
                    let mut tick = 0u64;
                    for event in track {
                        tick += u64::from(event.delta.as_int());
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) =
                            event.kind
                        {
                            changes.push((tick, tempo.as_int()));
                        }
                    }
                }
                changes.sort_by_key(|(tick, _)| *tick);

                let mut segments = vec![(0u64, 0.0f64, DEFAULT_TEMPO)];
                for (tick, tempo) in changes {
                    let &(last_tick, last_seconds, last_tempo) =
                        segments.last().unwrap_or(&(0, 0.0, DEFAULT_TEMPO));
                    let seconds = last_seconds
                        + (tick - last_tick) as f64 * f64::from(last_tempo)
                            / ticks_per_beat
                            / 1_000_000.0;
                    if tick == last_tick {
                        segments.pop();
                    }
                    segments.push((tick, seconds, tempo));
                }

                Ok(Self::Metrical {
                    ticks_per_beat,
                    segments,
                })
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second =
                    f64::from(fps.as_f32()) * f64::from(subframes);
                if ticks_per_second <= 0.0 {
                    return Err("MIDI file has an invalid timecode".into());
                }
                Ok(Self::Timecode { ticks_per_second })
            }
        }
    }

    fn seconds(&self, tick: u64) -> f32 {
        match self {
            Self::Metrical {
                ticks_per_beat,
                segments,
            } => {
                let index = segments
                    .partition_point(|(start, _, _)| *start <= tick)
                    .saturating_sub(1);
                let (start, seconds, tempo) = segments[index];
                (seconds
                    + (tick - start) as f64 * f64::from(tempo)
                        / ticks_per_beat
                        / 1_000_000.0) as f32
            }
            Self::Timecode { ticks_per_second } => {
                (tick as f64 / ticks_per_second) as f32
            }
        }
    }
}
