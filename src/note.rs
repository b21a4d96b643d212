//! note.rs
//!
//! A note is a bounded interval: onset `time` plus `duration`, both in seconds.
//! While a note-on has not been paired with its note-off yet the note is
//! "open" and its duration is zero.

use serde::{Deserialize, Serialize};

use crate::error::{MidiError, Result};
use crate::insert::Timed;
use crate::util::{midi_to_pitch, pitch_to_midi};

/// A pitch as given by a caller: a MIDI number or a name like `"C#4"`.
///
/// Resolved to a MIDI number as soon as it reaches a [`Note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotePitch {
    Midi(u8),
    Name(String),
}

impl NotePitch {
    /// The MIDI note number, validated to 0-127.
    ///
    /// Names may be given in Scientific Pitch Notation or as a plain number.
    pub fn resolve(&self) -> Result<u8> {
        let midi = match self {
            NotePitch::Midi(m) => *m as i32,
            NotePitch::Name(name) => match name.trim().parse::<i32>() {
                Ok(m) => m,
                Err(_) => {
                    pitch_to_midi(name).ok_or_else(|| MidiError::InvalidPitch(name.clone()))?
                }
            },
        };
        u8::try_from(midi)
            .ok()
            .filter(|m| *m <= 127)
            .ok_or(MidiError::PitchOutOfRange(midi))
    }
}

impl From<u8> for NotePitch {
    fn from(m: u8) -> Self {
        NotePitch::Midi(m)
    }
}

impl From<&str> for NotePitch {
    fn from(name: &str) -> Self {
        NotePitch::Name(name.to_string())
    }
}

impl From<String> for NotePitch {
    fn from(name: String) -> Self {
        NotePitch::Name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "NoteRecord", try_from = "NoteRecord")]
pub struct Note {
    /// MIDI note number
    pub midi: u8,
    /// Onset in seconds
    pub time: f64,
    /// Seconds between onset and release; 0 while the note is open
    pub duration: f64,
    /// Normalized velocity 0-1
    pub velocity: f64,
}

impl Note {
    pub fn new(pitch: impl Into<NotePitch>, time: f64, duration: f64, velocity: f64) -> Result<Self> {
        let midi = pitch.into().resolve()?;
        Ok(Self { midi, time, duration, velocity })
    }

    /// The note in Scientific Pitch Notation, sharp-spelled.
    pub fn name(&self) -> String {
        midi_to_pitch(self.midi)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.midi = NotePitch::from(name).resolve()?;
        Ok(())
    }

    /// Alias for `time`.
    pub fn note_on(&self) -> f64 {
        self.time
    }

    pub fn note_off(&self) -> f64 {
        self.time + self.duration
    }

    /// Move the release point, keeping the onset.
    pub fn set_note_off(&mut self, time: f64) {
        self.duration = time - self.time;
    }

    pub fn is_open(&self) -> bool {
        self.duration == 0.0
    }

    /// True if `pitch` resolves to this note's number. `Db4` matches `C#4`.
    pub fn matches(&self, pitch: &NotePitch) -> bool {
        pitch.resolve().is_ok_and(|m| m == self.midi)
    }
}

impl Timed for Note {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Onset record of a note, as fed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOn {
    pub time: f64,
    pub midi: u8,
    pub velocity: f64,
}

/// Release record of a note, as fed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOff {
    pub time: f64,
    pub midi: u8,
}

impl Timed for NoteOn {
    fn time(&self) -> f64 {
        self.time
    }
}

impl Timed for NoteOff {
    fn time(&self) -> f64 {
        self.time
    }
}

impl From<&Note> for NoteOn {
    fn from(note: &Note) -> Self {
        Self { time: note.note_on(), midi: note.midi, velocity: note.velocity }
    }
}

impl From<&Note> for NoteOff {
    fn from(note: &Note) -> Self {
        Self { time: note.note_off(), midi: note.midi }
    }
}

/// Exchange shape of a note: carries both the name and the number.
/// On read either one is enough; `midi` wins when both are present.
#[derive(Serialize, Deserialize)]
struct NoteRecord {
    time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    midi: Option<u8>,
    #[serde(default = "full_velocity")]
    velocity: f64,
    #[serde(default)]
    duration: f64,
}

fn full_velocity() -> f64 {
    1.0
}

impl From<Note> for NoteRecord {
    fn from(note: Note) -> Self {
        Self {
            time: note.time,
            name: Some(note.name()),
            midi: Some(note.midi),
            velocity: note.velocity,
            duration: note.duration,
        }
    }
}

impl TryFrom<NoteRecord> for Note {
    type Error = MidiError;

    fn try_from(rec: NoteRecord) -> Result<Self> {
        let pitch = match (rec.midi, rec.name) {
            (Some(m), _) => NotePitch::Midi(m),
            (None, Some(name)) => NotePitch::Name(name),
            (None, None) => return Err(MidiError::InvalidPitch(String::new())),
        };
        Note::new(pitch, rec.time, rec.duration, rec.velocity)
    }
}
