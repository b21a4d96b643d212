//! midi.rs
//!
//! The `Midi` container: a shared header plus one `Track` per `MTrk` chunk.
//!
//! ### Decoding
//! midly does the byte work (chunks, variable-length deltas, running status).
//! On top of that we:
//!  - pull tempo, time signature and PPQ into a single `Header`
//!  - walk each track, accumulating delta ticks into absolute ticks and
//!    converting them to seconds at the header's tempo
//!  - route note-on/note-off/controller events into the `Track`, with
//!    velocities and values normalized to 0-1
//!  - treat NoteOn with velocity 0 as NoteOff
//!
//! ### Encoding
//! The reverse: each `Track` is merged back into time order, seconds become
//! tick deltas on the header's grid, and midly writes the chunks.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use midly::num::{u15, u24};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

use crate::encoder::EncodeOptions;
use crate::error::{MidiError, Result};
use crate::header::{Header, check_bpm, check_time_signature, parse_header};
use crate::track::Track;
use crate::util::{clean_name, ticks_to_seconds};

/// Fields of the `MThd` chunk, read straight off the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmfInfo {
    /// 0 = single track, 1 = parallel tracks, 2 = sequential
    pub format: u16,
    pub tracks: u16,
    /// Raw division word; top bit set means SMPTE timing
    pub division: u16,
}

/// Check for an `MThd` header chunk and read its fields.
pub fn sniff(bytes: &[u8]) -> Result<SmfInfo> {
    // "MThd", u32 length (6), format, ntrks, division
    if bytes.len() < 14 || !bytes.starts_with(b"MThd") {
        return Err(MidiError::NotSmf);
    }
    if BigEndian::read_u32(&bytes[4..8]) < 6 {
        return Err(MidiError::NotSmf);
    }
    Ok(SmfInfo {
        format: BigEndian::read_u16(&bytes[8..10]),
        tracks: BigEndian::read_u16(&bytes[10..12]),
        division: BigEndian::read_u16(&bytes[12..14]),
    })
}

/// Track lookup key: position or name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for TrackRef<'_> {
    fn from(i: usize) -> Self {
        TrackRef::Index(i)
    }
}

impl<'a> From<&'a str> for TrackRef<'a> {
    fn from(name: &'a str) -> Self {
        TrackRef::Name(name)
    }
}

/// A whole MIDI file, timed in seconds.
///
/// The JSON form (`to_json`/`from_json`) is
/// `{ header: {ppq, bpm, timeSignature}, tracks: [{name, instrument, notes, controlChanges}] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Midi {
    header: Header,
    pub tracks: Vec<Track>,
}

impl Midi {
    /// Empty file at 120 BPM, 4/4, 480 PPQ.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a complete SMF byte buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut midi = Self::new();
        midi.decode(bytes)?;
        Ok(midi)
    }

    /// Read and decode a `.mid` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::parse(&bytes)
    }

    /// Decode `bytes`, replacing the header and every track held so far.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let info = sniff(bytes)?;
        let smf = Smf::parse(bytes)?;
        log::debug!(
            "MThd: format {}, {} tracks, division {:#06x}",
            info.format,
            info.tracks,
            info.division
        );

        self.header = parse_header(&smf);
        self.tracks = smf
            .tracks
            .iter()
            .map(|events| decode_track(events, &self.header))
            .collect::<Result<_>>()?;

        log::debug!(
            "decoded {} tracks, {} notes, ppq {}, {:.2} bpm",
            self.tracks.len(),
            self.tracks.iter().map(Track::len).sum::<usize>(),
            self.header.ppq,
            self.header.bpm
        );
        Ok(self)
    }

    /// Encode with default options: channel 0, control changes included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&EncodeOptions::default())
    }

    /// Encode as a format 1 file, one `MTrk` per track.
    ///
    /// Each track starts with its name, instrument, the tempo and the time
    /// signature, and ends with an end-of-track marker.
    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let mut smf = Smf::new(midly::Header::new(
            Format::Parallel,
            Timing::Metrical(u15::from(self.header.ppq)),
        ));

        let (numerator, denominator) = self.header.time_signature;
        for track in &self.tracks {
            let mut events: Vec<TrackEvent<'_>> = Vec::new();
            if !track.name.is_empty() {
                events.push(meta(MetaMessage::TrackName(track.name.as_bytes())));
            }
            if !track.instrument.is_empty() {
                events.push(meta(MetaMessage::InstrumentName(track.instrument.as_bytes())));
            }
            events.push(meta(MetaMessage::Tempo(u24::from(
                self.header.us_per_qn().min(0x00FF_FFFF),
            ))));
            events.push(meta(MetaMessage::TimeSignature(
                numerator,
                denominator.trailing_zeros() as u8,
                24,
                8,
            )));
            track.encode(&mut events, &self.header, options);
            events.push(meta(MetaMessage::EndOfTrack));
            smf.tracks.push(events);
        }

        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        log::debug!("encoded {} tracks into {} bytes", self.tracks.len(), buf.len());
        Ok(buf)
    }

    /// Encode and write to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.encode()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load the JSON exchange form. Notes may give `midi`, `name`, or both.
    ///
    /// The header is checked like a decoded one: ppq in 1-32767, a positive
    /// tempo and a power-of-two time signature denominator.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Append a new, empty track.
    pub fn track(&mut self, name: impl Into<String>) -> &mut Track {
        self.tracks.push(Track::new(name));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    /// Track by index, or the first track with that name.
    pub fn get<'a>(&self, key: impl Into<TrackRef<'a>>) -> Option<&Track> {
        match key.into() {
            TrackRef::Index(i) => self.tracks.get(i),
            TrackRef::Name(name) => self.tracks.iter().find(|t| t.name == name),
        }
    }

    pub fn get_mut<'a>(&mut self, key: impl Into<TrackRef<'a>>) -> Option<&mut Track> {
        match key.into() {
            TrackRef::Index(i) => self.tracks.get_mut(i),
            TrackRef::Name(name) => self.tracks.iter_mut().find(|t| t.name == name),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn bpm(&self) -> f64 {
        self.header.bpm
    }

    /// Change the tempo, rescaling every track by `old / new` so each note
    /// keeps its position on the tick grid.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        let bpm = check_bpm(bpm)?;
        let ratio = self.header.bpm / bpm;
        for track in &mut self.tracks {
            track.scale(ratio);
        }
        self.header.bpm = bpm;
        Ok(())
    }

    pub fn time_signature(&self) -> (u8, u8) {
        self.header.time_signature
    }

    /// Set the time signature. The denominator must be a power of two.
    pub fn set_time_signature(&mut self, time_signature: (u8, u8)) -> Result<()> {
        self.header.time_signature = check_time_signature(time_signature)?;
        Ok(())
    }

    /// Earliest track start, `None` without tracks.
    pub fn start_time(&self) -> Option<f64> {
        self.tracks.iter().map(Track::start_time).reduce(f64::min)
    }

    /// End of the longest track, `None` without tracks.
    pub fn duration(&self) -> Option<f64> {
        self.tracks.iter().map(Track::duration).reduce(f64::max)
    }

    /// A new file with every track sliced to `[start_time, end_time]`.
    ///
    /// The slice gets its own copy of the header.
    pub fn slice(&self, start_time: f64, end_time: f64) -> Midi {
        Midi {
            header: self.header,
            tracks: self.tracks.iter().map(|t| t.slice(start_time, end_time)).collect(),
        }
    }
}

fn meta(message: MetaMessage<'_>) -> TrackEvent<'_> {
    TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(message) }
}

/// Build one `Track` from a raw midly track.
///
/// Every controller number is kept, bank select (0) included.
fn decode_track(events: &[TrackEvent<'_>], header: &Header) -> Result<Track> {
    let mut track = Track::default();
    let mut name = None;
    let mut instrument = None;
    let mut abs_ticks: u64 = 0;

    for ev in events {
        abs_ticks += ev.delta.as_int() as u64;
        let time = ticks_to_seconds(abs_ticks as f64, header);

        match ev.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(text)) if name.is_none() => {
                name = Some(clean_name(&String::from_utf8_lossy(text)));
            }
            TrackEventKind::Meta(MetaMessage::InstrumentName(text)) if instrument.is_none() => {
                instrument = Some(String::from_utf8_lossy(text).into_owned());
            }
            TrackEventKind::Midi { message, .. } => match message {
                // NoteOn with velocity=0 is equivalent to NoteOff
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                    track.note_off(key.as_int(), time)?;
                }
                MidiMessage::NoteOn { key, vel } => {
                    track.note_on(key.as_int(), time, vel.as_int() as f64 / 127.0)?;
                }
                MidiMessage::NoteOff { key, .. } => {
                    track.note_off(key.as_int(), time)?;
                }
                MidiMessage::Controller { controller, value } => {
                    track.cc(controller.as_int(), time, value.as_int() as f64 / 127.0);
                }
                _ => {}
            },
            _ => {}
        }
    }

    track.name = name.unwrap_or_default();
    track.instrument = instrument.unwrap_or_default();
    Ok(track)
}
