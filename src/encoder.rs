//! encoder.rs
//!
//! The seam between a [`Track`](crate::Track) and the byte-level writer.
//!
//! A track only knows how to walk its events in time order and turn absolute
//! seconds into tick deltas; what those calls become is up to the encoder.
//! The crate's own encoder appends midly `TrackEvent`s, which `Smf::write_std`
//! then turns into an `MTrk` chunk.

use midly::{MidiMessage, TrackEvent, TrackEventKind, num::u28};

/// Largest delta a variable-length quantity can hold.
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Knobs for turning tracks into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Channel every event is written on, 0-15
    pub channel: u8,
    /// Write control changes alongside the notes
    pub control_changes: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { channel: 0, control_changes: true }
    }
}

/// Receives one call per channel event, in emission order.
pub trait TrackEncoder {
    fn note_on(&mut self, channel: u8, pitch: u8, delta_ticks: u32, velocity: u8);
    fn note_off(&mut self, channel: u8, pitch: u8, delta_ticks: u32);
    fn controller(&mut self, channel: u8, number: u8, delta_ticks: u32, value: u8);
}

fn push(track: &mut Vec<TrackEvent<'_>>, channel: u8, delta: u32, message: MidiMessage) {
    track.push(TrackEvent {
        delta: u28::from(delta.min(MAX_DELTA)),
        kind: TrackEventKind::Midi { channel: (channel & 0x0F).into(), message },
    });
}

impl TrackEncoder for Vec<TrackEvent<'_>> {
    fn note_on(&mut self, channel: u8, pitch: u8, delta_ticks: u32, velocity: u8) {
        push(self, channel, delta_ticks, MidiMessage::NoteOn {
            key: (pitch & 0x7F).into(),
            vel: (velocity & 0x7F).into(),
        });
    }

    fn note_off(&mut self, channel: u8, pitch: u8, delta_ticks: u32) {
        push(self, channel, delta_ticks, MidiMessage::NoteOff {
            key: (pitch & 0x7F).into(),
            vel: 0.into(),
        });
    }

    fn controller(&mut self, channel: u8, number: u8, delta_ticks: u32, value: u8) {
        push(self, channel, delta_ticks, MidiMessage::Controller {
            controller: (number & 0x7F).into(),
            value: (value & 0x7F).into(),
        });
    }
}
