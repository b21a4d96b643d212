//! Standard MIDI File codec with a time-addressable model.
//!
//! Bytes decode into a [`Midi`]: a [`Header`] (PPQ, tempo, time signature)
//! and [`Track`]s of [`Note`]s and [`ControlChange`]s timed in seconds. Tracks
//! can be edited, sliced and rescaled, and the whole thing encodes back to
//! SMF bytes.
//!
//! ```no_run
//! use midiconvert::Midi;
//!
//! # fn main() -> midiconvert::Result<()> {
//! let mut midi = Midi::open("song.mid")?;
//! midi.set_bpm(90.0)?;
//! let intro = midi.slice(0.0, 8.0);
//! intro.write_file("intro.mid")?;
//! # Ok(())
//! # }
//! ```

pub mod control;
pub mod encoder;
pub mod error;
pub mod header;
pub mod insert;
pub mod merge;
pub mod midi;
pub mod note;
pub mod track;
pub mod util;

pub use control::ControlChange;
pub use encoder::{EncodeOptions, TrackEncoder};
pub use error::{MidiError, Result};
pub use header::Header;
pub use midi::{Midi, TrackRef};
pub use note::{Note, NotePitch};
pub use track::Track;
