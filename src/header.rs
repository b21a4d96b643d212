//! header.rs
//!
//! Transport data for a whole file: resolution, tempo and time signature.
//!
//! Tracks store times in seconds, so the tempo is a single scalar. A file with
//! several tempo events keeps only the first one; tempo maps are not modelled.

use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};

use crate::error::{MidiError, Result};

pub const DEFAULT_PPQ: u16 = 480;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_TIME_SIGNATURE: (u8, u8) = (4, 4);

/// Largest division a metrical `MThd` can carry (15 bits).
pub const MAX_PPQ: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "HeaderRecord")]
pub struct Header {
    /// Ticks per quarter note
    pub ppq: u16,
    /// Beats per minute
    pub bpm: f64,
    /// (numerator, denominator), e.g. (6, 8)
    pub time_signature: (u8, u8),
}

impl Default for Header {
    fn default() -> Self {
        Self {
            ppq: DEFAULT_PPQ,
            bpm: DEFAULT_BPM,
            time_signature: DEFAULT_TIME_SIGNATURE,
        }
    }
}

impl Header {
    /// Tempo as the microseconds-per-quarter-note value of a Set Tempo event.
    pub fn us_per_qn(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }
}

pub(crate) fn check_bpm(bpm: f64) -> Result<f64> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(MidiError::InvalidTempo(bpm))
    }
}

/// The denominator goes on the wire as a power-of-two exponent.
pub(crate) fn check_time_signature(time_signature: (u8, u8)) -> Result<(u8, u8)> {
    let (numerator, denominator) = time_signature;
    if denominator.is_power_of_two() {
        Ok(time_signature)
    } else {
        Err(MidiError::InvalidTimeSignature(numerator, denominator))
    }
}

/// Unchecked shape of a JSON header.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderRecord {
    ppq: u16,
    bpm: f64,
    time_signature: (u8, u8),
}

impl TryFrom<HeaderRecord> for Header {
    type Error = MidiError;

    fn try_from(rec: HeaderRecord) -> Result<Self> {
        if rec.ppq == 0 || rec.ppq > MAX_PPQ {
            return Err(MidiError::InvalidPpq(rec.ppq));
        }
        Ok(Header {
            ppq: rec.ppq,
            bpm: check_bpm(rec.bpm)?,
            time_signature: check_time_signature(rec.time_signature)?,
        })
    }
}

/// Pull the header out of a parsed file.
///
/// The first Set Tempo and the first Time Signature found, in track order, win.
/// Missing ones fall back to 120 BPM and 4/4.
pub fn parse_header(smf: &Smf<'_>) -> Header {
    let ppq = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        // SMPTE timing has no quarter note; treat it like the default resolution
        Timing::Timecode(..) => DEFAULT_PPQ,
    };

    let mut bpm = None;
    let mut time_signature = None;

    'scan: for track in &smf.tracks {
        for ev in track {
            match ev.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tp)) if bpm.is_none() => {
                    let us = tp.as_int();
                    if us > 0 {
                        bpm = Some(60_000_000.0 / us as f64);
                    }
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, dd, _, _))
                    if time_signature.is_none() =>
                {
                    // the denominator is stored as a power of two; anything
                    // past 2^7 does not fit and is skipped
                    if let Some(denominator) = 1u8.checked_shl(dd as u32) {
                        time_signature = Some((num, denominator));
                    }
                }
                _ => {}
            }
            if bpm.is_some() && time_signature.is_some() {
                break 'scan;
            }
        }
    }

    Header {
        // a zero division would make every tick conversion divide by zero
        ppq: if ppq == 0 { DEFAULT_PPQ } else { ppq },
        bpm: bpm.unwrap_or(DEFAULT_BPM),
        time_signature: time_signature.unwrap_or(DEFAULT_TIME_SIGNATURE),
    }
}
