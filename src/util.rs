//! util.rs
//!
//! Stateless helpers shared by the rest of the crate:
//!  - tick <-> second conversion for a fixed tempo
//!  - Scientific Pitch Notation (`C#4`, `Db4`, `Bbb-1`) <-> MIDI note number
//!  - cleanup of the track names some DAWs write

use crate::header::Header;

const SCALE_INDEX_TO_NOTE: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert a tick count to seconds at the header's tempo and resolution.
pub fn ticks_to_seconds(ticks: f64, header: &Header) -> f64 {
    (60.0 / header.bpm) * (ticks / header.ppq as f64)
}

/// Convert seconds to a (fractional) tick count. Callers floor the result.
pub fn seconds_to_ticks(seconds: f64, header: &Header) -> f64 {
    ticks_per_second(header) * seconds
}

/// Tick clock rate for the header's tempo.
pub fn ticks_per_second(header: &Header) -> f64 {
    header.ppq as f64 / (60.0 / header.bpm)
}

/// Ableton pads its track names with NULs.
pub fn clean_name(s: &str) -> String {
    s.replace('\u{0}', "")
}

/// Split a pitch string into (semitone offset of the pitch class, rest of the string).
///
/// The accidental is one of `b`, `bb`, `#` or `x` (double sharp). Only the
/// accidental that leaves an octave number behind it is accepted, so `bb4`
/// reads as B-flat 4 and `cbb4` as C-double-flat 4.
fn split_pitch_class(s: &str) -> Option<(i32, &str)> {
    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_lowercase();
    let base = match letter {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let rest = chars.as_str();

    for (accidental, shift) in [("bb", -2), ("b", -1), ("#", 1), ("x", 2), ("", 0)] {
        let Some(tail) = strip_prefix_ignore_case(rest, accidental) else {
            continue;
        };
        if octave_prefix(tail).is_some() {
            return Some((base + shift, tail));
        }
    }
    None
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Leading `-?[0-9]+` of `s`, parsed. Anything after the digits is ignored.
fn octave_prefix(s: &str) -> Option<i32> {
    let digits_from = usize::from(s.starts_with('-'));
    let digits = s[digits_from..]
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    s[..digits_from + digits].parse().ok()
}

/// True if `s` starts with a pitch in Scientific Pitch Notation.
pub fn is_pitch(s: &str) -> bool {
    split_pitch_class(s).is_some()
}

/// Parse a pitch name into a MIDI note number: `index + (octave + 1) * 12`.
///
/// Returns `None` for malformed input. The result is not range checked, so
/// `Cb-1` gives `-1` and `B9` gives `131`.
pub fn pitch_to_midi(name: &str) -> Option<i32> {
    let (index, tail) = split_pitch_class(name)?;
    let octave = octave_prefix(tail)?;
    octave.checked_add(1)?.checked_mul(12)?.checked_add(index)
}

/// Canonical sharp-spelled name of a MIDI note number, e.g. `61 -> "C#4"`.
pub fn midi_to_pitch(midi: u8) -> String {
    let octave = (midi / 12) as i32 - 1;
    let note = SCALE_INDEX_TO_NOTE[(midi % 12) as usize];
    format!("{note}{octave}")
}
