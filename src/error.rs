/// Everything that can go wrong while building, decoding or encoding a [`Midi`](crate::Midi).
///
/// Orphaned note-offs are not in here: the decoder drops them silently.
#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("the midi value must either be in Pitch Notation (e.g. C#4) or a midi value, got {0:?}")]
    InvalidPitch(String),
    #[error("midi note {0} is out of range 0-127")]
    PitchOutOfRange(i32),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
    #[error("ppq must be between 1 and 32767, got {0}")]
    InvalidPpq(u16),
    #[error("time signature denominator must be a power of two, got {0}/{1}")]
    InvalidTimeSignature(u8, u8),
    #[error("not a standard midi file")]
    NotSmf,
    #[error("malformed midi data: {0}")]
    Parse(#[from] midly::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = MidiError> = std::result::Result<T, E>;
