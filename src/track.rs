//! track.rs
//!
//! One timeline of notes and controller sequences, all timed in seconds.
//!
//! Notes are kept sorted by onset. Note-ons and note-offs arrive separately
//! while decoding, so a note-on first goes in as an open note (duration 0) and
//! the matching note-off closes it later. Pairing is FIFO: a note-off closes
//! the earliest still-open note of its pitch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::control::ControlChange;
use crate::encoder::{EncodeOptions, TrackEncoder};
use crate::error::Result;
use crate::header::Header;
use crate::insert::{Timed, binary_insert};
use crate::merge::merge;
use crate::note::{Note, NoteOff, NoteOn, NotePitch};
use crate::util::seconds_to_ticks;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TrackRecord")]
pub struct Track {
    pub name: String,
    pub instrument: String,
    notes: Vec<Note>,
    control_changes: BTreeMap<u8, Vec<ControlChange>>,
}

/// What the encoder is fed; one variant per merge stream kind.
enum Emit {
    On(NoteOn),
    Off(NoteOff),
    Control(ControlChange),
}

impl Timed for Emit {
    fn time(&self) -> f64 {
        match self {
            Emit::On(ev) => ev.time,
            Emit::Off(ev) => ev.time,
            Emit::Control(cc) => cc.time,
        }
    }
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Add a complete note.
    pub fn note(
        &mut self,
        pitch: impl Into<NotePitch>,
        time: f64,
        duration: f64,
        velocity: f64,
    ) -> Result<&mut Self> {
        let note = Note::new(pitch, time, duration, velocity)?;
        binary_insert(&mut self.notes, note);
        Ok(self)
    }

    /// Add an open note, to be closed by [`Track::note_off`].
    pub fn note_on(&mut self, pitch: impl Into<NotePitch>, time: f64, velocity: f64) -> Result<&mut Self> {
        self.note(pitch, time, 0.0, velocity)
    }

    /// Close the earliest open note of this pitch.
    ///
    /// A note-off with nothing to close is dropped; real files carry those.
    pub fn note_off(&mut self, pitch: impl Into<NotePitch>, time: f64) -> Result<&mut Self> {
        let midi = pitch.into().resolve()?;
        match self.notes.iter_mut().find(|n| n.midi == midi && n.is_open()) {
            Some(note) => note.set_note_off(time),
            None => log::trace!("orphaned note-off for {midi} at {time:.3}s in {:?}", self.name),
        }
        Ok(self)
    }

    /// Add a control change; `value` is normalized 0-1.
    pub fn cc(&mut self, number: u8, time: f64, value: f64) -> &mut Self {
        let seq = self.control_changes.entry(number).or_default();
        binary_insert(seq, ControlChange::new(number, time, value));
        self
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// All controller sequences, keyed by controller number.
    pub fn control_changes(&self) -> &BTreeMap<u8, Vec<ControlChange>> {
        &self.control_changes
    }

    pub fn control_changes_for(&self, number: u8) -> Option<&[ControlChange]> {
        self.control_changes.get(&number).map(Vec::as_slice)
    }

    /// Onset records, in onset order.
    pub fn note_ons(&self) -> Vec<NoteOn> {
        self.notes.iter().map(NoteOn::from).collect()
    }

    /// Release records, in onset order. Not sorted by release time.
    pub fn note_offs(&self) -> Vec<NoteOff> {
        self.notes.iter().map(NoteOff::from).collect()
    }

    /// Number of notes.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Onset of the first note, or 0.
    pub fn start_time(&self) -> f64 {
        self.notes.first().map_or(0.0, Note::note_on)
    }

    /// Release of the last note (by onset), or 0.
    pub fn duration(&self) -> f64 {
        self.notes.last().map_or(0.0, Note::note_off)
    }

    /// Multiply every time and duration by `ratio`.
    pub fn scale(&mut self, ratio: f64) -> &mut Self {
        for note in &mut self.notes {
            note.time *= ratio;
            note.duration *= ratio;
        }
        for cc in self.control_changes.values_mut().flatten() {
            cc.time *= ratio;
        }
        self
    }

    /// Copy of the notes between `start_time` and `end_time`, shifted so that
    /// `start_time` becomes 0.
    ///
    /// The range starts at the first note with onset `>= start_time` (or the
    /// first note, if there is none) and runs through the first note whose
    /// release reaches `end_time`, as long as that note starts before
    /// `end_time`. Shifted times are not clamped: a note that started before
    /// `start_time` comes out negative.
    ///
    /// Control changes in `[start_time, end_time)` come along, shifted too.
    pub fn slice(&self, start_time: f64, end_time: f64) -> Track {
        let start = self
            .notes
            .iter()
            .position(|n| n.time >= start_time)
            .unwrap_or(0);
        let end = match self.notes.iter().position(|n| n.note_off() >= end_time) {
            Some(i) if self.notes[i].time < end_time => i + 1,
            Some(i) => i,
            None => self.notes.len(),
        };

        let notes = if start < end {
            self.notes[start..end]
                .iter()
                .map(|n| Note { time: n.time - start_time, ..n.clone() })
                .collect()
        } else {
            Vec::new()
        };

        let control_changes = self
            .control_changes
            .iter()
            .filter_map(|(&number, seq)| {
                let kept: Vec<ControlChange> = seq
                    .iter()
                    .filter(|cc| cc.time >= start_time && cc.time < end_time)
                    .map(|cc| ControlChange { time: cc.time - start_time, ..*cc })
                    .collect();
                (!kept.is_empty()).then_some((number, kept))
            })
            .collect();

        Track {
            name: self.name.clone(),
            instrument: self.instrument.clone(),
            notes,
            control_changes,
        }
    }

    /// Feed this track's events to `encoder` in time order.
    ///
    /// Note-ons, note-offs and (when `options.control_changes` is set) each
    /// controller sequence are merged into one stream. Absolute seconds become
    /// ticks on the header's grid, floored, and each call gets the delta since
    /// the previous one, never negative.
    ///
    /// Note-on velocities never go below 1: on the wire a NoteOn with
    /// velocity 0 is a note-off.
    pub fn encode(
        &self,
        encoder: &mut impl TrackEncoder,
        header: &Header,
        options: &EncodeOptions,
    ) {
        let channel = options.channel;
        let mut last_tick: i64 = 0;
        let mut delta_ticks = |time: f64| -> u32 {
            let ticks = seconds_to_ticks(time, header).floor() as i64;
            let delta = (ticks - last_tick).max(0);
            last_tick = ticks;
            u32::try_from(delta).unwrap_or(u32::MAX)
        };

        let ons: Vec<Emit> = self.notes.iter().map(|n| Emit::On(n.into())).collect();
        // releases are in onset order; the merge needs them in release order
        let mut offs: Vec<Emit> = self.notes.iter().map(|n| Emit::Off(n.into())).collect();
        offs.sort_by(|a, b| a.time().total_cmp(&b.time()));
        let controls: Vec<Vec<Emit>> = if options.control_changes {
            self.control_changes
                .values()
                .map(|seq| seq.iter().copied().map(Emit::Control).collect())
                .collect()
        } else {
            Vec::new()
        };

        let mut streams = vec![ons.as_slice(), offs.as_slice()];
        streams.extend(controls.iter().map(Vec::as_slice));

        merge(streams, |_, ev| match ev {
            Emit::On(on) => encoder.note_on(
                channel,
                on.midi,
                delta_ticks(on.time),
                to_seven_bit(on.velocity).max(1),
            ),
            Emit::Off(off) => encoder.note_off(channel, off.midi, delta_ticks(off.time)),
            Emit::Control(cc) => encoder.controller(
                channel,
                cc.number,
                delta_ticks(cc.time),
                to_seven_bit(cc.value),
            ),
        });
    }
}

/// 0-1 to 0-127, floored.
fn to_seven_bit(v: f64) -> u8 {
    (v * 127.0).floor().clamp(0.0, 127.0) as u8
}

/// Deserialized tracks go through ordered insertion again, so hand-written
/// JSON does not need to be sorted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    instrument: String,
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    control_changes: BTreeMap<u8, Vec<ControlChange>>,
}

impl From<TrackRecord> for Track {
    fn from(rec: TrackRecord) -> Self {
        let mut track = Track { name: rec.name, instrument: rec.instrument, ..Track::default() };
        for note in rec.notes {
            binary_insert(&mut track.notes, note);
        }
        for cc in rec.control_changes.into_values().flatten() {
            track.cc(cc.number, cc.time, cc.value);
        }
        track
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records encoder calls as (kind, pitch or cc number, delta, velocity or value).
    #[derive(Default)]
    struct Recorder(Vec<(&'static str, u8, u32, u8)>);

    impl TrackEncoder for Recorder {
        fn note_on(&mut self, _channel: u8, pitch: u8, delta: u32, velocity: u8) {
            self.0.push(("on", pitch, delta, velocity));
        }
        fn note_off(&mut self, _channel: u8, pitch: u8, delta: u32) {
            self.0.push(("off", pitch, delta, 0));
        }
        fn controller(&mut self, _channel: u8, number: u8, delta: u32, value: u8) {
            self.0.push(("cc", number, delta, value));
        }
    }

    fn times(track: &Track) -> Vec<f64> {
        track.notes().iter().map(|n| n.time).collect()
    }

    #[test]
    fn notes_stay_sorted() {
        let mut track = Track::default();
        for (i, t) in [3.0, 1.0, 2.0, 0.0, 2.0, 5.0].into_iter().enumerate() {
            track.note_on(60 + i as u8, t, 1.0).unwrap();
        }
        assert_eq!(times(&track), vec![0.0, 1.0, 2.0, 2.0, 3.0, 5.0]);
        // equal onsets keep arrival order
        assert_eq!(track.notes()[2].midi, 62);
        assert_eq!(track.notes()[3].midi, 64);
    }

    #[test]
    fn note_off_closes_the_earliest_open_note() {
        let mut track = Track::default();
        track.note_on(60u8, 0.0, 1.0).unwrap();
        track.note_on(60u8, 1.0, 1.0).unwrap();
        track.note_off(60u8, 2.0).unwrap();

        assert_eq!(track.notes()[0].duration, 2.0);
        assert_eq!(track.notes()[1].duration, 0.0);

        track.note_off(60u8, 3.0).unwrap();
        assert_eq!(track.notes()[1].duration, 2.0);
    }

    #[test]
    fn orphaned_note_off_is_ignored() {
        let mut track = Track::default();
        track.note_on(60u8, 0.0, 1.0).unwrap();
        track.note_off(61u8, 1.0).unwrap();
        track.note_off(60u8, 1.0).unwrap();
        track.note_off(60u8, 2.0).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.notes()[0].duration, 1.0);
    }

    #[test]
    fn pitch_names_and_numbers_pair_up() {
        let mut track = Track::new("lead");
        track.note_on("C#4", 0.0, 0.5).unwrap();
        track.note_off("Db4", 0.5).unwrap();
        assert_eq!(track.notes()[0].midi, 61);
        assert_eq!(track.notes()[0].duration, 0.5);
        assert!(track.note_on("X4", 0.0, 1.0).is_err());
    }

    #[test]
    fn cc_sequences_are_created_lazily_and_sorted() {
        let mut track = Track::default();
        assert!(track.control_changes_for(64).is_none());
        track.cc(64, 1.0, 1.0).cc(64, 0.0, 0.0).cc(7, 0.5, 0.8);
        let sustain = track.control_changes_for(64).unwrap();
        assert_eq!(sustain.iter().map(|c| c.time).collect::<Vec<_>>(), vec![0.0, 1.0]);
        assert_eq!(track.control_changes().len(), 2);
    }

    #[test]
    fn start_and_duration() {
        let mut track = Track::default();
        assert_eq!(track.start_time(), 0.0);
        assert_eq!(track.duration(), 0.0);
        track.note(60u8, 0.5, 1.0, 1.0).unwrap();
        track.note(62u8, 1.0, 2.0, 1.0).unwrap();
        assert_eq!(track.start_time(), 0.5);
        assert_eq!(track.duration(), 3.0);
    }

    #[test]
    fn projections_follow_note_order() {
        let mut track = Track::default();
        track.note(60u8, 0.0, 4.0, 1.0).unwrap();
        track.note(62u8, 1.0, 1.0, 0.5).unwrap();
        let offs: Vec<f64> = track.note_offs().iter().map(|o| o.time).collect();
        assert_eq!(offs, vec![4.0, 2.0]);
        let ons: Vec<f64> = track.note_ons().iter().map(|o| o.velocity).collect();
        assert_eq!(ons, vec![1.0, 0.5]);
    }

    #[test]
    fn scale_multiplies_times() {
        let mut track = Track::default();
        track.note(60u8, 1.0, 0.5, 1.0).unwrap();
        track.cc(64, 2.0, 1.0);
        track.scale(2.0);
        assert_eq!(track.notes()[0].time, 2.0);
        assert_eq!(track.notes()[0].duration, 1.0);
        assert_eq!(track.control_changes_for(64).unwrap()[0].time, 4.0);
    }

    #[test]
    fn slice_keeps_onsets_in_range_and_rebases() {
        let mut track = Track::new("piano");
        for (i, t) in [0.0, 1.0, 2.0, 4.0].into_iter().enumerate() {
            track.note_on(60 + i as u8, t, 1.0).unwrap();
        }
        let sliced = track.slice(1.0, 3.0);
        assert_eq!(times(&sliced), vec![0.0, 1.0]);
        assert_eq!(sliced.notes()[0].midi, 61);
        assert_eq!(sliced.name, "piano");
        // the source is untouched
        assert_eq!(track.len(), 4);
    }

    #[test]
    fn slice_includes_the_note_crossing_the_end() {
        let mut track = Track::default();
        track.note(60u8, 0.0, 1.0, 1.0).unwrap();
        track.note(62u8, 1.0, 3.0, 1.0).unwrap();
        track.note(64u8, 2.0, 0.5, 1.0).unwrap();
        let sliced = track.slice(1.0, 3.0);
        assert_eq!(times(&sliced), vec![0.0]);
        assert_eq!(sliced.notes()[0].duration, 3.0);
    }

    #[test]
    fn slice_past_the_last_release_keeps_the_tail() {
        let mut track = Track::default();
        track.note(60u8, 0.0, 1.0, 1.0).unwrap();
        track.note(62u8, 1.0, 1.0, 1.0).unwrap();
        let sliced = track.slice(0.5, 100.0);
        assert_eq!(times(&sliced), vec![0.5]);
    }

    #[test]
    fn slice_before_start_is_not_clamped() {
        let mut track = Track::default();
        track.note(60u8, 0.0, 10.0, 1.0).unwrap();
        let sliced = track.slice(2.0, 5.0);
        assert_eq!(times(&sliced), vec![-2.0]);
    }

    #[test]
    fn slice_carries_control_changes() {
        let mut track = Track::default();
        track.note(60u8, 0.0, 4.0, 1.0).unwrap();
        track.cc(64, 0.5, 1.0).cc(64, 1.5, 0.0).cc(64, 3.5, 1.0).cc(7, 0.1, 0.5);
        let sliced = track.slice(1.0, 3.0);
        assert_eq!(sliced.control_changes().len(), 1);
        let sustain = sliced.control_changes_for(64).unwrap();
        assert_eq!(sustain.len(), 1);
        assert_eq!(sustain[0].time, 0.5);
    }

    #[test]
    fn encode_orders_ons_and_offs() {
        // 120 bpm, 480 ppq: 960 ticks per second
        let header = Header::default();
        let mut track = Track::default();
        track.note(60u8, 0.0, 2.0, 1.0).unwrap();
        track.note(64u8, 0.5, 0.5, 0.5).unwrap();

        let mut rec = Recorder::default();
        track.encode(&mut rec, &header, &EncodeOptions::default());
        assert_eq!(
            rec.0,
            vec![
                ("on", 60, 0, 127),
                ("on", 64, 480, 63),
                ("off", 64, 480, 0),
                ("off", 60, 960, 0),
            ]
        );
    }

    #[test]
    fn quiet_notes_still_sound() {
        let header = Header::default();
        let mut track = Track::default();
        track.note(60u8, 0.0, 1.0, 0.0).unwrap();
        track.note(62u8, 0.0, 1.0, 0.005).unwrap();
        track.cc(7, 0.0, 0.0);

        let mut rec = Recorder::default();
        track.encode(&mut rec, &header, &EncodeOptions::default());
        assert_eq!(rec.0[0], ("on", 60, 0, 1));
        assert_eq!(rec.0[1], ("on", 62, 0, 1));
        // controllers may legitimately be 0
        assert_eq!(rec.0[2], ("cc", 7, 0, 0));
    }

    #[test]
    fn encode_merges_control_changes_when_asked() {
        let header = Header::default();
        let mut track = Track::default();
        track.note(60u8, 0.0, 1.0, 1.0).unwrap();
        track.cc(64, 0.5, 1.0);

        let mut with = Recorder::default();
        track.encode(&mut with, &header, &EncodeOptions::default());
        assert_eq!(with.0[1], ("cc", 64, 480, 127));
        assert_eq!(with.0[2], ("off", 60, 480, 0));

        let notes_only = EncodeOptions { control_changes: false, ..EncodeOptions::default() };
        let mut without = Recorder::default();
        track.encode(&mut without, &header, &notes_only);
        assert_eq!(without.0.len(), 2);
        assert_eq!(without.0[1], ("off", 60, 960, 0));
    }

    #[test]
    fn equal_times_emit_ons_first() {
        let header = Header::default();
        let mut track = Track::default();
        track.note(60u8, 0.0, 1.0, 1.0).unwrap();
        track.note(60u8, 1.0, 1.0, 1.0).unwrap();

        let notes_only = EncodeOptions { control_changes: false, ..EncodeOptions::default() };
        let mut rec = Recorder::default();
        track.encode(&mut rec, &header, &notes_only);
        let kinds: Vec<(&str, u32)> = rec.0.iter().map(|e| (e.0, e.2)).collect();
        assert_eq!(kinds, vec![("on", 0), ("on", 960), ("off", 0), ("off", 960)]);
    }

    #[test]
    fn json_round_trip_resorts_notes() {
        let json = r#"{
            "name": "keys",
            "notes": [
                {"time": 2.0, "midi": 62, "duration": 0.5},
                {"time": 0.0, "name": "C4", "velocity": 0.5, "duration": 1.0}
            ],
            "controlChanges": {"64": [{"number": 64, "time": 1.0, "value": 1.0}]}
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(times(&track), vec![0.0, 2.0]);
        assert_eq!(track.notes()[0].midi, 60);
        assert_eq!(track.control_changes_for(64).unwrap().len(), 1);

        let out = serde_json::to_value(&track).unwrap();
        assert_eq!(out["name"], "keys");
        assert_eq!(out["notes"][1]["name"], "D4");
        assert_eq!(out["controlChanges"]["64"][0]["name"], "sustain");
    }
}
