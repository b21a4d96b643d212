//! merge.rs
//!
//! K-way merge of independently time-sorted streams.
//!
//! A track's note-ons are sorted by onset, but its note-offs are not sorted
//! against them: a long note can end after several later notes started. An SMF
//! track needs non-decreasing delta times, so the encoder walks all streams at
//! once and always takes the earliest pending event.

use crate::insert::Timed;

/// Iterator over several sorted slices, yielding `(stream index, event)` in
/// time order. On equal times the lower stream index comes first.
pub struct Merge<'a, T> {
    streams: Vec<&'a [T]>,
    positions: Vec<usize>,
}

impl<'a, T: Timed> Merge<'a, T> {
    pub fn new(streams: Vec<&'a [T]>) -> Self {
        let positions = vec![0; streams.len()];
        Self { streams, positions }
    }

    fn has_more(&self) -> bool {
        self.streams
            .iter()
            .zip(&self.positions)
            .any(|(s, &pos)| pos < s.len())
    }
}

impl<'a, T: Timed> Iterator for Merge<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_more() {
            return None;
        }

        let mut lowest: Option<(usize, f64)> = None;
        for (i, stream) in self.streams.iter().enumerate() {
            let Some(ev) = stream.get(self.positions[i]) else { continue };
            let t = ev.time();
            match lowest {
                None => lowest = Some((i, t)),
                Some((_, best)) if t < best => lowest = Some((i, t)),
                Some(_) => {}
            }
        }

        let (i, _) = lowest?;
        let ev = &self.streams[i][self.positions[i]];
        self.positions[i] += 1;
        Some((i, ev))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left: usize = self
            .streams
            .iter()
            .zip(&self.positions)
            .map(|(s, &pos)| s.len() - pos)
            .sum();
        (left, Some(left))
    }
}

/// Call `emit` once per event across all `streams`, in time order, with the
/// index of the stream the event came from.
pub fn merge<'a, T: Timed>(streams: Vec<&'a [T]>, mut emit: impl FnMut(usize, &'a T)) {
    for (i, ev) in Merge::new(streams) {
        emit(i, ev);
    }
}
