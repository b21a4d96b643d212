//! Ordered insertion into time-sorted event lists.

/// Anything that sits at a point in time, in seconds.
pub trait Timed {
    fn time(&self) -> f64;
}

/// Index just past the last event whose time is `<= time`.
///
/// Events sharing `time` stay in front of the returned index, so inserting
/// there keeps equal-time events in arrival order.
fn insertion_index<T: Timed>(events: &[T], time: f64) -> usize {
    let len = events.len();
    // common case while decoding: events arrive in order
    if len == 0 || events[len - 1].time() <= time {
        return len;
    }

    let mut beginning = 0;
    let mut end = len;
    while beginning < end {
        let mid = beginning + (end - beginning) / 2;
        let t = events[mid].time();
        if t == time {
            // a plain binary search can land on any of the duplicates
            let mut last = mid;
            while last + 1 < len && events[last + 1].time() == time {
                last += 1;
            }
            return last + 1;
        } else if t < time {
            beginning = mid + 1;
        } else {
            end = mid;
        }
    }
    beginning
}

/// Insert `event` into `events`, which must already be sorted by time.
pub fn binary_insert<T: Timed>(events: &mut Vec<T>, event: T) {
    let index = insertion_index(events, event.time());
    events.insert(index, event);
}
