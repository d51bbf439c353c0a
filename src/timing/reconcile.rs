use super::activation::{ActiveNote, note_end};
use crate::events::{ClockEvent, EventWriter};
use crate::notes::{Note, NoteList};

/// Carries sounding notes across a wholesale replacement of the note list,
/// matching by pitch and start within `epsilon`.
pub struct NoteSetReconciler {
    epsilon: f64,
}

impl NoteSetReconciler {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.max(0.0),
        }
    }

    pub fn reconcile<W: EventWriter>(
        &self,
        active: &mut Vec<ActiveNote>,
        notes: &NoteList,
        position: f64,
        out: &mut W,
    ) -> usize {
        let before = active.len();
        active.retain_mut(|sounding| {
            let keep = match self.find_match(sounding, notes.notes()) {
                Some(candidate) => update(sounding, candidate, notes.loop_length(), position),
                None => false,
            };
            if !keep {
                out.emit(ClockEvent::NoteOff {
                    pitch: sounding.pitch,
                    channel: sounding.channel,
                });
            }
            keep
        });
        before - active.len()
    }

    fn find_match<'a>(&self, sounding: &ActiveNote, notes: &'a [Note]) -> Option<&'a Note> {
        notes.iter().find(|n| {
            n.pitch == sounding.pitch && (n.time - sounding.start_time).abs() <= self.epsilon
        })
    }
}

fn update(sounding: &mut ActiveNote, candidate: &Note, loop_length: f64, position: f64) -> bool {
    let (end_time, crosses_boundary) = note_end(sounding.start_time, candidate.duration, loop_length);
    let past_loop_point = sounding.crosses_boundary && sounding.has_wrapped;

    let ended = match (past_loop_point, crosses_boundary) {
        // Still in the pass it started in and now ends inside it.
        (false, false) => end_time <= position,
        (false, true) => false,
        // Already past the loop point but no longer reaches it.
        (true, false) => true,
        (true, true) => end_time <= position,
    };
    if ended {
        return false;
    }

    sounding.end_time = end_time;
    sounding.crosses_boundary = crosses_boundary;
    true
}
