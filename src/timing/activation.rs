//! Tick-by-tick note-on/note-off decisions.
//!
//! A tick that wraps the loop is handled as two linear segments: the tail
//! `(previous, loop_length)` before the loop point and the head
//! `[0, current]` after it, with the wrap itself applied in between. Every
//! segment is open below and closed above (except the head, which must
//! include 0), so a timeline instant triggers or releases a note exactly once.

use super::position::PositionStep;
use crate::events::{ClockEvent, EventWriter};
use crate::notes::{Note, NoteList};

const MAX_ACTIVE: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveNote {
    pub pitch: u8,
    pub channel: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub crosses_boundary: bool,
    pub has_wrapped: bool,
}

impl ActiveNote {
    fn from_note(note: &Note, loop_length: f64) -> Self {
        let (end_time, crosses_boundary) = note_end(note.time, note.duration, loop_length);
        Self {
            pitch: note.pitch,
            channel: note.channel(),
            start_time: note.time,
            end_time,
            crosses_boundary,
            has_wrapped: false,
        }
    }

    fn note_off(&self) -> ClockEvent {
        ClockEvent::NoteOff {
            pitch: self.pitch,
            channel: self.channel,
        }
    }
}

pub(crate) fn note_end(time: f64, duration: f64, loop_length: f64) -> (f64, bool) {
    let raw_end = time + duration;
    let crosses = loop_length > 0.0 && raw_end > loop_length;
    if crosses {
        (raw_end - loop_length, true)
    } else {
        (raw_end, false)
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    start_inclusive: bool,
    end: f64,
    /// Only affects triggering; releases are always inclusive of `end`.
    end_inclusive: bool,
}

impl Segment {
    fn after_start(&self, t: f64) -> bool {
        if self.start_inclusive {
            t >= self.start
        } else {
            t > self.start
        }
    }

    fn triggers(&self, t: f64) -> bool {
        let before_end = if self.end_inclusive {
            t <= self.end
        } else {
            t < self.end
        };
        self.after_start(t) && before_end
    }

    fn releases(&self, t: f64) -> bool {
        self.after_start(t) && t <= self.end
    }
}

pub struct NoteActivationEngine {
    active: Vec<ActiveNote>,
    fresh_start: bool,
}

impl Default for NoteActivationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteActivationEngine {
    pub fn new() -> Self {
        Self {
            active: Vec::with_capacity(MAX_ACTIVE),
            fresh_start: true,
        }
    }

    pub fn active(&self) -> &[ActiveNote] {
        &self.active
    }

    pub(crate) fn active_mut(&mut self) -> &mut Vec<ActiveNote> {
        &mut self.active
    }

    pub fn restart<W: EventWriter>(&mut self, out: &mut W) {
        self.panic(out);
        self.fresh_start = true;
    }

    pub fn panic<W: EventWriter>(&mut self, out: &mut W) -> usize {
        let released = self.active.len();
        for note in self.active.drain(..) {
            out.emit(note.note_off());
        }
        released
    }

    pub fn process<W: EventWriter>(&mut self, notes: &NoteList, step: PositionStep, out: &mut W) {
        if step.is_wrapping() {
            let tail = Segment {
                start: step.previous,
                start_inclusive: false,
                end: step.loop_length,
                end_inclusive: false,
            };
            self.scan(notes, tail, out);
            self.wrap(out);
            let head = Segment {
                start: 0.0,
                start_inclusive: true,
                end: step.current,
                end_inclusive: true,
            };
            self.scan(notes, head, out);
        } else {
            // A note at exactly 0 is otherwise missed on the first step from
            // rest, since both bounds start at 0.
            let segment = Segment {
                start: step.previous,
                start_inclusive: self.fresh_start && step.previous == 0.0,
                end: step.current,
                end_inclusive: true,
            };
            self.scan(notes, segment, out);
        }
        self.fresh_start = false;
    }

    fn scan<W: EventWriter>(&mut self, notes: &NoteList, segment: Segment, out: &mut W) {
        for note in notes.notes() {
            if segment.triggers(note.time) {
                self.trigger(note, notes.loop_length(), out);
            }
        }
        self.release(segment, out);
    }

    fn trigger<W: EventWriter>(&mut self, note: &Note, loop_length: f64, out: &mut W) {
        if let Some(idx) = self.active.iter().position(|a| a.pitch == note.pitch) {
            let prior = self.active.swap_remove(idx);
            out.emit(prior.note_off());
        }
        out.emit(ClockEvent::NoteOn {
            pitch: note.pitch,
            velocity: note.midi_velocity(),
            channel: note.channel(),
        });
        self.active.push(ActiveNote::from_note(note, loop_length));
    }

    fn wrap<W: EventWriter>(&mut self, out: &mut W) {
        self.active.retain_mut(|note| {
            if note.crosses_boundary {
                note.has_wrapped = true;
                true
            } else {
                out.emit(note.note_off());
                false
            }
        });
    }

    fn release<W: EventWriter>(&mut self, segment: Segment, out: &mut W) {
        self.active.retain(|note| {
            let ends = match (note.crosses_boundary, note.has_wrapped) {
                (true, false) => false,
                // Duration exactly fills the loop.
                (true, true) if note.end_time == 0.0 => true,
                _ => segment.releases(note.end_time),
            };
            if ends {
                out.emit(note.note_off());
            }
            !ends
        });
    }
}
