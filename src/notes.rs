use serde::{Deserialize, Serialize};

pub const MAX_PITCH: u8 = 127;
pub const MAX_CHANNEL: u8 = 15;
pub const DEFAULT_MIN_DURATION: f64 = 0.005;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub time: f64,
    pub duration: f64,
    pub velocity: f64,
    #[serde(default)]
    pub channel: Option<u8>,
}

impl Note {
    pub fn new(pitch: u8, time: f64, duration: f64, velocity: f64) -> Self {
        Self {
            pitch,
            time,
            duration,
            velocity,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    pub fn midi_velocity(&self) -> u8 {
        (self.velocity * 127.0).round().clamp(0.0, 127.0) as u8
    }

    pub fn channel(&self) -> u8 {
        self.channel.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteList {
    notes: Vec<Note>,
    loop_length: f64,
    rejected: usize,
}

impl NoteList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(notes: Vec<Note>, loop_length: Option<f64>, min_duration: f64) -> Self {
        let min_duration = if min_duration.is_finite() && min_duration > 0.0 {
            min_duration
        } else {
            DEFAULT_MIN_DURATION
        };
        let total = notes.len();
        let notes: Vec<Note> = notes
            .into_iter()
            .filter(|n| n.time.is_finite() && n.time >= 0.0 && n.pitch <= MAX_PITCH)
            .map(|mut n| {
                if !n.duration.is_finite() || n.duration < min_duration {
                    n.duration = min_duration;
                }
                n.velocity = if n.velocity.is_nan() {
                    0.0
                } else {
                    n.velocity.clamp(0.0, 1.0)
                };
                n.channel = n.channel.map(|c| c.min(MAX_CHANNEL));
                n
            })
            .collect();
        let rejected = total - notes.len();

        let loop_length = match loop_length {
            Some(len) if len.is_finite() && len > 0.0 => len,
            _ => notes.iter().map(Note::end).fold(0.0, f64::max),
        };

        Self {
            notes,
            loop_length,
            rejected,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn loop_length(&self) -> f64 {
        self.loop_length
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_length_defaults_to_latest_note_end() {
        let list = NoteList::new(
            vec![Note::new(60, 0.0, 1.0, 0.8), Note::new(64, 2.5, 1.0, 0.8)],
            None,
            0.005,
        );
        assert_eq!(list.loop_length(), 3.5);

        let list = NoteList::new(vec![Note::new(60, 0.0, 1.0, 0.8)], Some(-2.0), 0.005);
        assert_eq!(list.loop_length(), 1.0);

        let list = NoteList::new(vec![Note::new(60, 0.0, 1.0, 0.8)], Some(4.0), 0.005);
        assert_eq!(list.loop_length(), 4.0);
    }

    #[test]
    fn malformed_notes_are_dropped_or_clamped() {
        let list = NoteList::new(
            vec![
                Note::new(60, f64::NAN, 1.0, 0.5),
                Note::new(61, -0.5, 1.0, 0.5),
                Note::new(200, 0.0, 1.0, 0.5),
                Note::new(62, 1.0, 0.0, 0.5),
                Note::new(63, 1.0, f64::NAN, 2.0),
                Note::new(64, 1.0, -3.0, f64::NAN).with_channel(40),
            ],
            Some(4.0),
            0.005,
        );

        assert_eq!(list.rejected(), 3);
        assert_eq!(list.len(), 3);
        for note in list.notes() {
            assert_eq!(note.duration, 0.005);
        }
        assert_eq!(list.notes()[1].velocity, 1.0);
        assert_eq!(list.notes()[2].velocity, 0.0);
        assert_eq!(list.notes()[2].channel(), 15);
    }

    #[test]
    fn unusable_floor_still_raises_short_notes() {
        for floor in [f64::NAN, 0.0, -1.0] {
            let list = NoteList::new(vec![Note::new(60, 0.0, 0.0, 1.0)], None, floor);
            assert_eq!(list.notes()[0].duration, DEFAULT_MIN_DURATION);
        }
    }

    #[test]
    fn empty_list_does_not_loop() {
        let list = NoteList::new(Vec::new(), None, 0.005);
        assert_eq!(list.loop_length(), 0.0);
        assert!(list.is_empty());
    }

    #[test]
    fn velocity_maps_to_midi_range() {
        assert_eq!(Note::new(60, 0.0, 1.0, 1.0).midi_velocity(), 127);
        assert_eq!(Note::new(60, 0.0, 1.0, 0.5).midi_velocity(), 64);
        assert_eq!(Note::new(60, 0.0, 1.0, 0.0).midi_velocity(), 0);
    }
}
