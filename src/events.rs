use ringbuf::traits::Producer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const MIDI_CLOCK: u8 = 0xF8;
const MIDI_START: u8 = 0xFA;
const MIDI_CONTINUE: u8 = 0xFB;
const MIDI_STOP: u8 = 0xFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMessage {
    Tick,
    Start,
    Continue,
    Stop,
}

impl ClockMessage {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.first()? {
            &MIDI_CLOCK => Some(ClockMessage::Tick),
            &MIDI_START => Some(ClockMessage::Start),
            &MIDI_CONTINUE => Some(ClockMessage::Continue),
            &MIDI_STOP => Some(ClockMessage::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    NoteOn { pitch: u8, velocity: u8, channel: u8 },
    NoteOff { pitch: u8, channel: u8 },
    Position { position: f64, bpm: f64 },
}

pub trait EventWriter {
    fn emit(&mut self, event: ClockEvent);
}

impl EventWriter for Vec<ClockEvent> {
    fn emit(&mut self, event: ClockEvent) {
        self.push(event);
    }
}

pub type EventProducer = ringbuf::HeapProd<ClockEvent>;
pub type EventConsumer = ringbuf::HeapCons<ClockEvent>;

pub struct EventQueue {
    producer: EventProducer,
    dropped: Arc<AtomicU64>,
}

impl EventQueue {
    pub fn new(producer: EventProducer, dropped: Arc<AtomicU64>) -> Self {
        Self { producer, dropped }
    }
}

impl EventWriter for EventQueue {
    fn emit(&mut self, event: ClockEvent) {
        if self.producer.try_push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
