use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tempolock::driver::{EnginePoller, InternalClock};
use tempolock::error::SinkError;
use tempolock::{
    ClockMessage, Note, NoteSink, Observers, SyncConfig, TimeUnit, TransportController,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum SinkCall {
    On(u8),
    Off(u8),
    AllOff,
}

#[derive(Default)]
struct RecordingSink {
    calls: Vec<SinkCall>,
}

impl RecordingSink {
    fn ons(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::On(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn offs(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Off(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl NoteSink for RecordingSink {
    fn note_on(&mut self, pitch: u8, _velocity: u8, _channel: u8) -> Result<(), SinkError> {
        self.calls.push(SinkCall::On(pitch));
        Ok(())
    }

    fn note_off(&mut self, pitch: u8, _channel: u8) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Off(pitch));
        Ok(())
    }

    fn all_notes_off(&mut self) -> Result<(), SinkError> {
        self.calls.push(SinkCall::AllOff);
        Ok(())
    }
}

/// Every send fails, as with an unplugged device.
#[derive(Default)]
struct UnpluggedSink {
    attempts: usize,
}

impl NoteSink for UnpluggedSink {
    fn note_on(&mut self, _pitch: u8, _velocity: u8, _channel: u8) -> Result<(), SinkError> {
        self.attempts += 1;
        Err(SinkError::Disconnected)
    }

    fn note_off(&mut self, _pitch: u8, _channel: u8) -> Result<(), SinkError> {
        self.attempts += 1;
        Err(SinkError::Disconnected)
    }

    fn all_notes_off(&mut self) -> Result<(), SinkError> {
        self.attempts += 1;
        Err(SinkError::Disconnected)
    }
}

const MS_PER_TICK: f64 = 20.0;

fn beats_config() -> SyncConfig {
    SyncConfig {
        time_unit: TimeUnit::Beats,
        ..SyncConfig::default()
    }
}

fn chord() -> Vec<Note> {
    vec![
        Note::new(60, 0.0, 3.0, 0.8),
        Note::new(64, 0.1, 3.0, 0.8),
        Note::new(67, 0.2, 3.0, 0.8),
    ]
}

fn setup<S: NoteSink>(
    config: SyncConfig,
    sink: S,
    observers: Observers,
) -> (TransportController<S>, EnginePoller) {
    let mut controller = TransportController::new(config, sink, observers);
    let poller = controller.attach_poller(1000.0);
    (controller, poller)
}

/// Sends `count` clock pulses, polling after each one.
fn pulse<S: NoteSink>(
    controller: &TransportController<S>,
    poller: &mut EnginePoller,
    clock: &mut f64,
    count: usize,
) {
    for _ in 0..count {
        controller.handle_message(ClockMessage::Tick);
        *clock += MS_PER_TICK;
        poller.poll(*clock);
    }
}

#[test]
fn plays_notes_from_clock_messages() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_midi_bytes(&[0xFA]);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);
    controller.pump();

    assert_eq!(controller.sink().ons(), vec![60, 64, 67]);
    assert!(controller.is_running());
    let snapshot = controller.snapshot();
    assert!(snapshot.running);
    assert_eq!(snapshot.active_notes, 3);
}

#[test]
fn stop_panics_every_active_pitch() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);

    controller.handle_message(ClockMessage::Stop);
    poller.poll(clock + 1.0);
    controller.pump();

    let mut offs = controller.sink().offs();
    offs.sort_unstable();
    assert_eq!(offs, vec![60, 64, 67]);
    assert!(!controller.is_running());
    assert_eq!(controller.snapshot().active_notes, 0);
}

#[test]
fn resending_the_same_notes_is_silent() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);
    controller.pump();
    let before = controller.sink().calls.len();

    controller.set_notes(chord(), Some(4.0));
    poller.poll(clock);
    controller.set_notes(chord(), Some(4.0));
    poller.poll(clock);
    controller.pump();

    assert_eq!(controller.sink().calls.len(), before);
}

#[test]
fn removed_note_is_released_on_replacement() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);

    let mut edited = chord();
    edited.retain(|n| n.pitch != 64);
    controller.set_notes(edited, Some(4.0));
    poller.poll(clock);
    controller.pump();

    assert_eq!(controller.sink().offs(), vec![64]);
    assert_eq!(controller.snapshot().active_notes, 2);
}

#[test]
fn disabling_silences_and_suppresses_note_ons() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(vec![Note::new(60, 0.0, 3.0, 0.8)], Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    // The note-on is decided but not yet dispatched when sync is disabled.
    pulse(&controller, &mut poller, &mut clock, 1);
    controller.set_enabled(false);
    poller.poll(clock + 1.0);
    controller.pump();

    assert_eq!(controller.sink().calls, vec![SinkCall::AllOff, SinkCall::Off(60)]);
    assert!(!controller.is_running());

    // Clock messages are ignored until re-enabled.
    controller.handle_message(ClockMessage::Start);
    poller.poll(clock + 2.0);
    assert!(!controller.is_running());

    controller.set_enabled(true);
    controller.handle_message(ClockMessage::Start);
    poller.poll(clock + 3.0);
    assert!(controller.is_running());
}

#[test]
fn continue_resumes_where_stop_left_off() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(vec![Note::new(72, 1.5, 0.25, 0.8)], Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 24);
    controller.handle_message(ClockMessage::Stop);
    poller.poll(clock);

    // Pulses while stopped do not move the timeline.
    pulse(&controller, &mut poller, &mut clock, 24);
    controller.handle_message(ClockMessage::Continue);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 14);
    controller.pump();

    assert_eq!(controller.sink().ons(), vec![72]);
    let position = controller.snapshot().position;
    assert!((position - 38.0 / 24.0).abs() < 1e-9, "got {position}");
}

#[test]
fn sink_failures_do_not_disturb_scheduling() {
    let (mut controller, mut poller) = setup(beats_config(), UnpluggedSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);
    assert!(controller.pump() > 0);
    assert_eq!(controller.snapshot().active_notes, 3);

    controller.handle_message(ClockMessage::Stop);
    poller.poll(clock);
    controller.pump();
    assert_eq!(controller.sink().attempts, 6);
    assert_eq!(controller.snapshot().active_notes, 0);
}

#[test]
fn observers_see_tempo_position_and_transport() {
    let running = Arc::new(Mutex::new(Vec::new()));
    let bpms = Arc::new(Mutex::new(Vec::new()));
    let positions = Arc::new(Mutex::new(0usize));
    let observers = {
        let running = running.clone();
        let bpms = bpms.clone();
        let positions = positions.clone();
        Observers::new()
            .on_running_change(move |r| running.lock().push(r))
            .on_bpm(move |b| bpms.lock().push(b))
            .on_position(move |_| *positions.lock() += 1)
    };
    let (mut controller, mut poller) = setup(SyncConfig::default(), RecordingSink::default(), observers);
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 48);
    controller.pump();
    controller.handle_message(ClockMessage::Stop);
    poller.poll(clock);
    controller.pump();

    assert_eq!(*running.lock(), vec![true, false]);
    // 20 ms per pulse is 125 BPM.
    assert_eq!(bpms.lock().last().copied(), Some(125));
    assert_eq!(*positions.lock(), 48);
}

#[test]
fn full_event_ring_counts_drops() {
    let config = SyncConfig {
        event_capacity: 4,
        ..beats_config()
    };
    let (mut controller, mut poller) = setup(config, RecordingSink::default(), Observers::new());
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 10);

    assert_eq!(controller.snapshot().dropped_events, 6);
    assert_eq!(controller.pump(), 4);
}

#[test]
fn reset_input_stops_the_engine() {
    let (mut controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    controller.set_notes(chord(), Some(4.0));
    let mut clock = 0.0;

    controller.handle_message(ClockMessage::Start);
    poller.poll(clock);
    pulse(&controller, &mut poller, &mut clock, 12);

    controller.reset_input();
    poller.poll(clock);
    controller.pump();
    assert!(!controller.is_running());
    assert_eq!(controller.sink().offs().len(), 3);
}

#[test]
fn internal_clock_starts_and_stops_the_engine() {
    let (controller, mut poller) = setup(beats_config(), RecordingSink::default(), Observers::new());
    let clock = InternalClock::spawn(controller.clock_input(), 240.0).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    poller.poll(50.0);
    assert!(controller.is_running());
    assert!(poller.engine().position() > 0.0);

    drop(clock);
    poller.poll(100.0);
    assert!(!controller.is_running());
}
