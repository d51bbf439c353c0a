use arc_swap::ArcSwap;
use std::sync::Arc;

use super::activation::NoteActivationEngine;
use super::channel::{Command, TimingChannel};
use super::position::{PositionTracker, TickDelta};
use super::reconcile::NoteSetReconciler;
use super::tempo::TempoEstimator;
use crate::config::SyncConfig;
use crate::events::{ClockEvent, EventWriter};
use crate::notes::NoteList;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineSnapshot {
    pub running: bool,
    pub bpm: f64,
    pub position: f64,
    pub active_notes: usize,
    pub discontinuities: u64,
    pub dropped_events: u64,
}

/// The clock-synchronized scheduler, independent of what drives it. Nothing
/// here blocks.
pub struct ClockEngine {
    tempo: TempoEstimator,
    tracker: PositionTracker,
    activation: NoteActivationEngine,
    reconciler: NoteSetReconciler,
    notes: Arc<NoteList>,
    running: bool,
    discontinuities: u64,
}

impl ClockEngine {
    pub fn new(config: &SyncConfig, units_per_second: f64) -> Self {
        Self {
            tempo: TempoEstimator::new(
                units_per_second,
                config.tempo_smoothing,
                config.default_bpm,
            ),
            tracker: PositionTracker::new(config.time_unit, config.discontinuity_threshold),
            activation: NoteActivationEngine::new(),
            reconciler: NoteSetReconciler::new(config.reconcile_epsilon),
            notes: Arc::new(NoteList::empty()),
            running: false,
            discontinuities: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn position(&self) -> f64 {
        self.tracker.position()
    }

    pub fn notes(&self) -> &Arc<NoteList> {
        &self.notes
    }

    pub fn active_notes(&self) -> &[super::activation::ActiveNote] {
        self.activation.active()
    }

    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            running: self.running,
            bpm: self.tempo.bpm(),
            position: self.tracker.position(),
            active_notes: self.activation.active().len(),
            discontinuities: self.discontinuities,
            dropped_events: 0,
        }
    }

    pub fn poll<W: EventWriter>(
        &mut self,
        channel: &TimingChannel,
        notes: &ArcSwap<NoteList>,
        now: f64,
        out: &mut W,
    ) {
        let command = channel.take_command();
        if command != Command::None {
            self.apply_command(command, out);
            channel.set_running(self.running);
        }

        let latest = notes.load();
        if !Arc::ptr_eq(&*latest, &self.notes) {
            self.set_notes(Arc::clone(&*latest), out);
        }

        if self.running {
            self.tick(channel.read_tick_count(), now, out);
        }
    }

    pub fn apply_command<W: EventWriter>(&mut self, command: Command, out: &mut W) {
        match command {
            Command::Start => {
                self.activation.restart(out);
                self.tracker.reset();
                self.tracker.set_loop_length(self.notes.loop_length());
                self.tempo.reset();
                self.running = true;
            }
            Command::Continue => {
                // The pause must not be measured as one long pulse interval.
                self.tempo.reset();
                self.running = true;
            }
            Command::Stop => {
                self.activation.panic(out);
                self.running = false;
            }
            Command::None => {}
        }
    }

    /// While stopped the timeline goes back to 0 so notes at time 0 are
    /// caught by the next start.
    pub fn set_notes<W: EventWriter>(&mut self, notes: Arc<NoteList>, out: &mut W) {
        self.tracker.set_loop_length(notes.loop_length());
        if self.running {
            let position = self.tracker.position();
            self.reconciler
                .reconcile(self.activation.active_mut(), &notes, position, out);
        } else {
            self.activation.restart(out);
            self.tracker.rewind();
        }
        self.notes = notes;
    }

    pub fn tick<W: EventWriter>(&mut self, tick_count: u32, now: f64, out: &mut W) {
        match self.tracker.delta(tick_count) {
            TickDelta::Idle => {}
            TickDelta::Discontinuity => {
                self.discontinuities += 1;
                self.tempo.resync(now);
            }
            TickDelta::Advance(ticks) => self.advance(ticks, now, out),
        }
    }

    fn advance<W: EventWriter>(&mut self, ticks: u32, now: f64, out: &mut W) {
        // Tempo first, so the delta is converted with the fresh estimate.
        let bpm = self.tempo.observe(ticks, now);
        let step = self.tracker.advance(ticks, bpm);
        self.activation.process(&self.notes, step, out);
        out.emit(ClockEvent::Position {
            position: step.current,
            bpm,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeUnit;
    use crate::notes::Note;

    fn beats_engine() -> ClockEngine {
        let config = SyncConfig {
            time_unit: TimeUnit::Beats,
            ..SyncConfig::default()
        };
        ClockEngine::new(&config, 1000.0)
    }

    fn note_events(events: &[ClockEvent]) -> Vec<ClockEvent> {
        events
            .iter()
            .copied()
            .filter(|e| !matches!(e, ClockEvent::Position { .. }))
            .collect()
    }

    #[test]
    fn poll_applies_start_and_publishes_running() {
        let channel = TimingChannel::new();
        let notes = ArcSwap::from_pointee(NoteList::empty());
        let mut engine = beats_engine();
        let mut events = Vec::new();

        channel.write_command(Command::Start);
        engine.poll(&channel, &notes, 0.0, &mut events);
        assert!(engine.is_running());
        assert!(channel.is_running());

        channel.write_command(Command::Stop);
        engine.poll(&channel, &notes, 1.0, &mut events);
        assert!(!channel.is_running());
    }

    #[test]
    fn ticks_are_ignored_while_stopped() {
        let channel = TimingChannel::new();
        let notes = ArcSwap::from_pointee(NoteList::new(
            vec![Note::new(60, 0.0, 1.0, 1.0)],
            Some(4.0),
            0.005,
        ));
        let mut engine = beats_engine();
        let mut events = Vec::new();

        channel.write_tick();
        engine.poll(&channel, &notes, 0.0, &mut events);
        assert!(note_events(&events).is_empty());
        assert_eq!(engine.position(), 0.0);
    }

    #[test]
    fn replaced_list_is_picked_up_by_pointer() {
        let channel = TimingChannel::new();
        let notes = ArcSwap::from_pointee(NoteList::empty());
        let mut engine = beats_engine();
        let mut events = Vec::new();
        engine.poll(&channel, &notes, 0.0, &mut events);

        notes.store(Arc::new(NoteList::new(
            vec![Note::new(60, 0.0, 2.0, 1.0)],
            None,
            0.005,
        )));
        engine.poll(&channel, &notes, 1.0, &mut events);
        assert_eq!(engine.notes().len(), 1);
        assert_eq!(engine.notes().loop_length(), 2.0);
    }

    #[test]
    fn discontinuity_counts_and_does_not_move() {
        let mut engine = beats_engine();
        let mut events = Vec::new();
        engine.apply_command(Command::Start, &mut events);

        engine.tick(10, 10.0, &mut events);
        let position = engine.position();
        events.clear();

        engine.tick(5, 20.0, &mut events);
        engine.tick(505, 30.0, &mut events);
        assert!(events.is_empty());
        assert_eq!(engine.position(), position);
        assert_eq!(engine.discontinuities(), 2);
    }

    #[test]
    fn each_tick_batch_publishes_position() {
        let mut engine = beats_engine();
        let mut events = Vec::new();
        engine.apply_command(Command::Start, &mut events);
        engine.tick(12, 250.0, &mut events);

        match events.last() {
            Some(ClockEvent::Position { position, bpm }) => {
                assert!((position - 0.5).abs() < 1e-12);
                assert!(bpm.is_finite());
            }
            other => panic!("expected a position event, got {other:?}"),
        }
    }

    #[test]
    fn stop_releases_sounding_notes() {
        let mut engine = beats_engine();
        let mut events = Vec::new();
        engine.set_notes(
            Arc::new(NoteList::new(
                vec![Note::new(60, 0.0, 3.0, 1.0), Note::new(64, 0.25, 3.0, 1.0)],
                Some(4.0),
                0.005,
            )),
            &mut events,
        );
        engine.apply_command(Command::Start, &mut events);
        engine.tick(12, 250.0, &mut events);
        assert_eq!(engine.active_notes().len(), 2);

        events.clear();
        engine.apply_command(Command::Stop, &mut events);
        assert_eq!(
            events,
            vec![
                ClockEvent::NoteOff { pitch: 60, channel: 0 },
                ClockEvent::NoteOff { pitch: 64, channel: 0 },
            ]
        );
        assert!(engine.active_notes().is_empty());
    }

    #[test]
    fn continue_resumes_in_place() {
        let mut engine = beats_engine();
        let mut events = Vec::new();
        engine.apply_command(Command::Start, &mut events);
        engine.tick(24, 500.0, &mut events);
        engine.apply_command(Command::Stop, &mut events);
        engine.apply_command(Command::Continue, &mut events);
        engine.tick(36, 5000.0, &mut events);
        assert!((engine.position() - 1.5).abs() < 1e-12);
    }
}
