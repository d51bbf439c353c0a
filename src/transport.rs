use arc_swap::ArcSwap;
use parking_lot::Mutex;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::{DriverKind, SyncConfig};
use crate::driver::{AudioDriver, Driver, EnginePoller, TimerDriver};
use crate::error::DriverError;
use crate::events::{ClockEvent, ClockMessage, EventConsumer, EventQueue};
use crate::notes::{Note, NoteList};
use crate::sink::NoteSink;
use crate::timing::{ClockEngine, Command, EngineSnapshot, TimingChannel};

type PositionCallback = Box<dyn FnMut(f64) + Send>;
type BpmCallback = Box<dyn FnMut(u32) + Send>;
type RunningCallback = Box<dyn FnMut(bool) + Send>;

#[derive(Default)]
pub struct Observers {
    on_position: Option<PositionCallback>,
    on_bpm: Option<BpmCallback>,
    on_running_change: Option<RunningCallback>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_position(mut self, f: impl FnMut(f64) + Send + 'static) -> Self {
        self.on_position = Some(Box::new(f));
        self
    }

    pub fn on_bpm(mut self, f: impl FnMut(u32) + Send + 'static) -> Self {
        self.on_bpm = Some(Box::new(f));
        self
    }

    pub fn on_running_change(mut self, f: impl FnMut(bool) + Send + 'static) -> Self {
        self.on_running_change = Some(Box::new(f));
        self
    }
}

/// Safe to call from a MIDI callback thread.
#[derive(Clone)]
pub struct ClockInput {
    channel: Arc<TimingChannel>,
    enabled: Arc<AtomicBool>,
    transport_running: Arc<AtomicBool>,
}

impl ClockInput {
    fn new(channel: Arc<TimingChannel>) -> Self {
        Self {
            channel,
            enabled: Arc::new(AtomicBool::new(true)),
            transport_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self, message: ClockMessage) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        match message {
            ClockMessage::Tick => {
                if self.transport_running.load(Ordering::Acquire) {
                    self.channel.write_tick();
                }
            }
            ClockMessage::Start => {
                self.channel.reset_tick_count();
                self.transport_running.store(true, Ordering::Release);
                self.channel.write_command(Command::Start);
            }
            ClockMessage::Continue => {
                self.transport_running.store(true, Ordering::Release);
                self.channel.write_command(Command::Continue);
            }
            ClockMessage::Stop => {
                self.transport_running.store(false, Ordering::Release);
                self.channel.write_command(Command::Stop);
            }
        }
    }

    pub fn handle_bytes(&self, bytes: &[u8]) {
        if let Some(message) = ClockMessage::from_bytes(bytes) {
            self.handle(message);
        }
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn halt(&self) {
        self.transport_running.store(false, Ordering::Release);
        self.channel.write_command(Command::Stop);
    }
}

pub struct TransportController<S: NoteSink> {
    config: SyncConfig,
    input: ClockInput,
    notes: Arc<ArcSwap<NoteList>>,
    snapshot: Arc<Mutex<EngineSnapshot>>,
    dropped: Arc<AtomicU64>,
    consumer: Option<EventConsumer>,
    driver: Option<Driver>,
    sink: S,
    observers: Observers,
    last_running: bool,
    last_bpm: Option<u32>,
}

impl<S: NoteSink> TransportController<S> {
    pub fn new(config: SyncConfig, sink: S, observers: Observers) -> Self {
        Self {
            config,
            input: ClockInput::new(Arc::new(TimingChannel::new())),
            notes: Arc::new(ArcSwap::from_pointee(NoteList::empty())),
            snapshot: Arc::new(Mutex::new(EngineSnapshot::default())),
            dropped: Arc::new(AtomicU64::new(0)),
            consumer: None,
            driver: None,
            sink,
            observers,
            last_running: false,
            last_bpm: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock_input(&self) -> ClockInput {
        self.input.clone()
    }

    pub fn handle_message(&self, message: ClockMessage) {
        self.input.handle(message);
    }

    pub fn handle_midi_bytes(&self, bytes: &[u8]) {
        self.input.handle_bytes(bytes);
    }

    pub fn set_notes(&self, notes: Vec<Note>, loop_length: Option<f64>) -> usize {
        let list = NoteList::new(notes, loop_length, self.config.min_note_duration);
        let rejected = list.rejected();
        if rejected > 0 {
            tracing::warn!("dropped {} notes with invalid pitch or time", rejected);
        }
        tracing::debug!(
            "note list replaced: {} notes, loop {}",
            list.len(),
            list.loop_length()
        );
        self.notes.store(Arc::new(list));
        rejected
    }

    /// While disabled, clock messages are ignored and note-ons are not
    /// dispatched; note-offs still are.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.input.is_enabled() {
            return;
        }
        self.input.set_enabled(enabled);
        if !enabled {
            self.input.halt();
            self.panic();
        }
        tracing::info!("clock sync {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.input.is_enabled()
    }

    pub fn is_running(&self) -> bool {
        self.input.channel.is_running()
    }

    pub fn reset_input(&self) {
        self.input.channel.reset_tick_count();
        self.input.halt();
        tracing::debug!("clock input reset");
    }

    pub fn attach_poller(&mut self, units_per_second: f64) -> EnginePoller {
        let (producer, consumer) = HeapRb::<ClockEvent>::new(self.config.event_capacity.max(1)).split();
        self.consumer = Some(consumer);
        EnginePoller::new(
            ClockEngine::new(&self.config, units_per_second),
            self.input.channel.clone(),
            self.notes.clone(),
            EventQueue::new(producer, self.dropped.clone()),
            self.snapshot.clone(),
        )
    }

    pub fn start_driver(&mut self) -> Result<DriverKind, DriverError> {
        self.driver = None;

        if matches!(self.config.driver, DriverKind::Auto | DriverKind::Audio) {
            match AudioDriver::start(|sample_rate| self.attach_poller(sample_rate)) {
                Ok(driver) => {
                    self.driver = Some(Driver::Audio(driver));
                    return Ok(DriverKind::Audio);
                }
                Err(e) if self.config.driver == DriverKind::Auto => {
                    tracing::warn!("audio clock driver unavailable, using timer: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let poller = self.attach_poller(TimerDriver::UNITS_PER_SECOND);
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        self.driver = Some(Driver::Timer(TimerDriver::start(poller, interval)?));
        Ok(DriverKind::Timer)
    }

    pub fn driver_kind(&self) -> Option<DriverKind> {
        self.driver.as_ref().map(Driver::kind)
    }

    pub fn pump(&mut self) -> usize {
        let enabled = self.input.is_enabled();
        let mut count = 0;

        if let Some(consumer) = self.consumer.as_mut() {
            while let Some(event) = consumer.try_pop() {
                count += 1;
                match event {
                    ClockEvent::NoteOn {
                        pitch,
                        velocity,
                        channel,
                    } => {
                        if !enabled {
                            continue;
                        }
                        if let Err(e) = self.sink.note_on(pitch, velocity, channel) {
                            tracing::warn!("note-on {} failed: {}", pitch, e);
                        }
                    }
                    ClockEvent::NoteOff { pitch, channel } => {
                        if let Err(e) = self.sink.note_off(pitch, channel) {
                            tracing::warn!("note-off {} failed: {}", pitch, e);
                        }
                    }
                    ClockEvent::Position { position, bpm } => {
                        if !enabled {
                            continue;
                        }
                        if let Some(f) = self.observers.on_position.as_mut() {
                            f(position);
                        }
                        let rounded = bpm.round() as u32;
                        if self.last_bpm != Some(rounded) {
                            self.last_bpm = Some(rounded);
                            tracing::debug!("tempo {} bpm", rounded);
                            if let Some(f) = self.observers.on_bpm.as_mut() {
                                f(rounded);
                            }
                        }
                    }
                }
            }
        }

        let running = self.is_running();
        if running != self.last_running {
            self.last_running = running;
            tracing::debug!("transport {}", if running { "running" } else { "stopped" });
            if let Some(f) = self.observers.on_running_change.as_mut() {
                f(running);
            }
        }

        count
    }

    pub fn panic(&mut self) {
        if let Err(e) = self.sink.all_notes_off() {
            tracing::warn!("all-notes-off failed: {}", e);
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut snapshot = *self.snapshot.lock();
        snapshot.dropped_events = self.dropped.load(Ordering::Relaxed);
        snapshot
    }

    pub fn shutdown(&mut self) {
        self.set_enabled(false);
        self.driver = None;
        self.pump();
        self.consumer = None;
        tracing::info!("transport shut down");
    }
}
