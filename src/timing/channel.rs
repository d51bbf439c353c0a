use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// The tick counter is reset to 0 once it passes this value. Consumers see
/// the reset as a negative delta and resynchronize.
pub const TICK_COUNTER_CEILING: u32 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    None = 0,
    Start = 1,
    Stop = 2,
    Continue = 3,
}

impl Command {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Command::Start,
            2 => Command::Stop,
            3 => Command::Continue,
            _ => Command::None,
        }
    }
}

/// Memory shared between the control context and the real-time context.
///
/// Three independent cells, each touched only by single atomic operations.
/// No operation reads two cells and relies on a combined invariant, so no
/// cross-cell ordering is needed: the tick counter is relaxed, the command
/// and running cells are sequentially consistent per cell.
#[derive(Debug)]
pub struct TimingChannel {
    tick_count: AtomicU32,
    command: AtomicU8,
    running: AtomicBool,
}

impl Default for TimingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingChannel {
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU32::new(0),
            command: AtomicU8::new(Command::None as u8),
            running: AtomicBool::new(false),
        }
    }

    pub fn write_tick(&self) -> u32 {
        let count = self.tick_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if count > TICK_COUNTER_CEILING {
            self.tick_count.store(0, Ordering::Relaxed);
            return 0;
        }
        count
    }

    pub fn read_tick_count(&self) -> u32 {
        self.tick_count.load(Ordering::Relaxed)
    }

    pub fn reset_tick_count(&self) {
        self.tick_count.store(0, Ordering::Relaxed);
    }

    pub fn write_command(&self, command: Command) {
        self.command.store(command as u8, Ordering::SeqCst);
    }

    /// Consumer side: returns the pending command and clears the slot in one
    /// exchange, so each write is observed by exactly one call.
    pub fn take_command(&self) -> Command {
        Command::from_raw(self.command.swap(Command::None as u8, Ordering::SeqCst))
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
