use clap::Parser;
use crossbeam::channel::{self, Receiver};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tempolock::driver::InternalClock;
use tempolock::midi::{self, MidiOutputSink};
use tempolock::{NoteFile, NoteFileWatcher, NoteSink, NullSink, Observers, SyncConfig, TransportController};

#[derive(Parser)]
#[command(name = "tempolock")]
#[command(about = "Plays a note list in lockstep with an external MIDI clock", long_about = None)]
struct Args {
    /// Note list to play (RON)
    #[arg(long, required_unless_present = "list_ports")]
    notes: Option<PathBuf>,

    /// Engine configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// MIDI clock input port, matched by substring (default: first port)
    #[arg(long)]
    clock_in: Option<String>,

    /// MIDI output port, matched by substring (default: first port)
    #[arg(long)]
    out: Option<String>,

    /// Play from an internal clock at this tempo instead of a MIDI clock
    #[arg(long)]
    internal_bpm: Option<f64>,

    /// List MIDI ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Reload the note list when the file changes
    #[arg(long)]
    watch: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list_ports {
        println!("MIDI inputs:");
        for (i, name) in midi::list_input_ports()?.iter().enumerate() {
            println!("  {}: {}", i, name);
        }
        println!("MIDI outputs:");
        for (i, name) in midi::list_output_ports()?.iter().enumerate() {
            println!("  {}: {}", i, name);
        }
        return Ok(());
    }

    let notes_path = args.notes.ok_or("--notes is required")?;
    let config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    let file = NoteFile::load(&notes_path)?;

    let sink: Box<dyn NoteSink> = match MidiOutputSink::connect(args.out.as_deref()) {
        Ok(sink) => Box::new(sink),
        Err(e) if args.out.is_none() => {
            tracing::warn!("no MIDI output, notes will not be sent: {}", e);
            Box::new(NullSink)
        }
        Err(e) => return Err(e.into()),
    };

    let observers = Observers::new()
        .on_bpm(|bpm| tracing::info!("tempo {} bpm", bpm))
        .on_running_change(|running| {
            tracing::info!("{}", if running { "playing" } else { "stopped" })
        })
        .on_position(|position| tracing::trace!("position {:.3}", position));

    let mut controller = TransportController::new(config, sink, observers);
    controller.set_notes(file.notes, file.loop_length);
    let kind = controller.start_driver()?;
    tracing::info!("engine driven by {:?} driver", kind);

    // Held for their lifetime; dropping either disconnects the clock.
    let internal_clock = match args.internal_bpm {
        Some(bpm) => Some(InternalClock::spawn(controller.clock_input(), bpm)?),
        None => None,
    };
    let _midi_clock = match &internal_clock {
        Some(_) => None,
        None => Some(midi::connect_clock_input(
            args.clock_in.as_deref(),
            controller.clock_input(),
        )?),
    };

    let (reload_rx, _watcher) = if args.watch {
        let (tx, rx) = channel::unbounded();
        let watcher = NoteFileWatcher::spawn(&notes_path, tx)?;
        (rx, Some(watcher))
    } else {
        (channel::never(), None)
    };

    let quit_rx = spawn_stdin_quit();
    let ticker = channel::tick(Duration::from_millis(1));
    println!("Playing. Press Enter to quit.");

    loop {
        crossbeam::select! {
            recv(quit_rx) -> _ => break,
            recv(reload_rx) -> file => {
                if let Ok(file) = file {
                    controller.set_notes(file.notes, file.loop_length);
                }
            }
            recv(ticker) -> _ => {
                controller.pump();
            }
        }
    }

    drop(internal_clock);
    controller.shutdown();
    let snapshot = controller.snapshot();
    if snapshot.dropped_events > 0 || snapshot.discontinuities > 0 {
        tracing::info!(
            "{} events dropped, {} clock discontinuities",
            snapshot.dropped_events,
            snapshot.discontinuities
        );
    }
    Ok(())
}

/// Fires once on Enter or end of input.
fn spawn_stdin_quit() -> Receiver<()> {
    let (tx, rx) = channel::bounded(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}
