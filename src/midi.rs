//! MIDI clock input and note output through midir.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::error::{MidiError, SinkError};
use crate::sink::NoteSink;
use crate::transport::ClockInput;

const CLIENT_NAME: &str = "tempolock";
const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const ALL_NOTES_OFF: u8 = 123;

pub fn note_on_bytes(pitch: u8, velocity: u8, channel: u8) -> [u8; 3] {
    [NOTE_ON | (channel & 0x0F), pitch & 0x7F, velocity & 0x7F]
}

pub fn note_off_bytes(pitch: u8, channel: u8) -> [u8; 3] {
    [NOTE_OFF | (channel & 0x0F), pitch & 0x7F, 0]
}

pub fn all_notes_off_bytes(channel: u8) -> [u8; 3] {
    [CONTROL_CHANGE | (channel & 0x0F), ALL_NOTES_OFF, 0]
}

pub fn list_input_ports() -> Result<Vec<String>, MidiError> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    Ok(midi_in
        .ports()
        .iter()
        .map(|p| midi_in.port_name(p).unwrap_or_default())
        .collect())
}

pub fn list_output_ports() -> Result<Vec<String>, MidiError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_default())
        .collect())
}

fn select_port(names: &[String], wanted: Option<&str>) -> Option<usize> {
    match wanted {
        Some(wanted) => names.iter().position(|name| name.contains(wanted)),
        None => (!names.is_empty()).then_some(0),
    }
}

pub fn connect_clock_input(
    wanted: Option<&str>,
    input: ClockInput,
) -> Result<MidiInputConnection<()>, MidiError> {
    let mut midi_in = MidiInput::new(CLIENT_NAME)?;
    // Timing messages are exactly what we listen for.
    midi_in.ignore(Ignore::SysexAndActiveSense);

    let ports = midi_in.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|p| midi_in.port_name(p).unwrap_or_default())
        .collect();
    let index = select_port(&names, wanted)
        .ok_or_else(|| MidiError::PortNotFound(wanted.map(str::to_owned)))?;

    tracing::info!("clock input: {}", names[index]);
    midi_in
        .connect(
            &ports[index],
            "tempolock-clock",
            move |_timestamp, message, _| input.handle_bytes(message),
            (),
        )
        .map_err(|e| MidiError::Connect(e.to_string()))
}

pub struct MidiOutputSink {
    connection: Option<MidiOutputConnection>,
    port_name: String,
}

impl MidiOutputSink {
    pub fn connect(wanted: Option<&str>) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();
        let index = select_port(&names, wanted)
            .ok_or_else(|| MidiError::PortNotFound(wanted.map(str::to_owned)))?;

        let connection = midi_out
            .connect(&ports[index], "tempolock-out")
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        tracing::info!("note output: {}", names[index]);

        Ok(Self {
            connection: Some(connection),
            port_name: names[index].clone(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let connection = self.connection.as_mut().ok_or(SinkError::Disconnected)?;
        connection
            .send(bytes)
            .map_err(|e| SinkError::Send(e.to_string()))
    }
}

impl NoteSink for MidiOutputSink {
    fn note_on(&mut self, pitch: u8, velocity: u8, channel: u8) -> Result<(), SinkError> {
        self.send(&note_on_bytes(pitch, velocity, channel))
    }

    fn note_off(&mut self, pitch: u8, channel: u8) -> Result<(), SinkError> {
        self.send(&note_off_bytes(pitch, channel))
    }

    fn all_notes_off(&mut self) -> Result<(), SinkError> {
        // Keep going after a failure so one bad channel does not leave the
        // rest sounding.
        let mut result = Ok(());
        for channel in 0..16 {
            if let Err(e) = self.send(&all_notes_off_bytes(channel)) {
                result = Err(e);
            }
        }
        result
    }
}
