use crate::error::SinkError;

pub trait NoteSink {
    fn note_on(&mut self, pitch: u8, velocity: u8, channel: u8) -> Result<(), SinkError>;
    fn note_off(&mut self, pitch: u8, channel: u8) -> Result<(), SinkError>;
    fn all_notes_off(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Default)]
pub struct NullSink;

impl NoteSink for NullSink {
    fn note_on(&mut self, _pitch: u8, _velocity: u8, _channel: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn note_off(&mut self, _pitch: u8, _channel: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn all_notes_off(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: NoteSink + ?Sized> NoteSink for Box<S> {
    fn note_on(&mut self, pitch: u8, velocity: u8, channel: u8) -> Result<(), SinkError> {
        (**self).note_on(pitch, velocity, channel)
    }

    fn note_off(&mut self, pitch: u8, channel: u8) -> Result<(), SinkError> {
        (**self).note_off(pitch, channel)
    }

    fn all_notes_off(&mut self) -> Result<(), SinkError> {
        (**self).all_notes_off()
    }
}
