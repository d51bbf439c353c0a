use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::EnginePoller;
use crate::error::DriverError;

/// Polls the engine once per audio block; timestamps are elapsed frames.
pub struct AudioDriver {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioDriver {
    pub fn start(make_poller: impl FnOnce(f64) -> EnginePoller) -> Result<Self, DriverError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DriverError::Unavailable("no audio output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;

        let sample_rate = config.sample_rate();
        let stream_config: cpal::StreamConfig = config.into();
        let num_channels = (stream_config.channels as usize).max(1);

        let mut poller = make_poller(sample_rate as f64);
        let mut elapsed_frames: u64 = 0;

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                data.fill(0.0);
                poller.poll(elapsed_frames as f64);
                elapsed_frames += (data.len() / num_channels) as u64;
            },
            |err| tracing::warn!("audio stream error: {}", err),
            None,
        )?;
        stream.play()?;

        tracing::info!(
            "audio clock driver running: {} channels, {} Hz",
            num_channels,
            sample_rate
        );

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
