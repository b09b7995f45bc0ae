//! Audio playback through `cpal`, draining the core's sample queue.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use goodboy_core::apu::SAMPLE_RATE;
use goodboy_core::audio_queue::AudioConsumer;
use log::warn;

/// Start an output stream fed from the APU's sample queue.
///
/// Returns the active [`cpal::Stream`] if a device could be opened; audio is
/// skipped otherwise (the core keeps running either way).
pub fn start_stream(consumer: AudioConsumer) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| warn!("audio stream error: {err}");
    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _| {
            for frame in data.chunks_mut(2) {
                // Underruns play silence; the host retries on the next pull.
                let (left, right) = consumer.pop_stereo().unwrap_or((0.0, 0.0));
                frame[0] = left;
                if frame.len() > 1 {
                    frame[1] = right;
                }
            }
        },
        err_fn,
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("no audio output: {e}");
            return None;
        }
    };

    if let Err(e) = stream.play() {
        warn!("failed to start audio stream: {e}");
        return None;
    }
    Some(stream)
}
