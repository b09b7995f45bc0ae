//! Render a ROM's audio offline into a wav file.
//!
//! Usage: dump_wav <rom> <output wav> [--seconds=N]

use std::env;
use std::fs;

use goodboy_core::apu::SAMPLE_RATE;
use goodboy_core::gameboy::GameBoy;
use goodboy_core::ppu::NullPixelSink;

const DEFAULT_SECONDS: f64 = 3.0;
const CLOCK_FREQ: u64 = 1_048_576;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let rom_path = args
        .next()
        .ok_or("expected <rom> <output wav> [--seconds=N]")?;
    let out_path = args
        .next()
        .ok_or("expected <rom> <output wav> [--seconds=N]")?;

    let mut seconds = DEFAULT_SECONDS;
    for arg in args {
        if let Some(value) = arg.strip_prefix("--seconds=") {
            seconds = value.parse()?;
        } else {
            return Err(format!("unrecognised flag: {arg}").into());
        }
    }

    let rom = fs::read(&rom_path)?;
    let mut gb = GameBoy::new(rom, None, Box::new(NullPixelSink))?;
    let consumer = gb.audio_consumer();

    let total_ticks = (seconds * CLOCK_FREQ as f64) as u64;
    let mut samples: Vec<i16> = Vec::new();
    for _ in 0..total_ticks {
        gb.tick();
        while let Some((left, right)) = consumer.pop_stereo() {
            samples.push(to_i16(left));
            samples.push(to_i16(right));
        }
    }

    fs::write(&out_path, wav_bytes(&samples))?;
    println!(
        "wrote {} ({} frames, {:.1}s)",
        out_path,
        samples.len() / 2,
        samples.len() as f64 / 2.0 / SAMPLE_RATE as f64
    );
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Minimal RIFF/WAVE container: 16-bit PCM, stereo, 48 kHz.
fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    const CHANNELS: u16 = 2;
    const BITS_PER_SAMPLE: u16 = 16;
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
