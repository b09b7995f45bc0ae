//! Bounded queue of stereo f32 frames between the APU and the host audio
//! thread.
//!
//! Single producer (the emulation thread appending from [`crate::apu::Apu`]),
//! single consumer (the host audio callback). The queue is guarded by a mutex
//! with short critical sections; when the producer outruns the consumer past
//! the capacity, the entire backlog is dropped and filling resumes (an
//! audible glitch, preferred over unbounded growth).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Maximum buffered frames before the backlog is dropped.
pub const MAX_QUEUED_FRAMES: usize = 1000;

/// Bytes per stereo frame in [`AudioConsumer::read`]: two little-endian
/// IEEE-754 f32 samples.
pub const BYTES_PER_FRAME: usize = 8;

struct Inner {
    frames: Mutex<VecDeque<[f32; 2]>>,
    capacity: usize,
}

/// Producer half, held by the APU.
pub struct AudioProducer {
    inner: Arc<Inner>,
}

/// Consumer half, held by the host audio thread.
#[derive(Clone)]
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

/// Create a connected producer/consumer pair.
pub fn audio_queue(capacity_frames: usize) -> (AudioProducer, AudioConsumer) {
    let inner = Arc::new(Inner {
        frames: Mutex::new(VecDeque::with_capacity(capacity_frames + 1)),
        capacity: capacity_frames,
    });
    (
        AudioProducer {
            inner: Arc::clone(&inner),
        },
        AudioConsumer { inner },
    )
}

impl AudioProducer {
    pub fn push_stereo(&self, left: f32, right: f32) {
        let mut frames = self.inner.frames.lock().unwrap();
        if frames.len() > self.inner.capacity {
            frames.clear();
        }
        frames.push_back([left, right]);
    }

    pub fn len(&self) -> usize {
        self.inner.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioConsumer {
    /// Pop one stereo frame, if buffered.
    pub fn pop_stereo(&self) -> Option<(f32, f32)> {
        self.inner
            .frames
            .lock()
            .unwrap()
            .pop_front()
            .map(|[l, r]| (l, r))
    }

    /// Fill `buf` with interleaved stereo frames as little-endian f32 pairs,
    /// 8 bytes per frame. Returns the number of bytes written; 0 when no
    /// samples are buffered (the host should retry).
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut frames = self.inner.frames.lock().unwrap();
        let mut written = 0;
        while written + BYTES_PER_FRAME <= buf.len() {
            let Some([left, right]) = frames.pop_front() else {
                break;
            };
            buf[written..written + 4].copy_from_slice(&left.to_le_bytes());
            buf[written + 4..written + 8].copy_from_slice(&right.to_le_bytes());
            written += BYTES_PER_FRAME;
        }
        written
    }

    pub fn len(&self) -> usize {
        self.inner.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
