//! Lock-free ring buffer for audio data
//!
//! Single producer (the audio callback) and single consumer (the processing
//! thread). The producer never waits: when the ring is full the oldest
//! samples are overwritten, and the consumer always takes the newest frame.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Attempts at copying a frame before giving up on a lapping producer
const MAX_READ_ATTEMPTS: usize = 3;

/// How multi-channel input is folded to mono before entering the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownmixPolicy {
    /// Arithmetic mean of all channels
    #[default]
    Average,

    /// Channel 0 only, other channels are ignored
    First,
}

impl DownmixPolicy {
    /// Fold one interleaved frame (one sample per channel) to mono
    #[inline]
    pub fn mix(self, frame: &[f32]) -> f32 {
        match self {
            DownmixPolicy::Average => {
                if frame.is_empty() {
                    0.0
                } else {
                    frame.iter().sum::<f32>() / frame.len() as f32
                }
            }
            DownmixPolicy::First => frame.first().copied().unwrap_or(0.0),
        }
    }
}

/// Why a frame could not be read this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    /// Fewer samples than one frame have been written so far
    Underrun { available: usize, needed: usize },

    /// Nothing new arrived since the previous frame was read. Only reported
    /// when the reader skips repeated frames.
    Stale,

    /// The producer kept lapping the reader while it copied
    Overrun,
}

/// Storage shared by both ends
struct SampleRing {
    /// f32 samples stored as raw bits
    slots: Box<[AtomicU32]>,

    /// Total samples published to the reader
    written: AtomicU64,

    /// Upper bound of the sample indices the producer may be touching.
    /// Raised before any slot of a write is stored.
    reserved: AtomicU64,
}

impl SampleRing {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, index: u64) -> &AtomicU32 {
        &self.slots[(index % self.slots.len() as u64) as usize]
    }
}

/// Mono sample ring with its inbound channel layout
pub struct AudioRingBuffer {
    ring: Arc<SampleRing>,
    channels: usize,
    downmix: DownmixPolicy,
}

impl AudioRingBuffer {
    /// Create new ring buffer
    ///
    /// # Arguments
    /// * `capacity` - Buffer capacity in mono samples (at least 1)
    /// * `channels` - Channel count of the inbound stream (at least 1)
    /// * `downmix` - How channels are folded to mono
    pub fn new(capacity: usize, channels: usize, downmix: DownmixPolicy) -> Self {
        let slots: Box<[AtomicU32]> = (0..capacity.max(1))
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect();

        Self {
            ring: Arc::new(SampleRing {
                slots,
                written: AtomicU64::new(0),
                reserved: AtomicU64::new(0),
            }),
            channels: channels.max(1),
            downmix,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (SampleWriter, FrameReader) {
        (
            SampleWriter {
                ring: Arc::clone(&self.ring),
                head: 0,
                channels: self.channels,
                downmix: self.downmix,
            },
            FrameReader {
                ring: self.ring,
                last_read: None,
                skip_repeated: false,
            },
        )
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Producer end, owned by the audio callback
///
/// Writes never block, lock or allocate.
pub struct SampleWriter {
    ring: Arc<SampleRing>,

    /// Local copy of the write counter (only this end advances it)
    head: u64,

    channels: usize,
    downmix: DownmixPolicy,
}

impl SampleWriter {
    /// Write mono samples
    pub fn write(&mut self, samples: &[f32]) {
        self.push_with(samples.len(), |i| samples[i]);
    }

    /// Write interleaved multi-channel samples, downmixed to mono
    ///
    /// A trailing partial frame is ignored.
    ///
    /// # Returns
    /// Number of mono samples written
    pub fn write_interleaved(&mut self, data: &[f32]) -> usize {
        let channels = self.channels;
        let downmix = self.downmix;
        let frames = data.len() / channels;

        self.push_with(frames, |i| downmix.mix(&data[i * channels..(i + 1) * channels]));
        frames
    }

    /// Write planar samples (one slice per channel), downmixed to mono
    ///
    /// Extra channels beyond the configured count are ignored and the
    /// shortest slice bounds the number of frames.
    ///
    /// # Returns
    /// Number of mono samples written
    pub fn write_planar(&mut self, planes: &[&[f32]]) -> usize {
        let planes = &planes[..planes.len().min(self.channels)];
        let frames = planes.iter().map(|p| p.len()).min().unwrap_or(0);
        let downmix = self.downmix;

        self.push_with(frames, |i| match downmix {
            DownmixPolicy::Average => {
                planes.iter().map(|p| p[i]).sum::<f32>() / planes.len() as f32
            }
            DownmixPolicy::First => planes[0][i],
        });
        frames
    }

    /// Store `count` samples produced by `sample_at` and publish them
    #[inline]
    fn push_with<F: FnMut(usize) -> f32>(&mut self, count: usize, mut sample_at: F) {
        if count == 0 {
            return;
        }

        // Only the newest `capacity` samples of an oversized write survive
        let skip = count.saturating_sub(self.ring.capacity());
        let start = self.head + skip as u64;
        let end = self.head + count as u64;

        self.ring.reserved.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        for (offset, index) in (start..end).enumerate() {
            self.ring
                .slot(index)
                .store(sample_at(skip + offset).to_bits(), Ordering::Relaxed);
        }

        self.ring.written.store(end, Ordering::Release);
        self.head = end;
    }

    /// Channel count expected by the interleaved/planar writers
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Downmix policy applied to multi-channel input
    pub fn downmix(&self) -> DownmixPolicy {
        self.downmix
    }

    /// Total mono samples written since creation
    pub fn total_written(&self) -> u64 {
        self.head
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Consumer end, owned by the processing context
pub struct FrameReader {
    ring: Arc<SampleRing>,

    /// Write counter observed at the last successful read
    last_read: Option<u64>,

    /// Refuse to hand out the same frame twice
    skip_repeated: bool,
}

impl FrameReader {
    /// Copy the most recent `frame.len()` samples into `frame`
    ///
    /// Non-blocking. Fails with [`NotReady`] when there is not a full frame
    /// yet or when the producer overwrote the frame while it was being
    /// copied. With [`set_skip_repeated`](Self::set_skip_repeated) it also
    /// fails when no new samples arrived since the previous read.
    pub fn try_read_frame(&mut self, frame: &mut [f32]) -> Result<(), NotReady> {
        let needed = frame.len();
        let capacity = self.ring.capacity() as u64;

        if needed as u64 > capacity {
            return Err(NotReady::Underrun {
                available: self.available(),
                needed,
            });
        }

        for _ in 0..MAX_READ_ATTEMPTS {
            let written = self.ring.written.load(Ordering::Acquire);

            if written < needed as u64 {
                return Err(NotReady::Underrun {
                    available: written as usize,
                    needed,
                });
            }
            if self.skip_repeated && self.last_read == Some(written) {
                return Err(NotReady::Stale);
            }

            let start = written - needed as u64;
            for (offset, out) in frame.iter_mut().enumerate() {
                let bits = self.ring.slot(start + offset as u64).load(Ordering::Relaxed);
                *out = f32::from_bits(bits);
            }

            // Seqlock-style validation: the copy is intact only if the producer
            // has not started writing into any slot of [start, start + capacity)
            fence(Ordering::Acquire);
            let reserved = self.ring.reserved.load(Ordering::Relaxed);
            if reserved <= start + capacity {
                self.last_read = Some(written);
                return Ok(());
            }
        }

        Err(NotReady::Overrun)
    }

    /// Number of samples currently held (saturates at capacity)
    pub fn available(&self) -> usize {
        let written = self.ring.written.load(Ordering::Acquire);
        written.min(self.ring.capacity() as u64) as usize
    }

    /// Samples discarded by the overwrite policy so far
    pub fn overwritten(&self) -> u64 {
        self.ring
            .written
            .load(Ordering::Acquire)
            .saturating_sub(self.ring.capacity() as u64)
    }

    /// Report [`NotReady::Stale`] instead of re-reading an unchanged frame
    pub fn set_skip_repeated(&mut self, skip: bool) {
        self.skip_repeated = skip;
    }

    pub fn skips_repeated(&self) -> bool {
        self.skip_repeated
    }

    /// Forget the last read position so the current frame can be re-read
    pub fn clear_stale(&mut self) {
        self.last_read = None;
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
