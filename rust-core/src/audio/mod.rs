//! Audio ingestion: the lock-free sample ring and optional cpal capture

pub mod buffer;
#[cfg(feature = "capture")]
pub mod input;

pub use buffer::{AudioRingBuffer, DownmixPolicy, FrameReader, NotReady, SampleWriter};
#[cfg(feature = "capture")]
pub use input::AudioInput;
