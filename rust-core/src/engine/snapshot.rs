//! Tear-free publication of the band array
//!
//! The processing context writes into a triple buffer and publishes; readers
//! always get a whole array, either the previous one or the new one. The
//! publisher never waits for readers. Readers share the output end behind a
//! mutex since they are UI or render threads, never the audio callback.

use crate::error::EngineError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use triple_buffer::TripleBuffer;

/// Band array as stored in the triple buffer
type BandArray = Box<[f32]>;

/// Bookkeeping shared by both ends
struct SnapshotState {
    /// Number of arrays published so far
    generation: AtomicU64,

    /// Set once the engine replaced this channel during reconfiguration
    retired: AtomicBool,

    len: usize,
}

/// Create a publisher/reader pair for arrays of `len` values (all zero)
pub fn snapshot_channel(len: usize) -> (SnapshotWriter, BandReader) {
    let initial: BandArray = vec![0.0; len].into_boxed_slice();
    let (input, output) = TripleBuffer::new(&initial).split();

    let state = Arc::new(SnapshotState {
        generation: AtomicU64::new(0),
        retired: AtomicBool::new(false),
        len,
    });

    (
        SnapshotWriter {
            input,
            state: Arc::clone(&state),
        },
        BandReader {
            output: Arc::new(Mutex::new(output)),
            state,
        },
    )
}

/// Publishing end, owned by the processing context
///
/// Not `Clone`: there is exactly one writer per channel.
pub struct SnapshotWriter {
    input: triple_buffer::Input<BandArray>,
    state: Arc<SnapshotState>,
}

impl SnapshotWriter {
    /// Publish a new band array
    ///
    /// Values beyond the channel length are ignored, missing values become 0.0.
    pub fn publish(&mut self, values: &[f32]) {
        // The back buffer holds an older array, so every slot is rewritten
        let buffer = self.input.input_buffer_mut();
        for (i, dst) in buffer.iter_mut().enumerate() {
            *dst = values.get(i).copied().unwrap_or(0.0);
        }
        self.input.publish();
        self.state.generation.fetch_add(1, Ordering::Release);
    }

    /// Mark the channel as replaced; readers report `is_current() == false`
    pub fn retire(&self) {
        self.state.retired.store(true, Ordering::Release);
    }

    /// Number of arrays published so far
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.len
    }

    pub fn is_empty(&self) -> bool {
        self.state.len == 0
    }
}

/// Read handle for consumers (render threads, UI, bindings)
///
/// Cheap to clone, `Send + Sync`. Reading never blocks the publisher and
/// has no side effects on the published values.
#[derive(Clone)]
pub struct BandReader {
    output: Arc<Mutex<triple_buffer::Output<BandArray>>>,
    state: Arc<SnapshotState>,
}

impl BandReader {
    /// Fill `output` with the latest band array
    ///
    /// `output` must hold exactly `band_count()` values.
    pub fn get_frequencies(&self, output: &mut [f32]) -> Result<(), EngineError> {
        if output.len() != self.state.len {
            return Err(EngineError::OutputLength {
                expected: self.state.len,
                actual: output.len(),
            });
        }
        self.copy_into(output);
        Ok(())
    }

    /// Copy of the latest band array
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.state.len];
        self.copy_into(&mut out);
        out
    }

    fn copy_into(&self, output: &mut [f32]) {
        // A reader that panicked mid-copy leaves the buffer itself intact
        let mut guard = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        output.copy_from_slice(guard.read());
    }

    /// Number of arrays published so far
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }

    /// False once the engine has been reconfigured and publishes elsewhere
    pub fn is_current(&self) -> bool {
        !self.state.retired.load(Ordering::Acquire)
    }

    /// Length of the published array
    pub fn band_count(&self) -> usize {
        self.state.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let (_writer, reader) = snapshot_channel(16);
        assert_eq!(reader.snapshot(), vec![0.0; 16]);
        assert_eq!(reader.generation(), 0);
        assert!(reader.is_current());
    }

    #[test]
    fn test_publish_and_read() {
        let (mut writer, reader) = snapshot_channel(4);

        writer.publish(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reader.snapshot(), vec![1.0, 2.0, 3.0, 4.0]);

        writer.publish(&[5.0, 6.0]);
        assert_eq!(reader.snapshot(), vec![5.0, 6.0, 0.0, 0.0]);
        assert_eq!(reader.generation(), 2);
    }

    #[test]
    fn test_wrong_output_length() {
        let (_writer, reader) = snapshot_channel(8);
        let mut out = vec![0.0; 7];
        assert!(matches!(
            reader.get_frequencies(&mut out),
            Err(EngineError::OutputLength { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let (mut writer, reader) = snapshot_channel(32);
        let values: Vec<f32> = (0..32).map(|i| i as f32 * 0.5).collect();
        writer.publish(&values);

        let mut a = vec![0.0; 32];
        let mut b = vec![0.0; 32];
        reader.get_frequencies(&mut a).unwrap();
        reader.get_frequencies(&mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(reader.generation(), 1);
    }

    #[test]
    fn test_publish_while_reader_holds_output() {
        let (mut writer, reader) = snapshot_channel(3);

        {
            let _held = reader.output.lock().unwrap();
            writer.publish(&[1.0, 1.0, 1.0]);
            writer.publish(&[2.0, 2.0, 2.0]);
        }

        assert_eq!(reader.snapshot(), vec![2.0, 2.0, 2.0]);
        assert_eq!(reader.generation(), 2);
    }

    #[test]
    fn test_retire() {
        let (writer, reader) = snapshot_channel(2);
        writer.retire();
        assert!(!reader.is_current());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_arrays() {
        const LEN: usize = 1280;
        const PUBLISHES: usize = 20_000;

        let (mut writer, reader) = snapshot_channel(LEN);
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut out = vec![0.0; LEN];
                    let mut reads = 0usize;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        reader.get_frequencies(&mut out).unwrap();
                        // Every published array is uniform, so any mix is a tear
                        let first = out[0];
                        assert!(out.iter().all(|&v| v == first), "torn read");
                        reads += 1;
                        if finished {
                            return reads;
                        }
                    }
                })
            })
            .collect();

        let mut values = vec![0.0f32; LEN];
        for generation in 1..=PUBLISHES {
            values.fill(generation as f32);
            writer.publish(&values);
        }
        done.store(true, Ordering::Release);

        for handle in readers {
            assert!(handle.join().unwrap() > 0);
        }
        assert_eq!(reader.snapshot()[LEN - 1], PUBLISHES as f32);
    }
}
