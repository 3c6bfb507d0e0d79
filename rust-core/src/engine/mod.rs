//! Band engine - owns the pipeline and its processing thread
//!
//! Three contexts touch the engine:
//! - the audio callback writes samples through the [`SampleWriter`] returned
//!   by [`BandEngine::new`] (lock-free, allocation-free);
//! - the processing context runs cycles, either on the engine's own worker
//!   thread ([`BandEngine::start`]) or on the caller's thread
//!   ([`BandEngine::tick`], e.g. once per rendered frame);
//! - any number of consumers read the latest band array through
//!   [`BandEngine::get_frequencies`] or a cloned [`BandReader`].

pub mod pipeline;
pub mod snapshot;

pub use pipeline::{BandPipeline, CycleOutcome, EngineStats, StatsSnapshot};
pub use snapshot::{BandReader, SnapshotWriter};

use crate::audio::{AudioRingBuffer, FrameReader, SampleWriter};
use crate::bands::BandMappingTable;
use crate::config::EngineConfig;
use crate::error::EngineError;
use snapshot::snapshot_channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Background processing thread; hands the pipeline back when joined
struct Worker {
    handle: JoinHandle<BandPipeline>,
    running: Arc<AtomicBool>,
}

/// Real-time frequency-band engine
pub struct BandEngine {
    config: EngineConfig,

    /// Present while the engine is stopped
    pipeline: Option<BandPipeline>,

    /// Present while the engine is running
    worker: Option<Worker>,

    table: BandMappingTable,
    reader: BandReader,
    stats: Arc<EngineStats>,
}

impl BandEngine {
    /// Create an engine and the writer for its audio producer
    ///
    /// Fails fast on an invalid configuration. The engine starts stopped;
    /// call [`start`](Self::start) or drive it with [`tick`](Self::tick).
    pub fn new(config: EngineConfig) -> Result<(Self, SampleWriter), EngineError> {
        config.validate()?;

        let ring = AudioRingBuffer::new(config.ring_capacity, config.channels, config.downmix);
        let (writer, frame_reader) = ring.split();
        let stats = Arc::new(EngineStats::default());

        let (table, pipeline, reader) = build_pipeline(&config, frame_reader, Arc::clone(&stats));

        tracing::info!(
            "Band engine ready: {} bands, {}-point frames at {} Hz ({:.2} Hz/bin)",
            config.band_count,
            config.frame_length,
            config.sample_rate,
            config.bin_width_hz()
        );

        Ok((
            Self {
                config,
                pipeline: Some(pipeline),
                worker: None,
                table,
                reader,
                stats,
            },
            writer,
        ))
    }

    /// Start the background processing thread
    ///
    /// Runs one cycle every `update_interval_ms`. Starting a running engine
    /// is a no-op.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let mut pipeline = self.pipeline.take().ok_or(EngineError::PipelineLost)?;
        let running = Arc::new(AtomicBool::new(true));
        let interval = self.config.update_interval();

        let flag = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("bandscope-worker".into())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    let started = Instant::now();

                    if let Err(e) = pipeline.run_cycle() {
                        tracing::error!("Processing cycle failed: {}", e);
                    }

                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
                pipeline
            })
            .map_err(EngineError::Spawn)?;

        self.worker = Some(Worker { handle, running });
        tracing::info!("Processing thread started ({} ms period)", interval.as_millis());
        Ok(())
    }

    /// Stop the processing thread and wait for it to exit
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.running.store(false, Ordering::Release);
        match worker.handle.join() {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                tracing::info!("Processing thread stopped");
                Ok(())
            }
            Err(_) => {
                tracing::error!("Processing thread panicked");
                Err(EngineError::WorkerPanicked)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Run one processing cycle on the calling thread
    ///
    /// For frame-driven consumers. Only valid while the worker is stopped.
    pub fn tick(&mut self) -> Result<CycleOutcome, EngineError> {
        if self.worker.is_some() {
            return Err(EngineError::Running);
        }
        self.pipeline
            .as_mut()
            .ok_or(EngineError::PipelineLost)?
            .run_cycle()
    }

    /// Copy the latest band array into `output`
    ///
    /// `output` must hold exactly `band_count()` values. Safe to call from
    /// any thread while the engine is processing; never returns a partially
    /// updated array and does not advance the engine.
    pub fn get_frequencies(&self, output: &mut [f32]) -> Result<(), EngineError> {
        self.reader.get_frequencies(output)
    }

    /// Copy of the latest band array
    pub fn frequencies(&self) -> Vec<f32> {
        self.reader.snapshot()
    }

    /// Handle for reading bands from other threads
    ///
    /// Readers taken before a [`reconfigure`](Self::reconfigure) keep showing
    /// the last array of the old configuration and report `is_current() == false`.
    pub fn reader(&self) -> BandReader {
        self.reader.clone()
    }

    /// Replace the analysis configuration
    ///
    /// Rebuilds the transform, mapping table, smoother and snapshot; smoothing
    /// restarts from zero. The inbound layout (ring capacity, channels,
    /// downmix) cannot change. A running engine is restarted.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.config.check_same_input(&config)?;

        let was_running = self.is_running();
        self.stop()?;

        let old = self.pipeline.take().ok_or(EngineError::PipelineLost)?;
        let frame_reader = old.into_reader();

        let (table, pipeline, reader) =
            build_pipeline(&config, frame_reader, Arc::clone(&self.stats));

        tracing::info!(
            "Reconfigured: {} -> {} bands, {} -> {}-point frames",
            self.config.band_count,
            config.band_count,
            self.config.frame_length,
            config.frame_length
        );

        self.table = table;
        self.pipeline = Some(pipeline);
        self.reader = reader;
        self.config = config;

        if was_running {
            self.start()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn band_count(&self) -> usize {
        self.config.band_count
    }

    /// Bin-to-band mapping currently in use
    pub fn mapping_table(&self) -> &BandMappingTable {
        &self.table
    }

    /// Smoothing state, available while the engine is stopped
    pub fn smoothing_state(&self) -> Option<&[f32]> {
        self.pipeline.as_ref().map(BandPipeline::smoothed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for BandEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn build_pipeline(
    config: &EngineConfig,
    frame_reader: FrameReader,
    stats: Arc<EngineStats>,
) -> (BandMappingTable, BandPipeline, BandReader) {
    let table = BandMappingTable::build(
        config.sample_rate,
        config.frame_length,
        config.band_count,
        config.curve,
        config.min_frequency_hz,
        config.max_frequency_hz,
    );

    tracing::debug!(
        "Mapping table: {} bins -> {} bands, {} entries, {} empty bands",
        table.num_bins(),
        table.band_count(),
        table.entry_count(),
        table.empty_bands()
    );

    let (publisher, reader) = snapshot_channel(config.band_count);
    let pipeline = BandPipeline::new(config, table.clone(), frame_reader, publisher, stats);

    (table, pipeline, reader)
}
