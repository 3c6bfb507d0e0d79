//! One processing cycle: ring → window/FFT → band mapper → smoother → snapshot
//!
//! Everything the cycle touches is allocated when the pipeline is built, so
//! a cycle itself never allocates.

use super::snapshot::SnapshotWriter;
use crate::audio::{FrameReader, NotReady};
use crate::bands::{BandMapper, BandMappingTable, BandSmoother};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::spectrum::SpectrumAnalyzer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of one processing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new band array was published
    Published,

    /// No frame this cycle; the previous band array stays visible
    Skipped(NotReady),
}

/// Running counters shared between the engine and its pipeline
#[derive(Debug, Default)]
pub struct EngineStats {
    cycles: AtomicU64,
    published: AtomicU64,
    underruns: AtomicU64,
    stale: AtomicU64,
    overruns: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub published: u64,
    pub underruns: u64,
    pub stale: u64,
    pub overruns: u64,
    pub failures: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &Result<CycleOutcome, EngineError>) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Ok(CycleOutcome::Published) => &self.published,
            Ok(CycleOutcome::Skipped(NotReady::Underrun { .. })) => &self.underruns,
            Ok(CycleOutcome::Skipped(NotReady::Stale)) => &self.stale,
            Ok(CycleOutcome::Skipped(NotReady::Overrun)) => &self.overruns,
            Err(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The processing side of the engine
pub struct BandPipeline {
    reader: FrameReader,
    analyzer: SpectrumAnalyzer,
    mapper: BandMapper,
    smoother: BandSmoother,
    publisher: SnapshotWriter,
    stats: Arc<EngineStats>,

    // Scratch reused every cycle
    frame: Vec<f32>,
    spectrum: Vec<f32>,
    raw_bands: Vec<f32>,
    smoothed: Vec<f32>,
}

impl BandPipeline {
    /// Build a pipeline for a validated configuration
    pub fn new(
        config: &EngineConfig,
        table: BandMappingTable,
        mut reader: FrameReader,
        publisher: SnapshotWriter,
        stats: Arc<EngineStats>,
    ) -> Self {
        reader.set_skip_repeated(config.skip_repeated_frames);
        let analyzer = SpectrumAnalyzer::new(config.frame_length, config.window);
        let num_bins = analyzer.num_bins();

        let mapper = BandMapper::new(
            table,
            config.aggregation,
            config.scale,
            config.db_floor,
            config.gain,
        );
        let smoother = BandSmoother::new(config.band_count, config.attack, config.release);

        Self {
            reader,
            analyzer,
            mapper,
            smoother,
            publisher,
            stats,
            frame: vec![0.0; config.frame_length],
            spectrum: vec![0.0; num_bins],
            raw_bands: vec![0.0; config.band_count],
            smoothed: vec![0.0; config.band_count],
        }
    }

    /// Run one cycle
    ///
    /// A missing frame is not an error: the cycle is skipped and the last
    /// published array stays in place.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, EngineError> {
        let outcome = self.process();
        self.stats.record(&outcome);
        outcome
    }

    fn process(&mut self) -> Result<CycleOutcome, EngineError> {
        if let Err(reason) = self.reader.try_read_frame(&mut self.frame) {
            match reason {
                NotReady::Overrun => {
                    tracing::warn!("Producer lapped the frame reader, skipping cycle")
                }
                _ => tracing::trace!("No frame this cycle: {:?}", reason),
            }
            return Ok(CycleOutcome::Skipped(reason));
        }

        self.analyzer.analyze(&self.frame, &mut self.spectrum)?;
        self.mapper.map(&self.spectrum, &mut self.raw_bands);
        self.smoother.smooth(&self.raw_bands, &mut self.smoothed);
        self.publisher.publish(&self.smoothed);

        Ok(CycleOutcome::Published)
    }

    /// Tear the pipeline down, keeping the ring reader for the next one
    ///
    /// The old snapshot is retired so outstanding readers can tell.
    pub fn into_reader(self) -> FrameReader {
        self.publisher.retire();
        let mut reader = self.reader;
        reader.clear_stale();
        reader
    }

    /// Smoothed values as of the last published cycle
    pub fn smoothed(&self) -> &[f32] {
        self.smoother.state()
    }

    pub fn mapper(&self) -> &BandMapper {
        &self.mapper
    }

    pub fn frame_reader(&self) -> &FrameReader {
        &self.reader
    }
}
