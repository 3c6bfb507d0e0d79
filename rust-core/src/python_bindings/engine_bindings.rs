//! Python bindings for the band engine

use crate::audio::SampleWriter;
use crate::config::EngineConfig;
use crate::engine::{BandEngine, CycleOutcome};
use crate::error::EngineError;
use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

#[cfg(feature = "capture")]
use crate::audio::AudioInput;

fn to_py_err(e: EngineError) -> PyErr {
    match e {
        EngineError::Config(_) | EngineError::OutputLength { .. } => {
            PyValueError::new_err(e.to_string())
        }
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Band engine exposed to Python
///
/// Samples go in through `feed` (or live capture), bands come out of
/// `get_frequencies` as a float32 numpy array.
#[pyclass(name = "BandEngine", unsendable)]
pub struct PyBandEngine {
    engine: BandEngine,

    /// `None` while a capture stream owns the writer
    writer: Option<SampleWriter>,

    #[cfg(feature = "capture")]
    input: Option<AudioInput>,
}

#[pymethods]
impl PyBandEngine {
    /// Create a new band engine
    ///
    /// Args:
    ///     sample_rate: Sample rate of the fed audio in Hz
    ///     frame_length: FFT size (power of two)
    ///     band_count: Number of output bands
    ///     attack: Smoothing coefficient for rising bands, in (0, 1]
    ///     release: Smoothing coefficient for falling bands, in (0, 1]
    ///     channels: Channel count of the fed audio (interleaved)
    #[new]
    #[pyo3(signature = (sample_rate=48000.0, frame_length=4096, band_count=crate::FREQ_BANDS, attack=0.85, release=0.12, channels=1))]
    fn new(
        sample_rate: f32,
        frame_length: usize,
        band_count: usize,
        attack: f32,
        release: f32,
        channels: usize,
    ) -> PyResult<Self> {
        let config = EngineConfig {
            sample_rate,
            frame_length,
            band_count,
            attack,
            release,
            channels,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create an engine from a TOML configuration document
    #[staticmethod]
    fn from_toml(text: &str) -> PyResult<Self> {
        let config = EngineConfig::from_toml_str(text)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Self::with_config(config)
    }

    /// Push interleaved samples into the engine
    ///
    /// Returns:
    ///     Number of mono samples written
    fn feed(&mut self, samples: PyReadonlyArray1<f32>) -> PyResult<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("live capture owns the sample writer"))?;
        let samples = samples.as_slice()?;
        Ok(writer.write_interleaved(samples))
    }

    /// Run one processing cycle on the calling thread
    ///
    /// Returns:
    ///     True if a new band array was published
    fn tick(&mut self) -> PyResult<bool> {
        let outcome = self.engine.tick().map_err(to_py_err)?;
        Ok(outcome == CycleOutcome::Published)
    }

    /// Start the background processing thread
    fn start(&mut self) -> PyResult<()> {
        self.engine.start().map_err(to_py_err)
    }

    /// Stop the background processing thread
    fn stop(&mut self) -> PyResult<()> {
        self.engine.stop().map_err(to_py_err)
    }

    fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Latest band array as numpy float32 array
    fn get_frequencies<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        PyArray1::from_vec(py, self.engine.frequencies())
    }

    /// Number of arrays published so far
    fn generation(&self) -> u64 {
        self.engine.reader().generation()
    }

    #[getter]
    fn band_count(&self) -> usize {
        self.engine.band_count()
    }

    #[getter]
    fn sample_rate(&self) -> f32 {
        self.engine.config().sample_rate
    }

    /// Start capturing from the default input device
    ///
    /// Returns:
    ///     Device name
    #[cfg(feature = "capture")]
    fn start_capture(&mut self) -> PyResult<String> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("capture already running"))?;

        let input = AudioInput::from_default_device(writer)
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to create audio input: {}", e)))?;
        input
            .start()
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to start audio: {}", e)))?;

        let name = input.device_info().name.clone();
        self.input = Some(input);
        Ok(name)
    }
}

impl PyBandEngine {
    fn with_config(config: EngineConfig) -> PyResult<Self> {
        let (engine, writer) = BandEngine::new(config).map_err(to_py_err)?;
        Ok(Self {
            engine,
            writer: Some(writer),
            #[cfg(feature = "capture")]
            input: None,
        })
    }
}
