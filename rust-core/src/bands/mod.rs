//! Band mapping and temporal smoothing

pub mod mapper;
pub mod mapping;
pub mod smoothing;

pub use mapper::{BandAggregation, BandMapper, MagnitudeScale};
pub use mapping::{BandCurve, BandMappingTable};
pub use smoothing::BandSmoother;
