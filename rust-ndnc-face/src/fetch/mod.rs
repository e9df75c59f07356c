//! Reliable bulk transfer: the segment fetcher and its RTT estimator.

pub mod rtt;
pub mod segment_fetcher;

pub use rtt::{RttEstimator, RttEstimatorOptions, RttEstimatorWithStats};
pub use segment_fetcher::{
    FetchError, FetchErrorCode, InvalidOptions, Options as FetcherOptions, SegmentFetcher,
};
