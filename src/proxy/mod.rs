//! Proxy-list ingestion
//!
//! This module provides functionality for:
//! - Fetching the list text, with an ordered relay fallback chain
//! - Parsing loosely delimited records
//! - Normalizing and matching country codes
//! - Sampling records for a subscription
//! - Probing record liveness through an external service

pub mod checker;
pub mod country;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod sampler;

pub use checker::{CheckerConfig, LivenessChecker};
pub use country::CountryFilter;
pub use fetcher::{
    FetchError, FetchStrategy, FetcherConfig, ListFetcher, ListOrigin, LoadedList, RelayHosts,
};
pub use models::{LivenessResult, LivenessStatus, ProxyRecord};
pub use parser::ProxyParser;
pub use sampler::Sampler;
