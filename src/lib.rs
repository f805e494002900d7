//! Sampleflow - streaming MP4 demux pipeline
//!
//! This library crate exposes the pipeline, worker and configuration for the
//! `sampleflow` binary and for integration testing.

pub mod config;
pub mod pipeline;
pub mod worker;
