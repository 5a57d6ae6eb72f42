//! BiasLab Media
//!
//! Image and video manipulation scoring behind opaque model traits, and a
//! background job manager for video analysis.
//!
//! The models themselves are black boxes: a [`MediaScorer`] takes raw bytes
//! and returns the probability of the positive label. This crate owns the
//! thresholding into [`biaslab_core::MediaVerdict`] and the video job
//! lifecycle (queued, running, done, error).

pub mod jobs;
pub mod media;

pub use jobs::{JobManager, JobStatus, VideoJob};
pub use media::{ImageAnalyzer, MediaScorer, UnavailableScorer, VideoAnalyzer};
