//! BiasLab Core
//!
//! Core types, verdict records, and error handling shared across BiasLab components.
//!
//! This crate provides:
//! - Sentence-level records with bias level thresholds
//! - The article-level verdict and its confidence semantics
//! - Media verdicts for image and video scorers
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    round_to, ArticleVerdict, BiasLevel, MediaVerdict, OverallBias, SentenceRecord,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ArticleVerdict, BiasLevel, MediaVerdict, OverallBias, SentenceRecord};
}
