//! Project Quality Forecast Library
//!
//! Predicts software-project outcome metrics (overall score, time to market,
//! community growth) from developer-experience, technical-performance and
//! business-impact metrics, and answers what-if questions about them.

pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod feature_selection;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use dataset::FeatureTable;
pub use error::{PipelineError, Result};
pub use feature_extractor::{FeatureExtractor, FeatureMap};
pub use feature_selection::{FeatureSelector, SelectionReport};
pub use models::{InferenceEngine, ModelLoader, ModelRegistry, WhatIfEngine};
pub use types::{PredictionRequest, PredictionResponse, RawMetricsRecord};
