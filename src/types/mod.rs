//! Type definitions for the prediction pipeline

pub mod metrics;
pub mod report;

pub use metrics::{GroupKind, MetricGroup, RawMetricsRecord};
pub use report::{
    round2, ErrorResponse, MissingFeatureWarning, PerTarget, PredictionRequest,
    PredictionResponse, TargetChange,
};
