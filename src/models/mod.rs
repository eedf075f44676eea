//! Model training, persistence and inference components

pub mod inference;
pub mod linear;
pub mod loader;
pub mod registry;
pub mod scaler;
pub mod whatif;

pub use inference::{InferenceEngine, Prediction};
pub use linear::{LinearModel, ModelKind};
pub use loader::ModelLoader;
pub use registry::{ModelBundleSet, ModelRegistry, TrainedModel, TrainingRun};
pub use scaler::StandardScaler;
pub use whatif::WhatIfEngine;
