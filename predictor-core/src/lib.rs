//! Prediction core for the COVID hospitalization predictor
//!
//! This crate holds everything the HTTP service and the client fallback
//! path share:
//!
//! - **Patient records**: the wire shape ([`PatientRecordInput`]) and the
//!   validated, immutable [`PatientRecord`]
//! - **Model bundles**: loading and validating the pretrained pipeline
//!   artifact ([`ModelBundle`])
//! - **Pipeline evaluation**: column preprocessing and random forest scoring
//! - **Prediction service**: health, model metadata, single and batch
//!   prediction ([`PredictionService`])
//!
//! # Example
//!
//! ```rust,no_run
//! use predictor_core::{PatientRecordInput, PredictionService};
//!
//! let service = PredictionService::load("random_forest_pipeline.json");
//! match service.predict(&PatientRecordInput::example()) {
//!     Ok(result) => println!("{} ({:.2})", result.prediction, result.confidence),
//!     Err(e) => eprintln!("{} [{}]", e, e.error_type()),
//! }
//! ```

pub mod bundle;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod validation;

pub use bundle::*;
pub use error::*;
pub use models::*;
pub use pipeline::Classifier;
pub use service::PredictionService;
