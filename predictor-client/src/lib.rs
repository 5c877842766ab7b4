//! Client adapter for the COVID hospitalization predictor
//!
//! Submits validated patient records to the prediction service and, when the
//! service cannot be reached, recomputes the prediction with a locally loaded
//! model bundle. Application errors from the service are never retried
//! locally.
//!
//! # Example
//!
//! ```rust,no_run
//! use predictor_client::{ClientAdapter, ClientConfig};
//! use predictor_core::PatientRecordInput;
//!
//! # async fn run() -> Result<(), predictor_client::ClientError> {
//! let adapter = ClientAdapter::from_config(&ClientConfig::from_env())?;
//! let prediction = adapter.predict_input(&PatientRecordInput::example()).await?;
//! println!("{} via {:?}", prediction.result.prediction, prediction.source);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod remote;

pub use adapter::{ClientAdapter, LocalFallback, Prediction, PredictionSource};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, RemoteError};
pub use remote::{HttpPredictionClient, RemotePredictor};
