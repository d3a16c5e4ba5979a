//! Adapters layer: Concrete implementations of ports.
//!
//! - `xgboost`: native evaluation of XGBoost JSON tree ensembles
//! - `lstm`: candle LSTM for the AFib recurrent network
//! - `artifact`: artifact reads and SHA-256 manifest checks
//! - `sanitize`: clinical-data filtering for logs

pub mod artifact;
pub mod lstm;
pub mod sanitize;
pub mod xgboost;

pub use artifact::ModelLoadError;
