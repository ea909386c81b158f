pub mod cli;
pub mod config;
pub mod error;
pub mod ingredient_matcher;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod units;

pub use error::{ConversionError, ReconcileError, StorageError};
pub use service::PantryReconciler;
