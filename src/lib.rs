pub mod config;
pub mod dataset;
pub mod error;
pub mod interactions;
pub mod models;
pub mod prescription;
pub mod search;

pub use dataset::{Dataset, MedicineRecord};
pub use error::{AppError, AppResult};
