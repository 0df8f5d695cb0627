// src/lib.rs

pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod output;

pub use error::PipelineError;
pub use model::{PharmacyRecord, RewardTable};
