pub mod calendar;
pub mod collaborators;
pub mod cycle;
pub mod error;
pub mod interval;
pub mod prediction;
pub mod service;
pub mod window;

pub use crate::error::{CycleError, PredictionError, RepositoryError};
pub use crate::service::{TrackerSession, TrackerSessionBuilder};
