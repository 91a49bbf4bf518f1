//! Geopoll - constituency-to-council conversion of survey data
//!
//! This library provides shared types and modules for the overlaps and convert binaries.

pub mod config;
pub mod convert;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod overlap;
pub mod store;

pub use error::Error;
pub use models::{Geography, OverlapMeasure, SurveyTable, ValueKind};
