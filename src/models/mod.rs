//! Core data models for the conversion pipeline.

pub mod geography;
pub mod survey;

pub use geography::{Geography, OverlapMeasure, ValueKind};
pub use survey::{SurveyRow, SurveyTable};
