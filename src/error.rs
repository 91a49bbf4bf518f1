//! Typed error kinds for the conversion pipeline.
//!
//! Validation and schema problems are raised at the entry of the offending
//! operation, before anything is written. A missing hierarchy lookup is not
//! an error (see `hierarchy::edition`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required column or property is absent from an input table.
    #[error("required column '{column}' missing from {table}")]
    Schema { table: String, column: String },

    /// An invalid parameter combination was passed to an operation.
    #[error("invalid {parameter}: {message}")]
    Validation {
        parameter: &'static str,
        message: String,
    },

    /// A remote dataset could not be fetched. Fatal, no retry.
    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::Schema {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn validation(parameter: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            parameter,
            message: message.into(),
        }
    }
}
