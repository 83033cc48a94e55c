use std::io;
use thiserror::Error;

/// Errors that abort a resolution run
///
/// A reference to a key that is missing from its table is not an error: it
/// is reported as [`crate::reference::Lookup::NotFound`] and the owning manifest
/// entry is dropped.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse '{value}': {reason}")]
    Parse { value: String, reason: String },

    #[error("Malformed table '{table}': {reason}")]
    Format { table: String, reason: String },

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Template value '{0}' is not defined")]
    UndefinedTemplateValue(String),

    #[error("No rewrite rule matches '{0}'")]
    UnmappableUri(String),

    #[error("Unsafe object path in '{0}'")]
    UnsafeObjectPath(String),

    #[error("Transfer failed for '{uri}'")]
    TransferFailed { uri: String },

    #[error("Input '{key}': {source}")]
    Entry {
        key: String,
        #[source]
        source: Box<ManifestError>,
    },
}

impl ManifestError {
    pub fn parse(value: &str, reason: impl Into<String>) -> Self {
        ManifestError::Parse {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn format(table: &str, reason: impl Into<String>) -> Self {
        ManifestError::Format {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the manifest key that was being resolved.
    pub(crate) fn for_entry(self, key: &str) -> Self {
        match self {
            already @ ManifestError::Entry { .. } => already,
            other => ManifestError::Entry {
                key: key.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_entry_context_names_key_and_cause() {
        let err = ManifestError::UnknownTable("nope".to_string()).for_entry("Pipeline.x");
        assert_eq!(err.to_string(), "Input 'Pipeline.x': Unknown table 'nope'");

        // Context is attached once
        let err = err.for_entry("outer");
        assert!(err.to_string().starts_with("Input 'Pipeline.x'"));
    }
}
