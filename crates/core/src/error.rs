use std::path::PathBuf;

use thiserror::Error;

/// Failure to load one of the data tables (keywords, countries).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed reading table from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table has no usable entries")]
    Empty,
}
