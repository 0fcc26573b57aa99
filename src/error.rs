use std::path::PathBuf;

use crate::features::TargetKind;

pub type Result<T> = std::result::Result<T, AnnotationError>;

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid annotation JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown feature: {id}")]
    UnknownFeature { id: String },

    #[error("Link target {id} is not a {expected:?}")]
    TargetKindMismatch { id: String, expected: TargetKind },
}
