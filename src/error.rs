//! Error types shared by the loader, the training loop and the snapshot store.

use std::path::PathBuf;

use burn::record::RecorderError;
use polars::prelude::PolarsError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Table(#[from] PolarsError),

    #[error("snapshot record error: {0:?}")]
    Record(RecorderError),

    #[error("no snapshot at {}", .path.display())]
    MissingSnapshot { path: PathBuf },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("label {label} minus training minimum {min_val} falls outside [0, {class_num})")]
    LabelOutOfRange {
        label: i64,
        min_val: i64,
        class_num: usize,
    },

    #[error("class index {class} outside [0, {class_num})")]
    ClassOutOfRange { class: usize, class_num: usize },

    #[error("{0} is empty")]
    EmptyDataset(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("training loss became non-finite in epoch {epoch}")]
    Diverged { epoch: usize },
}

impl From<RecorderError> for Error {
    fn from(err: RecorderError) -> Self {
        Error::Record(err)
    }
}
