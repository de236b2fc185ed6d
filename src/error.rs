use crate::ocr::OcrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenamerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("A batch is already processing; wait for it to finish or fetch its results first")]
    ConcurrentJobConflict,

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] artifact_renamer_common::Error),
}

pub type Result<T> = std::result::Result<T, RenamerError>;
