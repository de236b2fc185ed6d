//! OCRバックエンド
//!
//! 検出器からは `text = OCR(image)` のブラックボックスとして扱う。
//! エンジン不在・失敗・タイムアウトは空文字ではなくエラーで返す。

mod tesseract;

pub use tesseract::TesseractBackend;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),

    #[error("OCR engine failed: {0}")]
    Failed(String),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("unreadable image: {0}")]
    InvalidImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    /// 画像から生テキストを取り出す
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;
}
