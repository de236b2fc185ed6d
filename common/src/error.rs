//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
