//! 一括処理の集計結果
//!
//! Web のステータスAPIにそのまま載る形:
//! `{total, success, failed, details: [{success, message}, ...]}`

use serde::Serialize;
use std::path::{Path, PathBuf};

/// ファイル単位の失敗種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// OCRは成功したが識別子が揃わない
    NoDetection,
    /// OCRエンジン自体の失敗
    OcrBackend,
    /// リネーム先が既に存在し上書き不可
    DestinationConflict,
    /// 権限・容量・パスなどのファイル操作エラー
    Filesystem,
}

/// ファイル1件分の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    #[serde(skip)]
    pub source: PathBuf,
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
    /// 計画したリネーム先（ドライランでも設定される）
    #[serde(skip)]
    pub destination: Option<PathBuf>,
    /// 実際にファイルを書き出したか
    #[serde(skip)]
    pub written: bool,
    #[serde(skip)]
    pub site_number: Option<String>,
    #[serde(skip)]
    pub artifact_number: Option<String>,
}

impl FileOutcome {
    pub fn failed(source: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            success: false,
            message: message.into(),
            failure: Some(kind),
            destination: None,
            written: false,
            site_number: None,
            artifact_number: None,
        }
    }

    pub fn succeeded(source: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            success: true,
            message: message.into(),
            failure: None,
            destination: None,
            written: false,
            site_number: None,
            artifact_number: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>, written: bool) -> Self {
        self.destination = Some(destination.into());
        self.written = written;
        self
    }

    pub fn with_identifiers(mut self, site: Option<&str>, artifact: Option<&str>) -> Self {
        self.site_number = site.map(str::to_string);
        self.artifact_number = artifact.map(str::to_string);
        self
    }

    /// 提案されたファイル名
    pub fn proposed_name(&self) -> Option<String> {
        self.destination
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
    }
}

/// 一括処理の集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    total: usize,
    success: usize,
    failed: usize,
    details: Vec<FileOutcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// 処理順に追加する
    pub fn push(&mut self, outcome: FileOutcome) {
        self.total += 1;
        if outcome.success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        self.details.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn success(&self) -> usize {
        self.success
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn details(&self) -> &[FileOutcome] {
        &self.details
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// アーカイブ対象（実際に書き出された成功ファイル）
    pub fn produced_outputs(&self) -> Vec<&Path> {
        self.details
            .iter()
            .filter(|d| d.success && d.written)
            .filter_map(|d| d.destination.as_deref())
            .collect()
    }
}

impl FromIterator<FileOutcome> for BatchResult {
    fn from_iter<I: IntoIterator<Item = FileOutcome>>(iter: I) -> Self {
        let mut result = BatchResult::new();
        for outcome in iter {
            result.push(outcome);
        }
        result
    }
}
