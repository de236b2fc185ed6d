//! 写真リネーム
//!
//! 1件: 検出 → 計画 → （ドライランでなければ）実行。
//! 一括: 検出だけを固定数のワーカーで並列に行い、計画と実行は
//! パス順に1件ずつ確定させる。同じバッチ内で先に割り当てたリネーム先は
//! 既存ファイルとして、移動済みの元ファイルは空きとして扱うので、
//! ドライランの予測と本番の結果は一致する。まだ処理していない元ファイルは
//! 上書きの指定があっても置き換えない（検出結果が古くなるため）。

pub mod log;
pub mod plan;

pub use plan::{execute, plan, PlanContext, RenamePlan, TransferMode};

use crate::config::Config;
use crate::detector::ArtifactDetector;
use crate::error::{RenamerError, Result};
use crate::ocr::OcrError;
use crate::scanner::{scan, ScanOptions};
use artifact_renamer_common::{
    BatchResult, ConflictPolicy, DetectionResult, FailureKind, FileOutcome, RenameAction,
};
use plan::file_name_of;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// ファイル単位の失敗（Display がそのままユーザー向けメッセージ）
#[derive(Debug, Error)]
pub enum FileFailure {
    #[error("No identifiers found (site: {site}, artifact: {artifact})")]
    NoDetection { site: String, artifact: String },

    #[error("OCR backend failure: {0}")]
    OcrBackend(#[from] OcrError),

    #[error("File already exists: {0} (use --overwrite to replace)")]
    DestinationConflict(String),

    #[error("Destination is another photo not yet renamed in this batch: {0}")]
    DestinationPending(String),

    #[error("File not found: {0}")]
    SourceMissing(String),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl FileFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            FileFailure::NoDetection { .. } => FailureKind::NoDetection,
            FileFailure::OcrBackend(_) => FailureKind::OcrBackend,
            FileFailure::DestinationConflict(_) | FileFailure::DestinationPending(_) => {
                FailureKind::DestinationConflict
            }
            FileFailure::SourceMissing(_) | FileFailure::Filesystem(_) => FailureKind::Filesystem,
        }
    }

    fn into_outcome(self, source: &Path) -> FileOutcome {
        let message = format!("{}: {}", file_name_of(source), self);
        FileOutcome::failed(source, self.kind(), message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameOptions {
    pub overwrite: bool,
    pub backup: bool,
    pub dry_run: bool,
}

impl RenameOptions {
    pub fn policy(&self) -> ConflictPolicy {
        ConflictPolicy::new(self.overwrite, self.backup)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub pattern: String,
    /// 指定時はコピー、未指定時はその場でリネーム
    pub output_dir: Option<PathBuf>,
    pub recursive: bool,
    pub rename: RenameOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            pattern: "*.jpg".into(),
            output_dir: None,
            recursive: false,
            rename: RenameOptions::default(),
        }
    }
}

/// 検出フェーズの進捗（完了順に通知される）
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub done: usize,
    pub total: usize,
    pub path: &'a Path,
}

/// バッチ内で確定済み・未処理のパス
#[derive(Debug, Default)]
struct BatchLedger {
    claimed: HashSet<PathBuf>,
    pending: HashSet<PathBuf>,
    vacated: HashSet<PathBuf>,
}

impl BatchLedger {
    fn for_sources(files: &[PathBuf]) -> Self {
        Self {
            pending: files.iter().cloned().collect(),
            ..Self::default()
        }
    }
}

pub struct ArtifactRenamer {
    detector: ArtifactDetector,
    backup_dir_name: String,
    workers: usize,
}

impl ArtifactRenamer {
    pub fn new(detector: ArtifactDetector) -> Self {
        let defaults = Config::default();
        Self {
            detector,
            backup_dir_name: defaults.backup_dir_name,
            workers: defaults.workers,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ArtifactDetector::from_config(config)?)
            .with_backup_dir_name(&config.backup_dir_name)
            .with_workers(config.workers))
    }

    pub fn with_backup_dir_name(mut self, name: &str) -> Self {
        self.backup_dir_name = name.to_string();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn detector(&self) -> &ArtifactDetector {
        &self.detector
    }

    pub fn backup_dir_name(&self) -> &str {
        &self.backup_dir_name
    }

    /// 写真1枚をリネームする
    pub fn rename_one(
        &self,
        source: &Path,
        output_dir: Option<&Path>,
        options: &RenameOptions,
    ) -> FileOutcome {
        if !source.is_file() {
            return FileFailure::SourceMissing(source.display().to_string()).into_outcome(source);
        }

        let mut ledger = BatchLedger::default();
        match self.detector.detect(source) {
            Ok(detection) => self.commit(source, &detection, output_dir, options, &mut ledger),
            Err(e) => FileFailure::from(e).into_outcome(source),
        }
    }

    /// ディレクトリ（またはファイル1件）を一括リネームする
    ///
    /// 入力が存在しない・パターンが不正な場合はファイルに触れる前に Err。
    /// ファイル単位の失敗は結果に記録され、残りの処理は続く。
    pub fn rename_batch<F>(
        &self,
        input: &Path,
        options: &BatchOptions,
        on_progress: F,
    ) -> Result<BatchResult>
    where
        F: Fn(BatchProgress<'_>) + Sync,
    {
        let files = scan(
            input,
            &ScanOptions {
                pattern: options.pattern.clone(),
                recursive: options.recursive,
                skip_dir_name: Some(self.backup_dir_name.clone()),
            },
        )?;

        if files.is_empty() {
            warn!(
                "No files matching '{}' in {}",
                options.pattern,
                input.display()
            );
            return Ok(BatchResult::new());
        }

        info!(
            "Processing {} file(s) from {} with {} worker(s){}",
            files.len(),
            input.display(),
            self.workers,
            if options.rename.dry_run { " [dry run]" } else { "" }
        );

        let detections = self.detect_all(&files, &on_progress)?;

        let mut ledger = BatchLedger::for_sources(&files);
        let result: BatchResult = files
            .iter()
            .zip(detections)
            .map(|(source, detection)| match detection {
                Ok(detection) => self.commit(
                    source,
                    &detection,
                    options.output_dir.as_deref(),
                    &options.rename,
                    &mut ledger,
                ),
                Err(e) => {
                    ledger.pending.remove(source);
                    FileFailure::from(e).into_outcome(source)
                }
            })
            .collect();

        info!(
            "Batch finished: {} succeeded, {} failed",
            result.success(),
            result.failed()
        );
        Ok(result)
    }

    /// OCRと抽出を並列に行う（結果は入力順）
    fn detect_all<F>(
        &self,
        files: &[PathBuf],
        on_progress: &F,
    ) -> Result<Vec<std::result::Result<DetectionResult, OcrError>>>
    where
        F: Fn(BatchProgress<'_>) + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| RenamerError::Config(format!("worker pool: {}", e)))?;

        let total = files.len();
        let done = AtomicUsize::new(0);

        Ok(pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let detection = self.detector.detect(path);
                    let done = done.fetch_add(1, Ordering::SeqCst) + 1;
                    on_progress(BatchProgress { done, total, path });
                    detection
                })
                .collect()
        }))
    }

    /// 計画して実行し、結果を1件分にまとめる
    fn commit(
        &self,
        source: &Path,
        detection: &DetectionResult,
        output_dir: Option<&Path>,
        options: &RenameOptions,
        ledger: &mut BatchLedger,
    ) -> FileOutcome {
        ledger.pending.remove(source);
        let plan = plan::plan(
            source,
            detection,
            &PlanContext {
                output_dir,
                policy: options.policy(),
                backup_dir_name: &self.backup_dir_name,
                claimed: &ledger.claimed,
                pending: &ledger.pending,
                vacated: &ledger.vacated,
            },
        );
        debug!("{}: {}", plan.source_name(), plan.action);

        let outcome = match (plan.action, plan.destination()) {
            (RenameAction::SkipNoDetection, _) | (_, None) => FileFailure::NoDetection {
                site: detection.site_number().unwrap_or("none").to_string(),
                artifact: detection.artifact_number().unwrap_or("none").to_string(),
            }
            .into_outcome(source),
            (RenameAction::SkipExists, Some(destination))
                if ledger.pending.contains(&destination) =>
            {
                FileFailure::DestinationPending(destination.display().to_string())
                    .into_outcome(source)
            }
            (RenameAction::SkipExists, Some(destination)) => {
                FileFailure::DestinationConflict(destination.display().to_string())
                    .into_outcome(source)
            }
            (_, Some(destination)) => {
                let outcome = self.apply(&plan, &destination, options.dry_run);
                if outcome.success {
                    if plan.mode == TransferMode::Move && !plan.is_noop() {
                        ledger.vacated.insert(source.to_path_buf());
                    }
                    ledger.claimed.insert(destination);
                }
                outcome
            }
        };

        outcome.with_identifiers(detection.site_number(), detection.artifact_number())
    }

    fn apply(&self, plan: &RenamePlan, destination: &Path, dry_run: bool) -> FileOutcome {
        let from = plan.source_name();
        let to = file_name_of(destination);
        let note = match plan.action {
            RenameAction::Overwrite => " (overwrite)",
            RenameAction::BackupAndRename => " (backup existing)",
            _ => "",
        };

        if dry_run {
            let message = if plan.is_noop() {
                format!("[DRY RUN] Already named: {}", from)
            } else {
                format!("[DRY RUN] Would rename: {} -> {}{}", from, to, note)
            };
            return FileOutcome::succeeded(&plan.source, message)
                .with_destination(destination, false);
        }

        match execute(plan) {
            Ok(()) => {
                let message = if plan.is_noop() {
                    format!("Already named: {}", from)
                } else if plan.mode == TransferMode::Copy {
                    format!("Copied: {} -> {}{}", from, to, note)
                } else {
                    format!("Renamed: {} -> {}{}", from, to, note)
                };
                FileOutcome::succeeded(&plan.source, message).with_destination(destination, true)
            }
            Err(e) => {
                warn!("{}: {}", from, e);
                FileFailure::from(e).into_outcome(&plan.source)
            }
        }
    }
}
