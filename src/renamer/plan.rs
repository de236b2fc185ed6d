//! リネーム計画と実行
//!
//! 計画（どこへ・何をするか）とファイル操作を分ける。
//! ドライランは計画だけを作り、実行を飛ばす。

use artifact_renamer_common::{ConflictPolicy, DetectionResult, RenameAction};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 出力ディレクトリ指定時はコピー、未指定時はその場で移動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub destination_dir: PathBuf,
    /// 正準ファイル名（検出失敗時は None）
    pub file_name: Option<String>,
    pub action: RenameAction,
    pub mode: TransferMode,
    /// BackupAndRename のときの退避先
    pub backup_path: Option<PathBuf>,
}

impl RenamePlan {
    pub fn destination(&self) -> Option<PathBuf> {
        self.file_name.as_ref().map(|n| self.destination_dir.join(n))
    }

    /// 既に正準名になっている（操作不要）
    pub fn is_noop(&self) -> bool {
        self.destination().as_deref() == Some(self.source.as_path())
    }

    pub fn source_name(&self) -> String {
        file_name_of(&self.source)
    }
}

/// 計画に必要な入力
pub struct PlanContext<'a> {
    pub output_dir: Option<&'a Path>,
    pub policy: ConflictPolicy,
    pub backup_dir_name: &'a str,
    /// 同じバッチ内で先に割り当て済みのリネーム先（既存扱い）
    pub claimed: &'a HashSet<PathBuf>,
    /// 同じバッチでまだ処理していない元ファイル（上書きしない）
    pub pending: &'a HashSet<PathBuf>,
    /// 同じバッチで移動済みの元ファイル（空き扱い）
    pub vacated: &'a HashSet<PathBuf>,
}

/// 検出結果と現在のディレクトリ状態から計画を作る
pub fn plan(source: &Path, detection: &DetectionResult, ctx: &PlanContext<'_>) -> RenamePlan {
    let (destination_dir, mode) = match ctx.output_dir {
        Some(dir) => (dir.to_path_buf(), TransferMode::Copy),
        None => (
            source.parent().map(Path::to_path_buf).unwrap_or_default(),
            TransferMode::Move,
        ),
    };

    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    let file_name = match detection.file_name(&extension) {
        Some(name) => name,
        None => {
            return RenamePlan {
                source: source.to_path_buf(),
                destination_dir,
                file_name: None,
                action: RenameAction::SkipNoDetection,
                mode,
                backup_path: None,
            };
        }
    };

    let destination = destination_dir.join(&file_name);
    let elsewhere = destination != source;
    let exists = elsewhere
        && (ctx.claimed.contains(&destination)
            || (destination.exists() && !ctx.vacated.contains(&destination)));

    let action = if elsewhere && ctx.pending.contains(&destination) {
        RenameAction::SkipExists
    } else {
        ctx.policy.resolve(exists)
    };
    let backup_path = match action {
        RenameAction::BackupAndRename => Some(backup_path_for(
            &destination_dir.join(ctx.backup_dir_name),
            &file_name,
        )),
        _ => None,
    };

    RenamePlan {
        source: source.to_path_buf(),
        destination_dir,
        file_name: Some(file_name),
        action,
        mode,
        backup_path,
    }
}

/// バックアップ先: `backup/<name>`、既にあれば `backup/<stem>-1.<ext>` …
fn backup_path_for(backup_dir: &Path, file_name: &str) -> PathBuf {
    let candidate = backup_dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().to_string());

    (1..)
        .map(|n| match &extension {
            Some(ext) => backup_dir.join(format!("{}-{}.{}", stem, n, ext)),
            None => backup_dir.join(format!("{}-{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// 計画どおりにファイルを操作する
///
/// スキップ系のアクションと操作不要の計画は何もしない。
pub fn execute(plan: &RenamePlan) -> io::Result<()> {
    if plan.action.is_skip() || plan.is_noop() {
        return Ok(());
    }

    let destination = plan
        .destination()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "plan has no destination"))?;

    if plan.mode == TransferMode::Copy {
        fs::create_dir_all(&plan.destination_dir)?;
    }

    let backup = match (&plan.action, &plan.backup_path) {
        (RenameAction::BackupAndRename, Some(backup_path)) if destination.exists() => {
            if let Some(dir) = backup_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::rename(&destination, backup_path)?;
            info!("Backed up: {} -> {}", destination.display(), backup_path.display());
            Some(backup_path)
        }
        _ => None,
    };

    if let Err(e) = transfer(&plan.source, &destination, plan.mode) {
        if let Some(backup_path) = backup {
            // 退避したファイルを元に戻す
            if let Err(restore) = fs::rename(backup_path, &destination) {
                warn!(
                    "Could not restore backup {} -> {}: {}",
                    backup_path.display(),
                    destination.display(),
                    restore
                );
            }
        }
        return Err(e);
    }

    Ok(())
}

fn transfer(source: &Path, destination: &Path, mode: TransferMode) -> io::Result<()> {
    match mode {
        TransferMode::Move => {
            fs::rename(source, destination)?;
            info!("Renamed: {} -> {}", source.display(), destination.display());
        }
        TransferMode::Copy => {
            // 一時ファイルに書いてから置き換える（途中失敗で壊れた出力を残さない）
            let dir = destination.parent().unwrap_or_else(|| Path::new("."));
            let temp = tempfile::NamedTempFile::new_in(dir)?;
            fs::copy(source, temp.path())?;
            temp.persist(destination).map_err(|e| e.error)?;
            info!("Copied: {} -> {}", source.display(), destination.display());
        }
    }
    Ok(())
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
