//! リネーム先の衝突判定
//!
//! ファイルシステムには触れない純粋な判定表。実際の操作は呼び出し側が行う。
//!
//! | 既存 | 上書き許可 | バックアップ | 結果 |
//! |---|---|---|---|
//! | なし | - | - | Rename |
//! | あり | false | - | SkipExists |
//! | あり | true | false | Overwrite |
//! | あり | true | true | BackupAndRename |

use serde::{Deserialize, Serialize};

/// ファイル1件に対する処理内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenameAction {
    Rename,
    SkipExists,
    SkipNoDetection,
    Overwrite,
    BackupAndRename,
}

impl RenameAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenameAction::Rename => "rename",
            RenameAction::SkipExists => "skip-exists",
            RenameAction::SkipNoDetection => "skip-no-detection",
            RenameAction::Overwrite => "overwrite",
            RenameAction::BackupAndRename => "backup-and-rename",
        }
    }

    /// ファイルシステム操作を伴わない（失敗扱いの）アクションか
    pub fn is_skip(&self) -> bool {
        matches!(self, RenameAction::SkipExists | RenameAction::SkipNoDetection)
    }
}

impl std::fmt::Display for RenameAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 上書き・バックアップの指定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    pub overwrite: bool,
    pub backup: bool,
}

impl ConflictPolicy {
    pub fn new(overwrite: bool, backup: bool) -> Self {
        Self { overwrite, backup }
    }

    /// リネーム先の有無から処理内容を決める
    pub fn resolve(&self, destination_exists: bool) -> RenameAction {
        match (destination_exists, self.overwrite, self.backup) {
            (false, _, _) => RenameAction::Rename,
            (true, false, _) => RenameAction::SkipExists,
            (true, true, false) => RenameAction::Overwrite,
            (true, true, true) => RenameAction::BackupAndRename,
        }
    }
}
