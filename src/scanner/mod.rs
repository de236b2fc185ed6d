use crate::error::{RenamerError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// 一括処理の対象列挙条件
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// ファイル名（再帰時はルートからの相対パス）に当てるglob
    pub pattern: String,
    pub recursive: bool,
    /// このディレクトリ名の下は列挙しない（バックアップ置き場）
    pub skip_dir_name: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pattern: "*.jpg".into(),
            recursive: false,
            skip_dir_name: Some("backup".into()),
        }
    }
}

/// 対象ファイルをパスの辞書順で列挙する
///
/// `input` がファイルならそれ1件のみ（パターンは見ない）。
pub fn scan(input: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(RenamerError::InputNotFound(input.display().to_string()));
    }

    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let matcher = build_matcher(&options.pattern)?;
    let max_depth = if options.recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();

    let walker = WalkDir::new(input)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || options.skip_dir_name.as_deref() != Some(&*e.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(input).unwrap_or(path);
        let file_name = path.file_name().map(Path::new).unwrap_or(relative);

        if matcher.is_match(relative) || matcher.is_match(file_name) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| RenamerError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
